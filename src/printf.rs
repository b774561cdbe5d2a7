//! A small printf-style formatter for the `format` field of a parameter spec.
//!
//! Supports the subset actually reachable from a generator's typed output:
//! `%[flags][width]conv` where `flags` is any of `-0`, `width` is decimal
//! digits, and `conv` is one of `d`, `s`, `f`, `x`, `X`, `o`. Only one
//! placeholder's worth of parsing state is needed per call since every
//! generator produces exactly one value per `nextValue()`.

#[derive(Debug, Clone, Copy)]
pub enum FormatArg<'a> {
    Int(i64),
    Float(f64),
    Str(&'a str),
}

pub fn sprintf(format: &str, arg: FormatArg<'_>) -> String {
    let mut out = String::with_capacity(format.len() + 8);
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            out.push('%');
            chars.next();
            continue;
        }

        let mut zero_pad = false;
        let mut left_align = false;
        loop {
            match chars.peek() {
                Some('0') => {
                    zero_pad = true;
                    chars.next();
                }
                Some('-') => {
                    left_align = true;
                    chars.next();
                }
                _ => break,
            }
        }

        let mut width_str = String::new();
        while matches!(chars.peek(), Some(d) if d.is_ascii_digit()) {
            width_str.push(chars.next().unwrap());
        }
        let width: usize = width_str.parse().unwrap_or(0);

        // skip an optional .precision — parsed but not applied
        if chars.peek() == Some(&'.') {
            chars.next();
            while matches!(chars.peek(), Some(d) if d.is_ascii_digit()) {
                chars.next();
            }
        }

        let conv = chars.next().unwrap_or('s');
        let rendered = match (conv, arg) {
            ('d', FormatArg::Int(v)) => v.to_string(),
            ('d', FormatArg::Float(v)) => (v as i64).to_string(),
            ('x', FormatArg::Int(v)) => format!("{v:x}"),
            ('X', FormatArg::Int(v)) => format!("{v:X}"),
            ('o', FormatArg::Int(v)) => format!("{v:o}"),
            ('f', FormatArg::Float(v)) => format!("{v:.6}"),
            ('f', FormatArg::Int(v)) => format!("{:.6}", v as f64),
            ('s', FormatArg::Str(v)) => v.to_string(),
            ('s', FormatArg::Int(v)) => v.to_string(),
            ('s', FormatArg::Float(v)) => v.to_string(),
            (_, FormatArg::Str(v)) => v.to_string(),
            (_, FormatArg::Int(v)) => v.to_string(),
            (_, FormatArg::Float(v)) => v.to_string(),
        };

        let padded = if rendered.len() >= width {
            rendered
        } else if left_align {
            format!("{rendered:<width$}")
        } else if zero_pad && matches!(conv, 'd' | 'x' | 'X' | 'o' | 'f') {
            let neg = rendered.starts_with('-');
            let digits = if neg { &rendered[1..] } else { &rendered[..] };
            let pad_width = width.saturating_sub(if neg { 1 } else { 0 });
            let padded_digits = format!("{digits:0>pad_width$}");
            if neg {
                format!("-{padded_digits}")
            } else {
                padded_digits
            }
        } else {
            format!("{rendered:>width$}")
        };

        out.push_str(&padded);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_padded_int() {
        assert_eq!(sprintf("TEAM-%03d", FormatArg::Int(7)), "TEAM-007");
    }

    #[test]
    fn plain_string() {
        assert_eq!(sprintf("name=%s!", FormatArg::Str("bob")), "name=bob!");
    }

    #[test]
    fn negative_zero_padded() {
        assert_eq!(sprintf("%05d", FormatArg::Int(-12)), "-0012");
    }

    #[test]
    fn literal_percent() {
        assert_eq!(sprintf("100%%", FormatArg::Int(1)), "100%");
    }
}
