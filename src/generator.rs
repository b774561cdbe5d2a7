//! Value generators.
//!
//! Rather than dispatching on a runtime type tag, [`ValueGenerator`] is a
//! sum type over `{Int, Long, Str, Bool, Date, TableRef}` plus the single
//! `next_value` entry point. [`TypedValue`] is the matching sum type
//! consumed by the worker's parameter binder.

use crate::data_table::DataTable;
use crate::error::GeneratorError;
use crate::printf::{sprintf, FormatArg};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;

/// Alphabet `string` generators draw characters from.
const STRING_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Int(i32),
    Long(i64),
    Str(String),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

#[derive(Debug, Clone)]
pub enum ValueGenerator {
    Int { lo: i64, hi: i64, format: Option<String> },
    Long { lo: i64, hi: i64, format: Option<String> },
    Str { min_len: i64, max_len: i64, format: Option<String> },
    Bool { percent_true: i64, format: Option<String> },
    Date { lo: NaiveDateTime, hi: NaiveDateTime, has_time: bool, parse_format: String, format: Option<String> },
    TableRef { first_row: i64, col: usize, data: Arc<DataTable>, format: Option<String> },
}

impl ValueGenerator {
    /// Construct from the raw specifier string, with or without surrounding
    /// braces.
    pub fn parse(raw: &str, data: Arc<DataTable>) -> Result<ValueGenerator, GeneratorError> {
        let body = raw.trim().trim_start_matches('{').trim_end_matches('}');
        let tokens: Vec<&str> = split_on_comma(body);
        if tokens.is_empty() {
            return Err(GeneratorError::Malformed(raw.to_string()));
        }

        let kind = tokens[0].trim();
        let rest = &tokens[1..];

        let (format, xy): (Option<&str>, &[&str]) = match rest.first() {
            Some(tok) if !tok.trim().starts_with(|c: char| c.is_ascii_digit()) => {
                (Some(tok.trim()), &rest[1..])
            }
            _ => (None, rest),
        };
        let format = format.map(str::to_string);
        let x = xy.first().map(|s| s.trim());
        let y = xy.get(1).map(|s| s.trim());
        let parse_format_override = xy.get(2).map(|s| s.trim().to_string());

        match kind {
            "int" | "long" => {
                let lo = parse_int(x.unwrap_or("0"), "int bound")?;
                let hi = parse_int(y.unwrap_or("0"), "int bound")?;
                if kind == "int" {
                    Ok(ValueGenerator::Int { lo, hi, format })
                } else {
                    Ok(ValueGenerator::Long { lo, hi, format })
                }
            }
            "string" => {
                let min_len = parse_int(x.unwrap_or("1"), "string length")?;
                let max_len = parse_int(y.unwrap_or("1"), "string length")?;
                Ok(ValueGenerator::Str { min_len, max_len, format })
            }
            "boolean" => {
                let percent_true = x.map(|s| parse_int(s, "boolean percent")).transpose()?.unwrap_or(50);
                Ok(ValueGenerator::Bool { percent_true, format })
            }
            "date" => {
                let x = x.ok_or_else(|| GeneratorError::Malformed(raw.to_string()))?;
                let y = y.ok_or_else(|| GeneratorError::Malformed(raw.to_string()))?;
                let (lo, has_time_x, default_fmt_x) = parse_date_bound(x, parse_format_override.as_deref())?;
                let (hi, has_time_y, _) = parse_date_bound(y, parse_format_override.as_deref())?;
                let has_time = has_time_x || has_time_y;
                let parse_format = parse_format_override.unwrap_or(default_fmt_x);
                Ok(ValueGenerator::Date { lo, hi, has_time, parse_format, format })
            }
            "value" => {
                if data.is_empty() {
                    return Err(GeneratorError::EmptyDataTable);
                }
                let first_row = parse_int(x.unwrap_or("0"), "value row index")?;
                let col = parse_int(y.unwrap_or("0"), "value col index")? as usize;
                Ok(ValueGenerator::TableRef { first_row, col, data, format })
            }
            other => Err(GeneratorError::UnknownType(other.to_string())),
        }
    }

    /// Draw one uniform `r in [0,1)` and derive a typed value, applying
    /// the generator's format string if it has one.
    pub fn next_value(&self, rng: &mut StdRng) -> TypedValue {
        let r: f64 = rng.gen_range(0.0..1.0);
        match self {
            ValueGenerator::Int { lo, hi, format } => {
                let delta = hi - lo;
                let v = (lo + (r * delta as f64) as i64) as i32;
                apply_format_int(format, v as i64, TypedValue::Int(v))
            }
            ValueGenerator::Long { lo, hi, format } => {
                let delta = hi - lo;
                let v = lo + (r * delta as f64) as i64;
                apply_format_int(format, v, TypedValue::Long(v))
            }
            ValueGenerator::Str { min_len, max_len, format } => {
                let delta = max_len - min_len;
                let len = (min_len + (r * delta as f64) as i64).max(0) as usize;
                let s: String = (0..len)
                    .map(|_| STRING_ALPHABET[rng.gen_range(0..STRING_ALPHABET.len())] as char)
                    .collect();
                match format {
                    Some(f) => TypedValue::Str(sprintf(f, FormatArg::Str(&s))),
                    None => TypedValue::Str(s),
                }
            }
            ValueGenerator::Bool { percent_true, format } => {
                let v = (r * 100.0) < *percent_true as f64;
                match format {
                    Some(f) => TypedValue::Str(sprintf(f, FormatArg::Str(if v { "true" } else { "false" }))),
                    None => TypedValue::Bool(v),
                }
            }
            ValueGenerator::Date { lo, hi, has_time, parse_format, format } => {
                let delta_secs = (*hi - *lo).num_seconds();
                let offset = (r * delta_secs as f64) as i64;
                let ts = *lo + Duration::seconds(offset);
                match format {
                    Some(f) => TypedValue::Str(sprintf(f, FormatArg::Str(&ts.format(&java_to_chrono(parse_format)).to_string()))),
                    None if *has_time => TypedValue::DateTime(ts),
                    None => TypedValue::Date(ts.date()),
                }
            }
            ValueGenerator::TableRef { first_row, col, data, format } => {
                let delta = data.len() as i64 - first_row;
                let row = (first_row + (r * delta as f64) as i64).max(0) as usize;
                let cell = data.cell(row, *col).unwrap_or("").to_string();
                match format {
                    Some(f) => TypedValue::Str(sprintf(f, FormatArg::Str(&cell))),
                    None => TypedValue::Str(cell),
                }
            }
        }
    }
}

fn apply_format_int(format: &Option<String>, v: i64, default: TypedValue) -> TypedValue {
    match format {
        Some(f) => TypedValue::Str(sprintf(f, FormatArg::Int(v))),
        None => default,
    }
}

/// Split on `,` surrounded by optional spaces.
fn split_on_comma(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b',' {
            parts.push(s[start..i].trim());
            start = i + 1;
        }
        i += 1;
    }
    parts.push(s[start..].trim());
    parts
}

fn parse_int(s: &str, kind: &'static str) -> Result<i64, GeneratorError> {
    s.trim().parse::<i64>().map_err(|_| GeneratorError::BadBound { value: s.to_string(), kind })
}

/// Parses a date bound; returns `(timestamp, has_time_component, default_format_used)`.
/// Default format per `yyyy/MM/dd`, or `yyyy/MM/dd HH:mm:ss`
/// if the bound string itself contains a space.
fn parse_date_bound(
    raw: &str,
    parse_format_override: Option<&str>,
) -> Result<(NaiveDateTime, bool, String), GeneratorError> {
    let has_time = raw.contains(' ');
    let default_fmt = if has_time { "yyyy/MM/dd HH:mm:ss" } else { "yyyy/MM/dd" }.to_string();
    let fmt = parse_format_override.unwrap_or(&default_fmt);
    let chrono_fmt = java_to_chrono(fmt);

    let parsed = if has_time {
        NaiveDateTime::parse_from_str(raw, &chrono_fmt)
    } else {
        NaiveDate::parse_from_str(raw, &chrono_fmt).map(|d| d.and_hms_opt(0, 0, 0).unwrap())
    };

    parsed
        .map(|dt| (dt, has_time, default_fmt.clone()))
        .map_err(|_| GeneratorError::BadDate { value: raw.to_string(), format: fmt.to_string() })
}

/// Translates the handful of Java `SimpleDateFormat` tokens the default
/// date formats use into `chrono::format::strftime` tokens.
fn java_to_chrono(fmt: &str) -> String {
    fmt.replace("yyyy", "%Y")
        .replace("MM", "%m")
        .replace("dd", "%d")
        .replace("HH", "%H")
        .replace("mm", "%M")
        .replace("ss", "%S")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn empty_data() -> Arc<DataTable> {
        Arc::new(DataTable::empty())
    }

    #[test]
    fn s1_int_bounds() {
        let gen = ValueGenerator::parse("{int,1,10}", empty_data()).unwrap();
        matches!(&gen, ValueGenerator::Int { lo: 1, hi: 10, .. });
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            if let TypedValue::Int(v) = gen.next_value(&mut rng) {
                assert!((1..10).contains(&v));
            } else {
                panic!("expected Int");
            }
        }
    }

    /// `{boolean,30}` over 10_000 draws should land within a few percent of 30%.
    #[test]
    fn s2_boolean_percent() {
        let gen = ValueGenerator::parse("{boolean,30}", empty_data()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut trues = 0;
        for _ in 0..10_000 {
            if let TypedValue::Bool(true) = gen.next_value(&mut rng) {
                trues += 1;
            }
        }
        assert!((2700..=3300).contains(&trues), "trues={trues}");
    }

    #[test]
    fn s3_string_alphabet_and_length() {
        let gen = ValueGenerator::parse("{string,5,10}", empty_data()).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            if let TypedValue::Str(s) = gen.next_value(&mut rng) {
                assert!((5..=10).contains(&s.len()), "len={}", s.len());
                assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
            } else {
                panic!("expected Str");
            }
        }
    }

    #[test]
    fn unknown_type_is_fatal() {
        let err = ValueGenerator::parse("{frobnicate,1,2}", empty_data()).unwrap_err();
        matches!(err, GeneratorError::UnknownType(_));
    }

    #[test]
    fn value_generator_needs_nonempty_table() {
        let err = ValueGenerator::parse("{value,1,0}", empty_data()).unwrap_err();
        matches!(err, GeneratorError::EmptyDataTable);
    }

    #[test]
    fn formatted_int_uses_sprintf() {
        let gen = ValueGenerator::parse("{int,%03d,7,8}", empty_data()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        if let TypedValue::Str(s) = gen.next_value(&mut rng) {
            assert_eq!(s, "007");
        } else {
            panic!("expected formatted Str");
        }
    }

    #[test]
    fn date_bounds_parse_with_default_format() {
        let gen = ValueGenerator::parse("{date,1900/01/01,2010/01/01}", empty_data()).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            if let TypedValue::Date(d) = gen.next_value(&mut rng) {
                assert!(d.format("%Y").to_string().parse::<i32>().unwrap() >= 1900);
            } else {
                panic!("expected Date");
            }
        }
    }
}
