//! Statement Template: parses the raw input SQL, extracts embedded
//! parameter specs, and emits placeholder-only SQL plus an ordered list of
//! generators.

use crate::data_table::DataTable;
use crate::error::{GeneratorError, TemplateError};
use crate::generator::ValueGenerator;
use regex_lite::Regex;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Select,
    Insert,
    Update,
    Delete,
    Execute,
}

impl Verb {
    fn parse(token: &str) -> Option<Verb> {
        match token.to_ascii_uppercase().as_str() {
            "SELECT" => Some(Verb::Select),
            "INSERT" => Some(Verb::Insert),
            "UPDATE" => Some(Verb::Update),
            "DELETE" => Some(Verb::Delete),
            "EXECUTE" => Some(Verb::Execute),
            _ => None,
        }
    }
}

/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct StatementTemplate {
    pub rewritten_sql: String,
    pub verb: Verb,
    pub generators: Vec<ValueGenerator>,
}

impl StatementTemplate {
    /// A parameter site matches `\?(\{[^{]+\})?`. For the
    /// *k*-th site (0-based): the *k*-th semicolon-separated piece of
    /// `params_override` wins if present (`params` is an override of inline
    /// specs); otherwise the inline `{...}` body is used; if neither is
    /// present, construction fails.
    pub fn parse(
        sql: &str,
        params_override: Option<&str>,
        data: Arc<DataTable>,
    ) -> Result<StatementTemplate, TemplateError> {
        let site_re = Regex::new(r"\?(\{[^{]+\})?").unwrap();
        let override_pieces: Vec<&str> = params_override
            .map(|p| p.split(';').map(str::trim).collect())
            .unwrap_or_default();

        let mut rewritten = String::with_capacity(sql.len());
        let mut generators = Vec::new();
        let mut last_end = 0;
        let mut index = 0usize;

        for m in site_re.find_iter(sql) {
            rewritten.push_str(&sql[last_end..m.start()]);
            rewritten.push('?');
            last_end = m.end();

            let matched = m.as_str();
            let inline_body = matched
                .find('{')
                .map(|brace_start| &matched[brace_start..]);

            let spec_text = match override_pieces.get(index) {
                Some(piece) => piece.to_string(),
                None => inline_body
                    .map(|body| body.to_string())
                    .ok_or(TemplateError::MissingSpec { index })?,
            };

            let generator = ValueGenerator::parse(&spec_text, Arc::clone(&data))
                .map_err(GeneratorError::from)
                .map_err(TemplateError::from)?;
            generators.push(generator);
            index += 1;
        }
        rewritten.push_str(&sql[last_end..]);

        let first_token = sql.split_whitespace().next().unwrap_or("");
        let verb = Verb::parse(first_token).ok_or_else(|| TemplateError::UnknownVerb(first_token.to_string()))?;

        Ok(StatementTemplate { rewritten_sql: rewritten, verb, generators })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Arc<DataTable> {
        Arc::new(DataTable::empty())
    }

    #[test]
    fn s1_rewrite() {
        let tpl = StatementTemplate::parse(
            "SELECT ?{int,1,10} FROM T WHERE x < ?{int,1900,2010}",
            None,
            table(),
        )
        .unwrap();
        assert_eq!(tpl.rewritten_sql, "SELECT ? FROM T WHERE x < ?");
        assert_eq!(tpl.verb, Verb::Select);
        assert_eq!(tpl.generators.len(), 2);
    }

    /// Testable property 2: placeholder count == generator count, and the
    /// rewritten SQL contains no `{...}` body.
    #[test]
    fn placeholder_count_matches_generator_count() {
        let rows = vec![
            vec!["1".to_string(), "2".to_string(), "3".to_string()],
            vec!["4".to_string(), "5".to_string(), "6".to_string()],
        ];
        let tpl = StatementTemplate::parse(
            "UPDATE t SET a = ?{int,0,5}, b = ?{string,1,3} WHERE id = ?{value,1,0}",
            None,
            Arc::new(DataTable::from_rows(rows)),
        )
        .unwrap();
        assert_eq!(tpl.rewritten_sql.matches('?').count(), tpl.generators.len());
        assert!(!tpl.rewritten_sql.contains('{'));
    }

    #[test]
    fn params_override_used_when_no_inline_spec() {
        let tpl = StatementTemplate::parse("SELECT * FROM t WHERE a = ? AND b = ?", Some("int,1,5; string,2,4"), table())
            .unwrap();
        assert_eq!(tpl.generators.len(), 2);
    }

    #[test]
    fn params_override_wins_over_inline_spec() {
        let tpl = StatementTemplate::parse(
            "SELECT * FROM t WHERE a = ?{int,1,5}",
            Some("int,100,200"),
            table(),
        )
        .unwrap();
        match &tpl.generators[0] {
            ValueGenerator::Int { lo, hi, .. } => {
                assert_eq!((*lo, *hi), (100, 200));
            }
            other => panic!("expected Int generator, got {other:?}"),
        }
    }

    #[test]
    fn missing_spec_is_fatal() {
        let err = StatementTemplate::parse("SELECT * FROM t WHERE a = ?", None, table()).unwrap_err();
        matches!(err, TemplateError::MissingSpec { index: 0 });
    }

    #[test]
    fn unknown_verb_is_fatal() {
        let err = StatementTemplate::parse("MERGE INTO t ...", None, table()).unwrap_err();
        matches!(err, TemplateError::UnknownVerb(_));
    }
}
