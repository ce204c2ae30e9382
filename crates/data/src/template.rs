//! `{{ name }}` placeholder rendering for SQL files.

use anyhow::{anyhow, bail, Result};
use regex::{Captures, Regex};
use std::collections::HashMap;

const PLACEHOLDER: &str = r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}";

/// Substitutes every `{{ name }}` in `sql` with the matching parameter.
///
/// Values are inserted verbatim, so callers pass trusted text only.
///
/// # Errors
/// Returns an error naming the first placeholder without a parameter.
pub fn render_sql_template(sql: &str, params: &HashMap<String, String>) -> Result<String> {
    let pattern = Regex::new(PLACEHOLDER)?;

    if let Some(missing) = pattern
        .captures_iter(sql)
        .map(|c| c[1].to_string())
        .find(|name| !params.contains_key(name))
    {
        bail!("No value for template parameter '{missing}'");
    }

    let rendered = pattern.replace_all(sql, |caps: &Captures| {
        params.get(&caps[1]).cloned().unwrap_or_default()
    });
    Ok(rendered.into_owned())
}

/// Parses `key=value` pairs from the command line.
///
/// # Errors
/// Returns an error for a pair without `=` or with an empty key.
pub fn parse_params<S: AsRef<str>>(pairs: &[S]) -> Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            let pair = pair.as_ref();
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid parameter '{pair}', expected key=value"))?;
            let key = key.trim();
            if key.is_empty() {
                bail!("Invalid parameter '{pair}', empty key");
            }
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn renders_placeholders_with_and_without_spaces() {
        let sql =
            "SELECT * FROM {{table}} WHERE price > {{ min_price }} AND ticker LIKE '{{ table }}%'";
        let values = params(&[("table", "quotes"), ("min_price", "90")]);
        let out = render_sql_template(sql, &values).unwrap();
        assert_eq!(
            out,
            "SELECT * FROM quotes WHERE price > 90 AND ticker LIKE 'quotes%'"
        );
    }

    #[test]
    fn sql_without_placeholders_is_unchanged() {
        let sql = "SELECT 1";
        assert_eq!(render_sql_template(sql, &HashMap::new()).unwrap(), sql);
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let values = params(&[("other", "1")]);
        let err = render_sql_template("SELECT {{ missing }}", &values).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn parse_params_splits_on_first_equals() {
        let parsed = parse_params(&["a=1", "filter=x=y"]).unwrap();
        assert_eq!(parsed["a"], "1");
        assert_eq!(parsed["filter"], "x=y");
        assert!(parse_params(&["novalue"]).is_err());
        assert!(parse_params(&["=1"]).is_err());
    }
}
