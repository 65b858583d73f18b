//! `{NAME}` placeholder substitution against a config's `global_vars`
//! (spec §4.1).

use camino::Utf8Path;

use crate::config::value::ConfigValue;
use crate::error::ConfigError;

/// Scans every string in `value` for `{NAME}` placeholders and substitutes
/// them from `vars`. Runs before `uses` resolution, so a `uses` path or
/// namespace alias may itself reference a global var.
pub fn substitute(value: &mut ConfigValue, vars: &indexmap::IndexMap<String, String>, path: &Utf8Path) -> Result<(), ConfigError> {
    let mut err = None;
    let _ = value.map_strings(&mut |s| {
        if err.is_some() {
            return Ok(s.to_string());
        }
        match expand(s, vars) {
            Ok(expanded) => Ok(expanded),
            Err(placeholder) => {
                err = Some(placeholder);
                Ok(s.to_string())
            }
        }
    });

    match err {
        Some(placeholder) => Err(ConfigError::UnresolvedPlaceholder {
            path: path.to_owned(),
            placeholder,
        }),
        None => Ok(()),
    }
}

fn expand(input: &str, vars: &indexmap::IndexMap<String, String>) -> Result<String, String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('{') {
        let Some(close_rel) = rest[open..].find('}') else {
            out.push_str(rest);
            return Ok(out);
        };
        let close = open + close_rel;
        let name = &rest[open + 1..close];

        out.push_str(&rest[..open]);
        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => return Err(name.to_string()),
        }
        rest = &rest[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> indexmap::IndexMap<String, String> {
        let mut m = indexmap::IndexMap::new();
        m.insert("DATASET".to_string(), "wmt14".to_string());
        m.insert("SPLIT".to_string(), "train".to_string());
        m
    }

    #[test]
    fn substitutes_multiple_placeholders_in_one_string() {
        let mut v = ConfigValue::String("/data/{DATASET}/{SPLIT}.tsv".to_string());
        substitute(&mut v, &vars(), Utf8Path::new("x.yaml")).unwrap();
        assert_eq!(v.as_str(), Some("/data/wmt14/train.tsv"));
    }

    #[test]
    fn unresolved_placeholder_is_an_error() {
        let mut v = ConfigValue::String("/data/{MISSING}.tsv".to_string());
        let err = substitute(&mut v, &vars(), Utf8Path::new("x.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvedPlaceholder { .. }));
    }

    #[test]
    fn recurses_into_sequences_and_mappings() {
        let mut map = indexmap::IndexMap::new();
        map.insert(
            "paths".to_string(),
            ConfigValue::Sequence(vec![ConfigValue::String("{DATASET}/a".to_string())]),
        );
        let mut v = ConfigValue::Mapping(map);
        substitute(&mut v, &vars(), Utf8Path::new("x.yaml")).unwrap();
        let paths = v.as_mapping().unwrap().get("paths").unwrap().as_sequence().unwrap();
        assert_eq!(paths[0].as_str(), Some("wmt14/a"));
    }
}
