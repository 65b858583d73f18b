//! Dependency Linker (spec §4.4): resolves each task's declared input-task
//! references against the chain's other instances and produces the DAG
//! edges the Execution Engine walks.
//!
//! Reference resolution is namespace-scoped by default, mirroring the
//! Parameter Binder: a reference is matched against candidates in the
//! referencing task's own namespace or an ancestor namespace, unless the
//! reference is prefixed with `~~`, which searches the whole chain.

use regex::Regex;

use crate::error::LinkError;
use crate::task::InputRefSpec;

/// A minimal, linker-facing view of one chain-bound task instance. Built by
/// [`crate::chain`] from its `TaskInstance`s before graph edges exist.
#[derive(Debug, Clone)]
pub struct LinkCandidate {
    pub index: usize,
    pub group: String,
    pub name: String,
    pub namespace: Option<String>,
    pub class_full_name: String,
}

impl LinkCandidate {
    /// `"{namespace}::{group}:{name}"`, or `"{group}:{name}"` with no namespace.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}::{}:{}", self.group, self.name),
            None => format!("{}:{}", self.group, self.name),
        }
    }
}

enum Selector {
    ClassName(String),
    GroupName(String, String),
    Regex(String),
}

struct ParsedRef {
    global: bool,
    explicit_namespace: Option<String>,
    selector: Selector,
}

fn parse(pattern: &str) -> Result<ParsedRef, LinkError> {
    let (body, global) = match pattern.strip_prefix("~~") {
        Some(rest) => (rest, true),
        None => (pattern, false),
    };

    if let Some(inner) = body.strip_prefix("~/").and_then(|s| s.strip_suffix('/')) {
        return Ok(ParsedRef {
            global,
            explicit_namespace: None,
            selector: Selector::Regex(inner.to_string()),
        });
    }

    let (explicit_namespace, rest) = match body.rsplit_once("::") {
        Some((ns, rest)) => (Some(ns.to_string()), rest),
        None => (None, body),
    };

    let selector = match rest.split_once(':') {
        Some((group, name)) => Selector::GroupName(group.to_string(), name.to_string()),
        None => Selector::ClassName(rest.to_string()),
    };

    Ok(ParsedRef { global, explicit_namespace, selector })
}

fn namespace_visible(candidate_ns: &Option<String>, referencer_ns: &Option<String>, global: bool) -> bool {
    if global {
        return true;
    }
    match (candidate_ns, referencer_ns) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(cns), Some(rns)) => {
            rns == cns || rns.starts_with(&format!("{cns}::")) || cns.starts_with(&format!("{rns}::"))
        }
    }
}

/// Resolves one input-task reference against `candidates`, scoped to
/// `referencer_namespace`. Returns the indices of every matching candidate;
/// callers decide whether more than one match is an error (it is, for a
/// singular input) or expected.
pub fn resolve(spec: &InputRefSpec, referencer_namespace: &Option<String>, candidates: &[LinkCandidate]) -> Result<Vec<usize>, LinkError> {
    let parsed = parse(spec.pattern)?;

    let regex = match &parsed.selector {
        Selector::Regex(pattern) => {
            Some(Regex::new(pattern).map_err(|e| LinkError::InvalidRegex(spec.pattern.to_string(), e))?)
        }
        _ => None,
    };

    let matches: Vec<usize> = candidates
        .iter()
        .filter(|c| match &parsed.explicit_namespace {
            Some(ns) => c.namespace.as_deref() == Some(ns.as_str()),
            None => namespace_visible(&c.namespace, referencer_namespace, parsed.global),
        })
        .filter(|c| match &parsed.selector {
            Selector::ClassName(name) => &c.class_full_name == name,
            Selector::GroupName(group, name) => &c.group == group && &c.name == name,
            Selector::Regex(_) => regex.as_ref().is_some_and(|re| re.is_match(&c.qualified_name())),
        })
        .map(|c| c.index)
        .collect();

    Ok(matches)
}

/// Resolves `spec` and asserts exactly one match (the common case: a single
/// required or optional input slot). `required = false` with zero matches
/// is `Ok(None)`, not an error.
pub fn resolve_single(
    spec: &InputRefSpec,
    referencer_full_name: &str,
    referencer_namespace: &Option<String>,
    candidates: &[LinkCandidate],
) -> Result<Option<usize>, LinkError> {
    let matches = resolve(spec, referencer_namespace, candidates)?;

    match matches.as_slice() {
        [] if spec.required => Err(LinkError::Unresolved(spec.pattern.to_string(), referencer_full_name.to_string())),
        [] => Ok(None),
        [single] => Ok(Some(*single)),
        many => {
            let names: Vec<String> = many.iter().map(|i| candidates[*i].qualified_name()).collect();
            Err(LinkError::Ambiguous(spec.pattern.to_string(), referencer_full_name.to_string(), names))
        }
    }
}

/// True when `pattern` uses the regex-marker grammar (`~/.../`, optionally
/// `~~`-prefixed), which resolves to an ordered collection of matches
/// instead of exactly one (spec §4.4).
pub fn is_regex_pattern(pattern: &str) -> bool {
    let body = pattern.strip_prefix("~~").unwrap_or(pattern);
    body.starts_with("~/") && body.ends_with('/') && body.len() > 2
}

/// Resolves a regex-marker reference to every matching candidate, in
/// `candidates` order. Zero matches is only an error when `spec.required`;
/// unlike [`resolve_single`], more than one match is the expected case, not
/// [`LinkError::Ambiguous`].
pub fn resolve_many(
    spec: &InputRefSpec,
    referencer_full_name: &str,
    referencer_namespace: &Option<String>,
    candidates: &[LinkCandidate],
) -> Result<Vec<usize>, LinkError> {
    let matches = resolve(spec, referencer_namespace, candidates)?;
    if matches.is_empty() && spec.required {
        return Err(LinkError::Unresolved(spec.pattern.to_string(), referencer_full_name.to_string()));
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(index: usize, group: &str, name: &str, namespace: Option<&str>, class: &str) -> LinkCandidate {
        LinkCandidate {
            index,
            group: group.to_string(),
            name: name.to_string(),
            namespace: namespace.map(str::to_owned),
            class_full_name: class.to_string(),
        }
    }

    #[test]
    fn bare_class_name_matches_by_class_identity() {
        let candidates = vec![
            candidate(0, "preprocessing", "a", None, "preprocessing.Tokenize"),
            candidate(1, "training", "b", None, "training.Train"),
        ];
        let spec = InputRefSpec::new("preprocessing.Tokenize");
        let matches = resolve(&spec, &None, &candidates).unwrap();
        assert_eq!(matches, vec![0]);
    }

    #[test]
    fn group_name_reference_matches_a_single_instance() {
        let candidates = vec![candidate(0, "preprocessing", "MyTok", None, "preprocessing.Tokenize")];
        let spec = InputRefSpec::new("preprocessing:MyTok");
        let matches = resolve(&spec, &None, &candidates).unwrap();
        assert_eq!(matches, vec![0]);
    }

    #[test]
    fn namespace_scoping_excludes_unrelated_namespaces_by_default() {
        let candidates = vec![
            candidate(0, "preprocessing", "a", Some("train"), "preprocessing.Tokenize"),
            candidate(1, "preprocessing", "a", Some("test"), "preprocessing.Tokenize"),
        ];
        let spec = InputRefSpec::new("preprocessing.Tokenize");
        let referencer_ns = Some("train".to_string());
        let matches = resolve(&spec, &referencer_ns, &candidates).unwrap();
        assert_eq!(matches, vec![0]);
    }

    #[test]
    fn double_tilde_ignores_namespace_scoping() {
        let candidates = vec![
            candidate(0, "preprocessing", "a", Some("train"), "preprocessing.Tokenize"),
            candidate(1, "preprocessing", "a", Some("test"), "preprocessing.Tokenize"),
        ];
        let spec = InputRefSpec::new("~~preprocessing.Tokenize");
        let referencer_ns = Some("train".to_string());
        let mut matches = resolve(&spec, &referencer_ns, &candidates).unwrap();
        matches.sort();
        assert_eq!(matches, vec![0, 1]);
    }

    #[test]
    fn explicit_namespace_qualifier_pins_an_exact_namespace() {
        let candidates = vec![
            candidate(0, "preprocessing", "a", Some("train"), "preprocessing.Tokenize"),
            candidate(1, "preprocessing", "a", Some("test"), "preprocessing.Tokenize"),
        ];
        let spec = InputRefSpec::new("test::preprocessing:a");
        let matches = resolve(&spec, &Some("train".to_string()), &candidates).unwrap();
        assert_eq!(matches, vec![1]);
    }

    #[test]
    fn regex_reference_matches_qualified_names() {
        let candidates = vec![
            candidate(0, "preprocessing", "a", Some("train"), "preprocessing.Tokenize"),
            candidate(1, "preprocessing", "a", Some("test"), "preprocessing.Tokenize"),
        ];
        let spec = InputRefSpec::new("~~~/^train::/");
        let matches = resolve(&spec, &None, &candidates).unwrap();
        assert_eq!(matches, vec![0]);
    }

    #[test]
    fn resolve_single_reports_ambiguous_matches() {
        let candidates = vec![
            candidate(0, "preprocessing", "a", None, "preprocessing.Tokenize"),
            candidate(1, "preprocessing", "b", None, "preprocessing.Tokenize"),
        ];
        let spec = InputRefSpec::new("preprocessing.Tokenize");
        let err = resolve_single(&spec, "training.Train#train", &None, &candidates).unwrap_err();
        assert!(matches!(err, LinkError::Ambiguous(_, _, _)));
    }

    #[test]
    fn resolve_single_unresolved_optional_is_none_not_error() {
        let candidates: Vec<LinkCandidate> = Vec::new();
        let spec = InputRefSpec::new("preprocessing.Tokenize").optional();
        let resolved = resolve_single(&spec, "training.Train#train", &None, &candidates).unwrap();
        assert_eq!(resolved, None);
    }

    #[test]
    fn is_regex_pattern_recognizes_the_tilde_slash_marker() {
        assert!(is_regex_pattern("~/^train::/"));
        assert!(is_regex_pattern("~~~/^train::/"));
        assert!(!is_regex_pattern("preprocessing.Tokenize"));
        assert!(!is_regex_pattern("preprocessing:a"));
    }

    #[test]
    fn resolve_many_returns_every_match_without_treating_it_as_ambiguous() {
        let candidates = vec![
            candidate(0, "preprocessing", "a", Some("train"), "preprocessing.Tokenize"),
            candidate(1, "preprocessing", "b", Some("train"), "preprocessing.Tokenize"),
            candidate(2, "preprocessing", "c", Some("test"), "preprocessing.Tokenize"),
        ];
        let spec = InputRefSpec::new("~~~/^train::/");
        let mut matches = resolve_many(&spec, "training.Train", &None, &candidates).unwrap();
        matches.sort();
        assert_eq!(matches, vec![0, 1]);
    }

    #[test]
    fn resolve_many_required_with_no_matches_is_an_error() {
        let candidates: Vec<LinkCandidate> = Vec::new();
        let spec = InputRefSpec::new("~/^nothing$/");
        let err = resolve_many(&spec, "training.Train", &None, &candidates).unwrap_err();
        assert!(matches!(err, LinkError::Unresolved(_, _)));
    }
}
