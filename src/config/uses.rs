//! Parsing for a single `uses:` list entry.
//!
//! Grammar (spec §4.1, §6): `<path>[#<part>] [as <namespace>]`, where `<path>`
//! is omitted for a same-file reference to another part of a multi-part
//! config (`#other_part`).

use camino::Utf8PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsesRef {
    pub path: Option<Utf8PathBuf>,
    pub part: Option<String>,
    pub namespace: Option<String>,
}

pub fn parse(entry: &str) -> UsesRef {
    let (body, namespace) = match entry.rsplit_once(" as ") {
        Some((b, ns)) => (b.trim(), Some(ns.trim().to_string())),
        None => (entry.trim(), None),
    };

    let (path_part, part) = match body.split_once('#') {
        Some((p, part)) => (p.trim(), Some(part.trim().to_string())),
        None => (body, None),
    };

    let path = if path_part.is_empty() {
        None
    } else {
        Some(Utf8PathBuf::from(path_part))
    };

    UsesRef { path, part, namespace }
}
