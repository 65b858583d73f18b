//! Task Registry (spec §4.2): a static, dotted-path-keyed catalog of every
//! [`TaskClass`] linked into the binary.
//!
//! Classes register themselves with [`inventory::submit!`] at their
//! definition site rather than through a reflective dotted-path lookup —
//! see SPEC_FULL.md §9 design note 2. The dotted-path *grammar* users write
//! in `tasks:`/`excluded_tasks:` is unchanged; only the mechanism behind it
//! is static instead of reflective.
//!
//! ```ignore
//! inventory::submit! { TaskClassEntry::new(|| Box::new(Tokenize)) }
//! ```

use std::collections::BTreeMap;

use regex::Regex;

use crate::task::TaskClass;

/// One statically-registered task class. `factory` constructs a fresh boxed
/// instance; classes are expected to be zero-sized and stateless, so this is
/// cheap and side-effect-free.
pub struct TaskClassEntry {
    factory: fn() -> Box<dyn TaskClass>,
}

impl TaskClassEntry {
    pub const fn new(factory: fn() -> Box<dyn TaskClass>) -> Self {
        TaskClassEntry { factory }
    }
}

inventory::collect!(TaskClassEntry);

/// The full set of linked-in task classes, keyed by dotted path
/// (`"{group}.{name}"`).
pub struct Registry {
    classes: BTreeMap<String, Box<dyn TaskClass>>,
}

impl Registry {
    /// Builds the registry from every class `inventory` collected at link
    /// time. Panics only if two classes register under the same full name,
    /// which is a programming error in the binary, not a user config error.
    pub fn from_inventory() -> Self {
        let mut classes = BTreeMap::new();
        for entry in inventory::iter::<TaskClassEntry> {
            let instance = (entry.factory)();
            let full_name = instance.full_name();
            if classes.insert(full_name.clone(), instance).is_some() {
                panic!("duplicate task class registered under `{full_name}`");
            }
        }
        Registry { classes }
    }

    pub fn get(&self, full_name: &str) -> Option<&dyn TaskClass> {
        self.classes.get(full_name).map(AsRef::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn TaskClass> {
        self.classes.values().map(AsRef::as_ref)
    }

    /// Expands a `tasks:`/`excluded_tasks:` selector list (spec §6) into the
    /// concrete set of matching full names. A selector is either a full
    /// dotted path, a `prefix.*` wildcard matching everything in a group,
    /// or a bare `*` matching everything.
    pub fn select(&self, selectors: &[String]) -> Vec<String> {
        let mut matched = Vec::new();
        for selector in selectors {
            for full_name in self.classes.keys() {
                if selector_matches(selector, full_name) && !matched.contains(full_name) {
                    matched.push(full_name.clone());
                }
            }
        }
        matched
    }

    /// Applies `tasks:` then subtracts `excluded_tasks:` (spec §6).
    pub fn resolve_selection(&self, tasks: Option<&[String]>, excluded_tasks: Option<&[String]>) -> Vec<String> {
        let mut selected = match tasks {
            Some(selectors) => self.select(selectors),
            None => self.classes.keys().cloned().collect(),
        };

        if let Some(excluded) = excluded_tasks {
            let excluded_set = self.select(excluded);
            selected.retain(|name| !excluded_set.contains(name));
        }

        selected
    }
}

#[cfg(test)]
impl Registry {
    /// Builds a registry directly from a map, bypassing `inventory`. Used by
    /// this module's own tests and by [`crate::chain`]'s tests, which need a
    /// small fixed set of task classes rather than every class linked into
    /// the test binary.
    pub(crate) fn from_map_for_tests(classes: BTreeMap<String, Box<dyn TaskClass>>) -> Self {
        Registry { classes }
    }
}

fn selector_matches(selector: &str, full_name: &str) -> bool {
    if selector == "*" {
        return true;
    }
    if let Some(prefix) = selector.strip_suffix(".*") {
        return full_name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('.'))
            .is_some();
    }
    if let Some(pattern) = selector.strip_prefix("~/").and_then(|s| s.strip_suffix('/')) {
        return Regex::new(pattern).map(|re| re.is_match(full_name)).unwrap_or(false);
    }
    selector == full_name
}
