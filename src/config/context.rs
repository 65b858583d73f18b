//! Context overlays: a second document applied on top of an already-built
//! ConfigNode tree to override parameter values without editing the
//! original configs (spec §4.1, §9 Open Question (a)).
//!
//! Three kinds of entries, composed in the order context documents are
//! applied (later documents win ties on the same key):
//!
//! - plain keys override the matching parameter in every ConfigNode;
//! - `for_namespaces: { <ns>: { ... } }` scopes the override to ConfigNodes
//!   carrying that namespace;
//! - `uses: [...]` entries are resolved the same way a regular `uses` entry
//!   is and attached as extra children of the root node.

use camino::Utf8Path;
use indexmap::IndexMap;

use crate::config::node::ConfigNode;
use crate::config::value::ConfigValue;
use crate::config::RESERVED_PARAMS;
use crate::error::ConfigError;

pub fn apply(root: &mut ConfigNode, overlay_doc: &ConfigValue, origin: &Utf8Path) -> Result<(), ConfigError> {
    let mut map = overlay_doc.as_mapping().cloned().unwrap_or_default();
    let for_namespaces = map.shift_remove("for_namespaces");
    let uses_entries = map.shift_remove("uses");

    check_reserved(&map, origin)?;
    apply_plain(root, &map);

    if let Some(fns) = for_namespaces {
        if let Some(fns_map) = fns.as_mapping() {
            for (namespace, overrides) in fns_map {
                let overrides_map = overrides.as_mapping().cloned().unwrap_or_default();
                check_reserved(&overrides_map, origin)?;
                apply_namespaced(root, namespace, &overrides_map);
            }
        }
    }

    if let Some(uses_val) = uses_entries {
        for entry in uses_val.as_string_list() {
            let extra = super::load_uses_entry(&entry, origin, &None, &IndexMap::new(), &mut Vec::new())?;
            root.children.push(extra);
        }
    }

    Ok(())
}

fn check_reserved(map: &IndexMap<String, ConfigValue>, _origin: &Utf8Path) -> Result<(), ConfigError> {
    for key in map.keys() {
        if RESERVED_PARAMS.contains(&key.as_str()) {
            return Err(ConfigError::ReservedParameterName(key.clone()));
        }
    }
    Ok(())
}

fn apply_plain(node: &mut ConfigNode, overrides: &IndexMap<String, ConfigValue>) {
    for (k, v) in overrides {
        node.params.insert(k.clone(), v.clone());
    }
    for child in &mut node.children {
        apply_plain(child, overrides);
    }
}

fn apply_namespaced(node: &mut ConfigNode, namespace: &str, overrides: &IndexMap<String, ConfigValue>) {
    if node.namespace.as_deref() == Some(namespace) {
        for (k, v) in overrides {
            node.params.insert(k.clone(), v.clone());
        }
    }
    for child in &mut node.children {
        apply_namespaced(child, namespace, overrides);
    }
}
