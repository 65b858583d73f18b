//! Selects one named part out of a multi-part config document (spec §6:
//! a file whose top-level shape is `{ configs: { <name>: {...}, ... } }`
//! instead of a single document, where each sub-entry may carry its own
//! boolean `main_part: true` marking it the default when no part is
//! explicitly requested).

use camino::Utf8Path;
use indexmap::IndexMap;

use crate::config::value::ConfigValue;
use crate::error::ConfigError;

/// `doc` is the raw parsed top-level mapping of a file. `part` is the part
/// requested by the caller (via a `uses: path#part` reference, or the root
/// config's own `part` argument), or `None` when no part was requested.
pub fn select(doc: ConfigValue, part: Option<&str>, path: &Utf8Path) -> Result<ConfigValue, ConfigError> {
    let mut map: IndexMap<String, ConfigValue> = match doc {
        ConfigValue::Mapping(m) => m,
        other => {
            if part.is_some() {
                return Err(ConfigError::MissingPart(path.to_owned(), part.unwrap().to_string()));
            }
            return Ok(other);
        }
    };

    let Some(configs_val) = map.shift_remove("configs") else {
        if let Some(requested) = part {
            return Err(ConfigError::MissingPart(path.to_owned(), requested.to_string()));
        }
        return Ok(ConfigValue::Mapping(map));
    };

    let configs_map = configs_val.as_mapping().cloned().unwrap_or_default();
    let main_part = find_main_part(&configs_map, path)?;

    let chosen = part
        .map(str::to_owned)
        .or(main_part)
        .ok_or_else(|| ConfigError::MissingPart(path.to_owned(), "<none requested, no main_part>".to_string()))?;

    let mut entry = configs_map
        .get(&chosen)
        .cloned()
        .ok_or_else(|| ConfigError::MissingPart(path.to_owned(), chosen))?;

    if let Some(m) = entry.as_mapping_mut() {
        m.shift_remove("main_part");
    }

    Ok(entry)
}

/// Scans `configs_map`'s sub-entries for one with a boolean `main_part:
/// true` field (spec.md:52,159); more than one such entry is malformed.
fn find_main_part(configs_map: &IndexMap<String, ConfigValue>, path: &Utf8Path) -> Result<Option<String>, ConfigError> {
    let mut found = None;
    for (name, entry) in configs_map {
        let is_main = entry
            .as_mapping()
            .and_then(|m| m.get("main_part"))
            .and_then(ConfigValue::as_bool)
            .unwrap_or(false);

        if !is_main {
            continue;
        }

        if found.is_some() {
            return Err(ConfigError::MalformedOverlay(
                path.to_owned(),
                "more than one sub-entry declares main_part: true".to_string(),
            ));
        }
        found = Some(name.clone());
    }
    Ok(found)
}
