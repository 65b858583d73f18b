//! The canonical in-memory shape for a parsed config document.
//!
//! YAML and JSON are interchangeable per spec §6, so both are parsed into
//! this single enum rather than keeping two separate value types around.
//! Mappings use [`IndexMap`] because the Fingerprint Engine (spec §4.5)
//! hashes parameters "in declared order" — an ordinary `HashMap` would lose
//! that order and make fingerprints nondeterministic across processes.

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Sequence(Vec<ConfigValue>),
    Mapping(IndexMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, ConfigValue>> {
        match self {
            ConfigValue::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut IndexMap<String, ConfigValue>> {
        match self {
            ConfigValue::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Interprets the value as a list of strings, the grammar used by
    /// `tasks`, `uses`, and `excluded_tasks` (spec §6: "string or list").
    pub fn as_string_list(&self) -> Vec<String> {
        match self {
            ConfigValue::String(s) => vec![s.clone()],
            ConfigValue::Sequence(items) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_owned))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Recursively applies `f` to every string value (used for placeholder
    /// substitution, spec §4.1).
    pub fn map_strings(&mut self, f: &mut impl FnMut(&str) -> Result<String, String>) -> Result<(), String> {
        match self {
            ConfigValue::String(s) => {
                *s = f(s)?;
                Ok(())
            }
            ConfigValue::Sequence(items) => {
                for item in items {
                    item.map_strings(f)?;
                }
                Ok(())
            }
            ConfigValue::Mapping(map) => {
                for value in map.values_mut() {
                    value.map_strings(f)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// A stable, sorted-key textual representation used by the Fingerprint
    /// Engine's `canonical-repr` (spec §4.5).
    pub fn canonical_repr(&self) -> String {
        match self {
            ConfigValue::Null => "null".to_string(),
            ConfigValue::Bool(b) => b.to_string(),
            ConfigValue::Int(i) => i.to_string(),
            ConfigValue::Float(f) => format!("{f:?}"),
            ConfigValue::String(s) => format!("{s:?}"),
            ConfigValue::Sequence(items) => {
                let parts: Vec<String> = items.iter().map(ConfigValue::canonical_repr).collect();
                format!("[{}]", parts.join(","))
            }
            ConfigValue::Mapping(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let parts: Vec<String> = keys
                    .into_iter()
                    .map(|k| format!("{:?}:{}", k, map[k].canonical_repr()))
                    .collect();
                format!("{{{}}}", parts.join(","))
            }
        }
    }
}

impl From<serde_yaml::Value> for ConfigValue {
    fn from(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => ConfigValue::Null,
            serde_yaml::Value::Bool(b) => ConfigValue::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ConfigValue::Int(i)
                } else {
                    ConfigValue::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_yaml::Value::String(s) => ConfigValue::String(s),
            serde_yaml::Value::Sequence(items) => {
                ConfigValue::Sequence(items.into_iter().map(ConfigValue::from).collect())
            }
            serde_yaml::Value::Mapping(map) => {
                let mut out = IndexMap::with_capacity(map.len());
                for (k, v) in map {
                    let key = match k {
                        serde_yaml::Value::String(s) => s,
                        other => serde_yaml::to_string(&other).unwrap_or_default().trim().to_string(),
                    };
                    out.insert(key, ConfigValue::from(v));
                }
                ConfigValue::Mapping(out)
            }
            serde_yaml::Value::Tagged(tagged) => ConfigValue::from(tagged.value),
        }
    }
}

impl From<ConfigValue> for serde_json::Value {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Null => serde_json::Value::Null,
            ConfigValue::Bool(b) => serde_json::Value::Bool(b),
            ConfigValue::Int(i) => serde_json::Value::from(i),
            ConfigValue::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ConfigValue::String(s) => serde_json::Value::String(s),
            ConfigValue::Sequence(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            ConfigValue::Mapping(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k, serde_json::Value::from(v));
                }
                serde_json::Value::Object(out)
            }
        }
    }
}
