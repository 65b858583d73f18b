//! Config Loader (spec §4.1): turns one or more YAML/JSON documents into a
//! tree of [`ConfigNode`]s, resolving `uses` inclusions, multi-part file
//! selection, `{NAME}` placeholder substitution, and context overlays.
//!
//! Everything downstream — the Task Registry, Parameter Binder, Dependency
//! Linker — consumes a [`Config`]'s resolved [`ConfigNode`] tree; none of
//! them touch the filesystem or re-parse YAML.

mod context;
mod multipart;
mod placeholder;
pub mod node;
pub mod uses;
pub mod value;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;

pub use node::ConfigNode;
pub use value::ConfigValue;

use crate::error::ConfigError;

/// Parameter names owned by the Config Loader / Parameter Binder grammar;
/// a config or context overlay may not declare a user parameter under one
/// of these names (spec §6, §9 Open Question (a)).
pub const RESERVED_PARAMS: &[&str] = &[
    "tasks",
    "uses",
    "excluded_tasks",
    "configs",
    "for_namespaces",
    "human_readable_data_name",
];

/// A fully-resolved config: a [`ConfigNode`] tree plus the global variables
/// placeholders were substituted from.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: ConfigNode,
    pub global_vars: IndexMap<String, String>,
}

impl Config {
    /// Loads and resolves the config rooted at `path`. `part` selects a
    /// sub-entry when `path` is itself a multi-part file (spec.md:150,
    /// §6) — `None` falls back to whichever sub-entry declares `main_part:
    /// true`, the same rule `uses` part selection follows.
    pub fn new(
        path: impl AsRef<Utf8Path>,
        global_vars: IndexMap<String, String>,
        part: Option<&str>,
    ) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let raw = load_file(path)?;
        Self::build(raw, path, global_vars, part)
    }

    /// Like [`Config::new`], but parses `text` directly instead of reading a
    /// file. `origin` is used only for error messages and relative `uses`
    /// resolution.
    pub fn from_str(
        text: &str,
        origin: impl AsRef<Utf8Path>,
        global_vars: IndexMap<String, String>,
        part: Option<&str>,
    ) -> Result<Config, ConfigError> {
        let origin = origin.as_ref();
        let raw = parse_document(text, origin)?;
        Self::build(raw, origin, global_vars, part)
    }

    fn build(
        raw: ConfigValue,
        origin: &Utf8Path,
        global_vars: IndexMap<String, String>,
        part: Option<&str>,
    ) -> Result<Config, ConfigError> {
        let selected = multipart::select(raw, part, origin)?;
        let name = part.unwrap_or_else(|| origin.file_stem().unwrap_or("root")).to_string();
        let mut visiting = vec![cycle_key(origin, part)];
        let root = build_node(selected, origin, None, name, &global_vars, &mut visiting)?;
        Ok(Config { root, global_vars })
    }

    /// Applies a context overlay file on top of the already-resolved tree.
    /// Composable: call repeatedly, later calls win on conflicting keys.
    pub fn with_context(mut self, path: impl AsRef<Utf8Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut raw = load_file(path)?;
        placeholder::substitute(&mut raw, &self.global_vars, path)?;
        context::apply(&mut self.root, &raw, path)?;
        Ok(self)
    }

    /// Like [`Config::with_context`], but parses `text` directly.
    pub fn with_context_str(mut self, text: &str, origin: impl AsRef<Utf8Path>) -> Result<Self, ConfigError> {
        let origin = origin.as_ref();
        let mut raw = parse_document(text, origin)?;
        placeholder::substitute(&mut raw, &self.global_vars, origin)?;
        context::apply(&mut self.root, &raw, origin)?;
        Ok(self)
    }
}

fn cycle_key(path: &Utf8Path, part: Option<&str>) -> String {
    format!("{path}#{}", part.unwrap_or(""))
}

fn load_file(path: &Utf8Path) -> Result<ConfigValue, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_owned(), e))?;
    parse_document(&text, path)
}

/// YAML is a superset of JSON in practice, so both config formats share one
/// parser (spec §6: "YAML or JSON, used interchangeably").
fn parse_document(text: &str, path: &Utf8Path) -> Result<ConfigValue, ConfigError> {
    let value: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(path.to_owned(), e.to_string()))?;
    Ok(ConfigValue::from(value))
}

/// Resolves one `uses:` list entry into a child [`ConfigNode`], recursing
/// into its own `uses` list. Shared by ordinary config loading and by
/// context-overlay `uses` entries.
pub(crate) fn load_uses_entry(
    entry: &str,
    current_file: &Utf8Path,
    parent_namespace: &Option<String>,
    global_vars: &IndexMap<String, String>,
    visiting: &mut Vec<String>,
) -> Result<ConfigNode, ConfigError> {
    let uses_ref = uses::parse(entry);

    let target_file: Utf8PathBuf = match &uses_ref.path {
        Some(p) if p.is_absolute() => p.clone(),
        Some(p) => current_file.parent().map(|dir| dir.join(p)).unwrap_or_else(|| p.clone()),
        None => current_file.to_owned(),
    };

    let key = cycle_key(&target_file, uses_ref.part.as_deref());
    if visiting.contains(&key) {
        return Err(ConfigError::UsesCycle(key));
    }
    visiting.push(key);

    let child_namespace = match (parent_namespace, &uses_ref.namespace) {
        (Some(outer), Some(alias)) => Some(format!("{outer}::{alias}")),
        (None, Some(alias)) => Some(alias.clone()),
        (existing, None) => existing.clone(),
    };

    let name = uses_ref
        .part
        .clone()
        .or_else(|| target_file.file_stem().map(str::to_owned))
        .unwrap_or_else(|| "config".to_string());

    let raw = load_file(&target_file)?;
    let selected = multipart::select(raw, uses_ref.part.as_deref(), &target_file)?;
    let node = build_node(selected, &target_file, child_namespace, name, global_vars, visiting)?;

    visiting.pop();
    Ok(node)
}

fn build_node(
    doc: ConfigValue,
    current_file: &Utf8Path,
    namespace: Option<String>,
    name: String,
    global_vars: &IndexMap<String, String>,
    visiting: &mut Vec<String>,
) -> Result<ConfigNode, ConfigError> {
    let mut doc = doc;
    placeholder::substitute(&mut doc, global_vars, current_file)?;

    let mut map = match doc {
        ConfigValue::Mapping(m) => m,
        _ => IndexMap::new(),
    };

    let tasks = map.shift_remove("tasks").map(|v| v.as_string_list());
    let excluded_tasks = map.shift_remove("excluded_tasks").map(|v| v.as_string_list());
    let human_readable_data_name = map
        .shift_remove("human_readable_data_name")
        .and_then(|v| v.as_str().map(str::to_owned));
    let uses_val = map.shift_remove("uses");

    let mut children = Vec::new();
    if let Some(uses_val) = uses_val {
        for entry in uses_val.as_string_list() {
            children.push(load_uses_entry(&entry, current_file, &namespace, global_vars, visiting)?);
        }
    }

    Ok(ConfigNode {
        name,
        namespace,
        params: map,
        tasks,
        excluded_tasks,
        human_readable_data_name,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_document_config_has_no_children() {
        let cfg = Config::from_str("lr: 0.1\nbatch_size: 32\n", "root.yaml", IndexMap::new(), None).unwrap();
        assert!(cfg.root.children.is_empty());
        assert_eq!(cfg.root.params.get("lr"), Some(&ConfigValue::Float(0.1)));
    }

    #[test]
    fn placeholder_is_substituted_from_global_vars() {
        let mut vars = IndexMap::new();
        vars.insert("SPLIT".to_string(), "train".to_string());
        let cfg = Config::from_str("path: /data/{SPLIT}.tsv\n", "root.yaml", vars, None).unwrap();
        assert_eq!(cfg.root.params.get("path").unwrap().as_str(), Some("/data/train.tsv"));
    }

    #[test]
    fn reserved_key_in_context_overlay_is_rejected() {
        let cfg = Config::from_str("lr: 0.1\n", "root.yaml", IndexMap::new(), None).unwrap();
        let err = cfg.with_context_str("tasks: foo.Bar\n", "ctx.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::ReservedParameterName(_)));
    }

    #[test]
    fn tasks_and_excluded_tasks_are_pulled_out_of_params() {
        let cfg = Config::from_str(
            "tasks: [foo.*, bar.Baz]\nexcluded_tasks: bar.Qux\nlr: 0.1\n",
            "root.yaml",
            IndexMap::new(),
            None,
        )
        .unwrap();
        assert_eq!(cfg.root.tasks, Some(vec!["foo.*".to_string(), "bar.Baz".to_string()]));
        assert_eq!(cfg.root.excluded_tasks, Some(vec!["bar.Qux".to_string()]));
        assert!(!cfg.root.params.contains_key("tasks"));
    }

    #[test]
    fn root_config_part_selects_a_configs_sub_entry() {
        let cfg = Config::from_str(
            "configs:\n  train:\n    main_part: true\n    lr: 0.1\n  eval:\n    lr: 0.2\n",
            "root.yaml",
            IndexMap::new(),
            Some("eval"),
        )
        .unwrap();
        assert_eq!(cfg.root.params.get("lr"), Some(&ConfigValue::Float(0.2)));
        assert_eq!(cfg.root.name, "eval");
    }
}
