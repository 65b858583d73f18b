//! Parameter Binder (spec §4.3): resolves a task class's declared
//! parameters against the ConfigNode tree.
//!
//! A parameter is looked up starting at the task's own owning ConfigNode
//! and walking outward through its `uses`-ancestors (the chain of configs
//! that pulled it in); the nearest config that declares the key wins. A
//! parameter with no binding anywhere in the chain falls back to its
//! declared default, or is a [`ParamError::MissingRequired`].

use crate::config::RESERVED_PARAMS;
use crate::error::ParamError;
use crate::task::{ParamSpec, ParameterSet, TaskClass};
use crate::config::ConfigNode;

/// Binds every parameter `class` declares, searching `ancestry` from the
/// last element (the task's owning node) back to the first (the root).
pub fn bind(class: &dyn TaskClass, ancestry: &[&ConfigNode]) -> Result<ParameterSet, ParamError> {
    let mut set = ParameterSet::new();

    for spec in class.params() {
        if RESERVED_PARAMS.contains(&spec.name) {
            return Err(ParamError::ReservedName(spec.name.to_string()));
        }

        let value = resolve_one(&spec, ancestry).ok_or_else(|| {
            ParamError::MissingRequired(spec.name.to_string(), class.full_name())
        })?;

        set.insert(spec.name, value);
    }

    Ok(set)
}

fn resolve_one(spec: &ParamSpec, ancestry: &[&ConfigNode]) -> Option<crate::config::ConfigValue> {
    let lookup = spec.lookup_name();

    for node in ancestry.iter().rev() {
        if let Some(value) = node.params.get(lookup) {
            return Some(value.clone());
        }
    }

    spec.default.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigValue;
    use crate::core::Dynamic;
    use crate::task::InputMap;
    use indexmap::IndexMap;
    use std::sync::Arc;

    fn node(name: &str, params: &[(&str, ConfigValue)]) -> ConfigNode {
        let mut map = IndexMap::new();
        for (k, v) in params {
            map.insert(k.to_string(), v.clone());
        }
        ConfigNode {
            name: name.to_string(),
            namespace: None,
            params: map,
            tasks: None,
            excluded_tasks: None,
            human_readable_data_name: None,
            children: Vec::new(),
        }
    }

    struct Train;
    impl TaskClass for Train {
        fn group(&self) -> &'static str {
            "training"
        }
        fn name(&self) -> &'static str {
            "Train"
        }
        fn params(&self) -> Vec<ParamSpec> {
            vec![
                ParamSpec::required("lr"),
                ParamSpec::with_default("epochs", ConfigValue::Int(10)),
            ]
        }
        fn return_type_name(&self) -> &'static str {
            "Model"
        }
        fn run(&self, _params: &ParameterSet, _inputs: &InputMap, _ctx: &crate::task::TaskContext) -> anyhow::Result<Dynamic> {
            Ok(Arc::new(()))
        }
    }

    #[test]
    fn nearest_ancestor_wins() {
        let root = node("root", &[("lr", ConfigValue::Float(0.1))]);
        let child = node("child", &[("lr", ConfigValue::Float(0.5))]);
        let ancestry = [&root, &child];

        let bound = bind(&Train, &ancestry).unwrap();
        assert_eq!(bound.get("lr"), Some(&ConfigValue::Float(0.5)));
    }

    #[test]
    fn falls_back_to_ancestor_when_owning_node_is_silent() {
        let root = node("root", &[("lr", ConfigValue::Float(0.1))]);
        let child = node("child", &[]);
        let ancestry = [&root, &child];

        let bound = bind(&Train, &ancestry).unwrap();
        assert_eq!(bound.get("lr"), Some(&ConfigValue::Float(0.1)));
    }

    #[test]
    fn missing_required_with_no_default_anywhere_is_an_error() {
        let root = node("root", &[]);
        let ancestry = [&root];
        let err = bind(&Train, &ancestry).unwrap_err();
        assert!(matches!(err, ParamError::MissingRequired(_, _)));
    }

    #[test]
    fn unset_optional_falls_back_to_declared_default() {
        let root = node("root", &[("lr", ConfigValue::Float(0.1))]);
        let ancestry = [&root];
        let bound = bind(&Train, &ancestry).unwrap();
        assert_eq!(bound.get("epochs"), Some(&ConfigValue::Int(10)));
    }
}
