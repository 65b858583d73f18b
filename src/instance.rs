//! Task instances: a [`TaskClass`] bound to one [`crate::config::ConfigNode`]
//! (spec §3, §4.2). [`TaskMeta`] is the plain data a [`crate::chain::Chain`]
//! stores per DAG node; [`TaskInstance`] is the handle callers get back from
//! [`crate::chain::Chain::task`]/[`crate::chain::Chain::tasks`] and is where
//! the public per-task API lives.

use std::sync::Arc;

use camino::Utf8PathBuf;
use petgraph::graph::NodeIndex;

use crate::chain::ChainShared;
use crate::core::Dynamic;
use crate::error::TaskChainError;
use crate::fingerprint::Fingerprint;
use crate::handler::HandlerKind;
use crate::run_info::RunInfo;
use crate::task::ParameterSet;

/// The data a [`crate::chain::Chain`] stores per DAG node.
#[derive(Debug, Clone)]
pub struct TaskMeta {
    pub class_full_name: String,
    pub group: String,
    pub name: String,
    pub namespace: Option<String>,
    pub params: ParameterSet,
    pub fingerprint: Fingerprint,
    /// The name of the [`crate::config::ConfigNode`] that selected this
    /// task — a file stem or multi-part name, used as the artifact key
    /// under [`crate::core::Mode::ConfigName`] instead of the fingerprint.
    pub owning_config_name: String,
    pub human_readable_data_name: Option<String>,
    pub handler_kind: HandlerKind,
}

impl TaskMeta {
    /// `"{namespace}::{group}:{name}"`, or `"{group}:{name}"` with no namespace
    /// — the same qualified form [`crate::linker::LinkCandidate`] uses.
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}::{}:{}", self.group, self.name),
            None => format!("{}:{}", self.group, self.name),
        }
    }
}

/// A handle to one resolved task instance within a built [`crate::chain::Chain`].
///
/// Cheap to clone: it's a shared pointer into the chain plus a node index,
/// not a copy of the instance's data.
#[derive(Clone)]
pub struct TaskInstance {
    pub(crate) chain: Arc<ChainShared>,
    pub(crate) index: NodeIndex,
}

impl TaskInstance {
    pub(crate) fn new(chain: Arc<ChainShared>, index: NodeIndex) -> Self {
        TaskInstance { chain, index }
    }

    fn meta(&self) -> &TaskMeta {
        &self.chain.graph[self.index]
    }

    pub fn full_name(&self) -> String {
        self.meta().full_name()
    }

    pub fn class_full_name(&self) -> &str {
        &self.meta().class_full_name
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.meta().fingerprint
    }

    pub fn params(&self) -> &ParameterSet {
        &self.meta().params
    }

    /// Computes the task's value, reusing a cached or persisted result when
    /// one exists for this instance's fingerprint (spec §4.7).
    pub fn value(&self) -> Result<Dynamic, TaskChainError> {
        crate::executor::value(&self.chain, self.index)
    }

    /// Forces recomputation: drops the in-memory cache entry and, if
    /// `delete_data` is set, removes the persisted artifact too, so the
    /// next [`TaskInstance::value`] call reruns the task (spec §6 `force`).
    pub fn force(&self, delete_data: bool) -> Result<(), TaskChainError> {
        crate::executor::force(&self.chain, self.index, delete_data)
    }

    /// Whether a persisted artifact exists for this instance's fingerprint,
    /// without triggering computation.
    pub fn has_data(&self) -> bool {
        crate::executor::has_data(&self.chain, self.index)
    }

    /// The artifact path this instance's data handler reads and writes,
    /// including its extension.
    pub fn data_path(&self) -> Utf8PathBuf {
        crate::executor::data_path(&self.chain, self.index)
    }

    /// Reads this instance's run-info sidecar, if it has ever run (spec §4.6).
    pub fn run_info(&self) -> Result<Option<RunInfo>, TaskChainError> {
        let path = crate::executor::run_info_path(&self.chain, self.index);
        crate::run_info::read(&path).map_err(TaskChainError::from)
    }

    /// The path of this instance's per-task log sidecar (spec §4.6), a
    /// sibling of [`TaskInstance::data_path`] with a `.log` extension.
    /// Written only while the task is actually running — see
    /// [`crate::executor::value`] — so this path may not exist yet for a
    /// task that has never been computed.
    pub fn log(&self) -> Utf8PathBuf {
        crate::executor::log_path(&self.chain, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigValue;
    use crate::task::ParamSpec;

    #[test]
    fn full_name_includes_namespace_when_present() {
        let mut params = ParameterSet::new();
        params.insert("lr", ConfigValue::Float(0.1));

        let meta = TaskMeta {
            class_full_name: "training.Train".to_string(),
            group: "training".to_string(),
            name: "Train".to_string(),
            namespace: Some("experiment_a".to_string()),
            params,
            fingerprint: Fingerprint::compute("training.Train", &[ParamSpec::required("lr")], &{
                let mut p = ParameterSet::new();
                p.insert("lr", ConfigValue::Float(0.1));
                p
            }, &[]),
            owning_config_name: "experiment_a".to_string(),
            human_readable_data_name: None,
            handler_kind: HandlerKind::Single,
        };

        assert_eq!(meta.full_name(), "experiment_a::training:Train");
    }

    #[test]
    fn full_name_has_no_namespace_prefix_at_the_root() {
        let meta = TaskMeta {
            class_full_name: "training.Train".to_string(),
            group: "training".to_string(),
            name: "Train".to_string(),
            namespace: None,
            params: ParameterSet::new(),
            fingerprint: Fingerprint::compute("training.Train", &[], &ParameterSet::new(), &[]),
            owning_config_name: "root".to_string(),
            human_readable_data_name: None,
            handler_kind: HandlerKind::Single,
        };
        assert_eq!(meta.full_name(), "training:Train");
    }
}
