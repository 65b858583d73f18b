//! Chain assembly: turns a resolved [`crate::config::Config`] and a
//! [`crate::registry::Registry`] into a runnable DAG of [`TaskInstance`]s.
//!
//! [`Chain::build`] is the pipeline the rest of the crate exists to serve:
//! walk the config tree collecting task instances per `tasks:` selection
//! (Task Registry), bind their parameters against the owning node's
//! ancestry (Parameter Binder), resolve their declared input references
//! against every other instance (Dependency Linker), topologically sort the
//! result, and compute each instance's [`Fingerprint`] in dependency order.
//! [`crate::executor`] is what actually runs a task once this graph exists.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;
use petgraph::algo::toposort;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::Direction;

use crate::binder;
use crate::config::{Config, ConfigNode};
use crate::core::{Dynamic, Mode};
use crate::error::{ResolveError, TaskChainError};
use crate::fingerprint::Fingerprint;
use crate::instance::{TaskInstance, TaskMeta};
use crate::linker::{self, LinkCandidate};
use crate::registry::Registry;
use crate::task::{ParameterSet, TaskClass};

fn level_rank(level: tracing::Level) -> u8 {
    match level {
        tracing::Level::TRACE => 0,
        tracing::Level::DEBUG => 1,
        tracing::Level::INFO => 2,
        tracing::Level::WARN => 3,
        tracing::Level::ERROR => 4,
    }
}

/// The weight of one DAG edge: which declared input slot it fills, and its
/// position within that slot. Always `0` for a plain/group/namespace
/// reference; a regex-marker reference (spec §4.4) may add several edges
/// into the same slot, ordered by `ordinal`.
#[derive(Debug, Clone)]
pub(crate) struct InputEdge {
    pub name: String,
    pub ordinal: usize,
}

/// The data shared by every [`TaskInstance`] cloned out of a [`Chain`]: the
/// DAG itself, the registry it was resolved against, and the small amount of
/// mutable, cross-cutting state (in-memory cache, logging gate, filename
/// style) that a chain-wide setting like
/// [`Chain::create_readable_filenames`] needs to reach every instance.
pub struct ChainShared {
    pub(crate) graph: Graph<TaskMeta, InputEdge>,
    pub(crate) registry: Registry,
    pub(crate) artifact_root: Utf8PathBuf,
    pub(crate) mode: Mode,
    pub(crate) cache: Mutex<HashMap<NodeIndex, Dynamic>>,
    pub(crate) readable_filenames: AtomicBool,
    log_gate: AtomicU8,
}

impl ChainShared {
    /// The least-verbose level a task's `.log` sidecar accepts while it
    /// runs, per [`Chain::set_log_level`] — the inverse of [`level_rank`].
    pub(crate) fn min_level(&self) -> tracing::Level {
        match self.log_gate.load(Ordering::Relaxed) {
            0 => tracing::Level::TRACE,
            1 => tracing::Level::DEBUG,
            2 => tracing::Level::INFO,
            3 => tracing::Level::WARN,
            _ => tracing::Level::ERROR,
        }
    }
}

/// A resolved, runnable DAG of task instances (spec §4.2, §4.7).
#[derive(Clone)]
pub struct Chain {
    shared: Arc<ChainShared>,
    by_full_name: HashMap<String, NodeIndex>,
}

impl Chain {
    /// Resolves `config` against `registry` into a runnable chain. Artifacts
    /// are persisted under `artifact_root`, keyed per `mode` (spec §6
    /// "Parameter-mode toggle").
    pub fn build(config: &Config, registry: Registry, artifact_root: impl Into<Utf8PathBuf>, mode: Mode) -> Result<Chain, TaskChainError> {
        let mut graph: Graph<TaskMeta, InputEdge> = Graph::new();
        let mut candidates: Vec<LinkCandidate> = Vec::new();
        let mut seen = HashSet::new();

        collect_instances(&config.root, &mut Vec::new(), &registry, &mut graph, &mut candidates, &mut seen)?;
        link_instances(&registry, &candidates, &mut graph)?;
        compute_fingerprints(&registry, &mut graph)?;

        let by_full_name = graph.node_indices().map(|i| (graph[i].full_name(), i)).collect();

        let shared = Arc::new(ChainShared {
            graph,
            registry,
            artifact_root: artifact_root.into(),
            mode,
            cache: Mutex::new(HashMap::new()),
            readable_filenames: AtomicBool::new(false),
            log_gate: AtomicU8::new(level_rank(tracing::Level::INFO)),
        });

        Ok(Chain { shared, by_full_name })
    }

    /// Looks up one instance by its qualified name (`"group:name"`, or
    /// `"namespace::group:name"`).
    pub fn task(&self, name: &str) -> Result<TaskInstance, TaskChainError> {
        let index = *self
            .by_full_name
            .get(name)
            .ok_or_else(|| ResolveError::UnknownTask(name.to_string()))?;
        Ok(TaskInstance::new(Arc::clone(&self.shared), index))
    }

    /// The persistence-key mode this chain was built with (spec §6
    /// "Parameter-mode toggle"), consulted by [`crate::multichain::MultiChain`]
    /// to reject mismatched member chains.
    pub fn mode(&self) -> Mode {
        self.shared.mode
    }

    /// Every instance in the chain, in no particular order.
    pub fn tasks(&self) -> Vec<TaskInstance> {
        self.shared
            .graph
            .node_indices()
            .map(|i| TaskInstance::new(Arc::clone(&self.shared), i))
            .collect()
    }

    /// A tabular summary of every instance: qualified name, class, content
    /// fingerprint, and whether its artifact already exists (spec §6 "chain
    /// overview").
    pub fn tasks_df(&self) -> TasksSummary {
        let rows = self
            .tasks()
            .into_iter()
            .map(|t| TasksSummaryRow {
                full_name: t.full_name(),
                class_full_name: t.class_full_name().to_string(),
                fingerprint: t.fingerprint().to_hex(),
                has_data: t.has_data(),
            })
            .collect();
        TasksSummary { rows }
    }

    /// Forces recomputation of the named instances (spec §6 `force`):
    /// drops their cached/persisted results, and, if `recompute`, reruns
    /// them immediately rather than waiting for the next
    /// [`TaskInstance::value`] call.
    pub fn force(&self, names: &[String], recompute: bool, delete_data: bool) -> Result<(), TaskChainError> {
        for name in names {
            let instance = self.task(name)?;
            instance.force(delete_data)?;
            if recompute {
                instance.value()?;
            }
        }
        Ok(())
    }

    /// Switches artifact filenames from fingerprint hex to a
    /// human-readable slug where one is declared (spec §4.6
    /// `human_readable_data_name`).
    pub fn create_readable_filenames(&self) {
        self.shared.readable_filenames.store(true, Ordering::Relaxed);
    }

    /// Sets the minimum `tracing` level recorded into each task's per-task
    /// `.log` sidecar (spec §4.6) while it runs.
    pub fn set_log_level(&self, level: tracing::Level) {
        self.shared.log_gate.store(level_rank(level), Ordering::Relaxed);
    }
}

/// Walks `node` and its descendants, binding one [`TaskMeta`] per selected
/// task class and recording a [`LinkCandidate`] for the Dependency Linker.
fn collect_instances<'a>(
    node: &'a ConfigNode,
    ancestry: &mut Vec<&'a ConfigNode>,
    registry: &Registry,
    graph: &mut Graph<TaskMeta, InputEdge>,
    candidates: &mut Vec<LinkCandidate>,
    seen: &mut HashSet<String>,
) -> Result<(), TaskChainError> {
    ancestry.push(node);

    if let Some(tasks) = &node.tasks {
        let selected = registry.resolve_selection(Some(tasks), node.excluded_tasks.as_deref());
        for class_full_name in selected {
            let class = registry
                .get(&class_full_name)
                .expect("resolve_selection only returns names present in the registry");

            // A wildcard selector may sweep up an abstract base class; it
            // declares shared params/inputs for its concrete subclasses but
            // is never itself instantiated (spec §4.2).
            if class.is_abstract() {
                continue;
            }

            let params = binder::bind(class, ancestry)?;
            let namespace = node.namespace.clone();
            let meta = TaskMeta {
                class_full_name: class_full_name.clone(),
                group: class.group().to_string(),
                name: class.name().to_string(),
                namespace: namespace.clone(),
                params,
                fingerprint: Fingerprint::compute(&class_full_name, &[], &ParameterSet::new(), &[]),
                owning_config_name: node.name.clone(),
                human_readable_data_name: node.human_readable_data_name.clone(),
                handler_kind: class.handler_kind(),
            };

            let full_name = meta.full_name();
            if !seen.insert(full_name.clone()) {
                return Err(TaskChainError::from(ResolveError::DuplicateFullName(full_name)));
            }

            let group = meta.group.clone();
            let name = meta.name.clone();
            let index = graph.add_node(meta);
            candidates.push(LinkCandidate {
                index: index.index(),
                group,
                name,
                namespace,
                class_full_name,
            });
        }
    }

    for child in &node.children {
        collect_instances(child, ancestry, registry, graph, candidates, seen)?;
    }

    ancestry.pop();
    Ok(())
}

/// Resolves every instance's declared [`crate::task::InputRefSpec`]s against
/// `candidates` and wires the resulting DAG edges (dependency -> dependent,
/// weighted by the declared input slot name).
fn link_instances(registry: &Registry, candidates: &[LinkCandidate], graph: &mut Graph<TaskMeta, InputEdge>) -> Result<(), TaskChainError> {
    for index in graph.node_indices().collect::<Vec<_>>() {
        let class_full_name = graph[index].class_full_name.clone();
        let class = registry.get(&class_full_name).expect("every node's class is registered");
        let referencer_namespace = graph[index].namespace.clone();
        let referencer_full_name = graph[index].full_name();

        for (input_name, spec) in class.inputs() {
            if linker::is_regex_pattern(spec.pattern) {
                let matches = linker::resolve_many(&spec, &referencer_full_name, &referencer_namespace, candidates)?;
                for (ordinal, candidate_idx) in matches.into_iter().enumerate() {
                    let dep = NodeIndex::new(candidates[candidate_idx].index);
                    graph.add_edge(dep, index, InputEdge { name: input_name.to_string(), ordinal });
                }
            } else if let Some(candidate_idx) = linker::resolve_single(&spec, &referencer_full_name, &referencer_namespace, candidates)? {
                let dep = NodeIndex::new(candidates[candidate_idx].index);
                graph.add_edge(dep, index, InputEdge { name: input_name.to_string(), ordinal: 0 });
            }
        }
    }
    Ok(())
}

/// Topologically sorts `graph` (erroring on a cycle) and computes each
/// node's [`Fingerprint`] in that order, so a dependency's fingerprint is
/// always available before its dependents need it (spec §4.5).
fn compute_fingerprints(registry: &Registry, graph: &mut Graph<TaskMeta, InputEdge>) -> Result<(), TaskChainError> {
    let order = toposort(&*graph, None)
        .map_err(|cycle| TaskChainError::from(ResolveError::DagCycle(format!("{:?}", cycle.node_id()))))?;

    for node in order {
        let class_full_name = graph[node].class_full_name.clone();
        let class = registry.get(&class_full_name).expect("every node's class is registered");

        let mut input_fingerprints = Vec::new();
        for (input_name, _spec) in class.inputs() {
            let mut edges: Vec<_> = graph
                .edges_directed(node, Direction::Incoming)
                .filter(|e| e.weight().name == input_name)
                .collect();
            edges.sort_by_key(|e| e.weight().ordinal);
            for edge in edges {
                input_fingerprints.push(graph[edge.source()].fingerprint);
            }
        }

        let params = graph[node].params.clone();
        let fingerprint = Fingerprint::compute(&class_full_name, &class.params(), &params, &input_fingerprints);
        graph[node].fingerprint = fingerprint;
    }

    Ok(())
}

pub struct TasksSummaryRow {
    pub full_name: String,
    pub class_full_name: String,
    pub fingerprint: String,
    pub has_data: bool,
}

/// A tabular view of a chain's instances, returned by [`Chain::tasks_df`].
pub struct TasksSummary {
    pub rows: Vec<TasksSummaryRow>,
}

impl std::fmt::Display for TasksSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:<40} {:<28} {:<34} {:<5}", "task", "class", "fingerprint", "data")?;
        for row in &self.rows {
            writeln!(f, "{:<40} {:<28} {:<34} {:<5}", row.full_name, row.class_full_name, row.fingerprint, row.has_data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigValue;
    use crate::core::Dynamic;
    use crate::task::{InputMap, InputRefSpec, ParamSpec};
    use indexmap::IndexMap;
    use std::sync::Arc as StdArc;

    struct LoadData;
    impl TaskClass for LoadData {
        fn group(&self) -> &'static str {
            "data"
        }
        fn name(&self) -> &'static str {
            "LoadData"
        }
        fn params(&self) -> Vec<ParamSpec> {
            vec![ParamSpec::with_default("path", ConfigValue::String("/data.csv".to_string()))]
        }
        fn return_type_name(&self) -> &'static str {
            "String"
        }
        fn run(&self, params: &ParameterSet, _inputs: &InputMap, _ctx: &crate::task::TaskContext) -> anyhow::Result<Dynamic> {
            let path: String = params.get_as("path")?;
            Ok(StdArc::new(path))
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
            vec![ParamSpec::with_default("lr", ConfigValue::Float(0.1))]
        }
        fn inputs(&self) -> Vec<(&'static str, InputRefSpec)> {
            vec![("data", InputRefSpec::new("data.LoadData"))]
        }
        fn return_type_name(&self) -> &'static str {
            "Model"
        }
        fn run(&self, _params: &ParameterSet, inputs: &InputMap, _ctx: &crate::task::TaskContext) -> anyhow::Result<Dynamic> {
            let data = inputs.get::<String>("data").expect("data input resolved");
            Ok(StdArc::new(format!("model-from-{data}")))
        }
    }

    fn registry_with(entries: Vec<Box<dyn TaskClass>>) -> Registry {
        let mut map = std::collections::BTreeMap::new();
        for entry in entries {
            map.insert(entry.full_name(), entry);
        }
        Registry::from_map_for_tests(map)
    }

    fn node(name: &str, tasks: Option<Vec<&str>>, params: &[(&str, ConfigValue)], children: Vec<ConfigNode>) -> ConfigNode {
        let mut map = IndexMap::new();
        for (k, v) in params {
            map.insert(k.to_string(), v.clone());
        }
        ConfigNode {
            name: name.to_string(),
            namespace: None,
            params: map,
            tasks: tasks.map(|t| t.into_iter().map(str::to_string).collect()),
            excluded_tasks: None,
            human_readable_data_name: None,
            children,
        }
    }

    #[test]
    fn build_links_dependency_edges_and_orders_fingerprints() {
        let registry = registry_with(vec![Box::new(LoadData), Box::new(Train)]);
        let root = node("root", Some(vec!["data.LoadData", "training.Train"]), &[], Vec::new());
        let mut config = Config::from_str("{}", "root.yaml", IndexMap::new(), None).unwrap();
        config.root = root;

        let chain = Chain::build(&config, registry, "/tmp/taskchain-test", Mode::Fingerprint).unwrap();
        let tasks = chain.tasks();
        assert_eq!(tasks.len(), 2);

        let train = chain.task("training:Train").unwrap();
        let load = chain.task("data:LoadData").unwrap();
        assert_ne!(train.fingerprint(), load.fingerprint());
    }

    #[test]
    fn duplicate_full_name_in_two_sibling_nodes_is_an_error() {
        let registry = registry_with(vec![Box::new(LoadData)]);
        let child_a = node("a", Some(vec!["data.LoadData"]), &[], Vec::new());
        let child_b = node("b", Some(vec!["data.LoadData"]), &[], Vec::new());
        let root = node("root", None, &[], vec![child_a, child_b]);

        let config = {
            let mut c = Config::from_str("{}", "root.yaml", IndexMap::new(), None).unwrap();
            c.root = root;
            c
        };

        let err = Chain::build(&config, registry, "/tmp/taskchain-test", Mode::Fingerprint).unwrap_err();
        assert!(matches!(err, TaskChainError::Resolve(ResolveError::DuplicateFullName(_))));
    }
}
