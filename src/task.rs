//! Task classes: the static, code-defined side of a task (spec §3, §4.2-§4.3).
//!
//! A [`TaskClass`] is a small, usually zero-sized type implementing this
//! trait and registered with [`crate::registry`] via `inventory::submit!`.
//! It declares its group, its parameters, and the input-task references it
//! needs, and knows how to run given a bound [`ParameterSet`] and resolved
//! inputs. The trait object is what the Parameter Binder, Dependency
//! Linker, and Execution Engine all operate on; concrete task types never
//! appear outside their own module.

use std::any::Any;
use std::sync::Arc;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;

use crate::config::ConfigValue;
use crate::core::Dynamic;

/// How a declared parameter's value is obtained and whether it affects the
/// fingerprint (spec §4.3, §4.5).
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// The name this task expects; may differ from the name looked up in
    /// config via [`ParamSpec::config_name`].
    pub name: &'static str,
    /// Config key to look up, if different from `name`. Defaults to `name`.
    pub config_name: Option<&'static str>,
    /// Present unless the parameter is required.
    pub default: Option<ConfigValue>,
    /// Excluded from the fingerprint even though it affects the task's
    /// behavior (spec §4.5 "ignore_persistence").
    pub ignore_persistence: bool,
    /// When the bound value equals `default`, omit it from the fingerprint
    /// computation entirely rather than hashing the default (spec §4.5).
    pub dont_persist_default_value: bool,
}

impl ParamSpec {
    pub fn required(name: &'static str) -> Self {
        ParamSpec {
            name,
            config_name: None,
            default: None,
            ignore_persistence: false,
            dont_persist_default_value: false,
        }
    }

    pub fn with_default(name: &'static str, default: ConfigValue) -> Self {
        ParamSpec {
            name,
            config_name: None,
            default: Some(default),
            ignore_persistence: false,
            dont_persist_default_value: false,
        }
    }

    pub fn config_name(mut self, name: &'static str) -> Self {
        self.config_name = Some(name);
        self
    }

    pub fn ignore_persistence(mut self) -> Self {
        self.ignore_persistence = true;
        self
    }

    pub fn dont_persist_default_value(mut self) -> Self {
        self.dont_persist_default_value = true;
        self
    }

    /// The key this parameter is looked up under in a ConfigNode's params.
    pub fn lookup_name(&self) -> &'static str {
        self.config_name.unwrap_or(self.name)
    }
}

/// A declared input-task reference (spec §4.4). `pattern` carries the full
/// reference grammar as a single string, resolved by
/// [`crate::linker`]:
///
/// - a bare dotted class name (`"preprocessing.Tokenize"`) matches every
///   instance of that class;
/// - `"group:name"` matches one instance by its declared name;
/// - `"namespace::group:name"` additionally pins the namespace exactly;
/// - `"~/regex/"` matches any candidate whose qualified name matches the
///   regex;
/// - a leading `"~~"` ignores namespace scoping and searches the whole
///   chain instead of the referencing task's own namespace ancestry.
#[derive(Debug, Clone)]
pub struct InputRefSpec {
    pub pattern: &'static str,
    pub required: bool,
}

impl InputRefSpec {
    pub fn new(pattern: &'static str) -> Self {
        InputRefSpec { pattern, required: true }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// The bound parameter values for one task instance, keyed by
/// [`ParamSpec::name`] (not `config_name`).
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    values: IndexMap<String, ConfigValue>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ConfigValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.values.get(name)
    }

    /// Iterates in insertion (declaration) order — the order the
    /// Fingerprint Engine hashes parameters in (spec §4.5).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Coerces a bound parameter into a concrete Rust type. Task
    /// implementations call this from `run` rather than matching on
    /// [`ConfigValue`] directly — the declarative parameter builder (spec
    /// §9 design note 1) covers presence/defaults, this covers shape.
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T, crate::error::ParamError> {
        let value = self
            .values
            .get(name)
            .cloned()
            .ok_or_else(|| crate::error::ParamError::MissingRequired(name.to_string(), String::new()))?;
        let json: serde_json::Value = value.into();
        serde_json::from_value(json).map_err(|e| crate::error::ParamError::CoercionFailed {
            name: name.to_string(),
            task: String::new(),
            reason: e.to_string(),
        })
    }
}

/// One resolved input slot: either the single instance a plain or
/// group/namespace reference resolves to, or the ordered collection a
/// regex-marker (`~/.../`) reference resolves to (spec §4.4).
enum InputSlot {
    Single(Dynamic),
    Many(Vec<Dynamic>),
}

/// Resolved input-task values handed to [`TaskClass::run`], keyed by the
/// declared reference name.
#[derive(Default)]
pub struct InputMap {
    values: IndexMap<String, InputSlot>,
}

impl InputMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the single value a non-regex input reference resolved to.
    pub fn insert(&mut self, name: impl Into<String>, value: Dynamic) {
        self.values.insert(name.into(), InputSlot::Single(value));
    }

    /// Inserts the ordered collection of values a regex-marker input
    /// reference resolved to.
    pub fn insert_many(&mut self, name: impl Into<String>, values: Vec<Dynamic>) {
        self.values.insert(name.into(), InputSlot::Many(values));
    }

    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        match self.values.get(name)? {
            InputSlot::Single(v) => v.clone().downcast().ok(),
            InputSlot::Many(_) => None,
        }
    }

    pub fn get_dynamic(&self, name: &str) -> Option<&Dynamic> {
        match self.values.get(name)? {
            InputSlot::Single(v) => Some(v),
            InputSlot::Many(_) => None,
        }
    }

    /// The ordered collection a regex-marker input reference resolved to,
    /// downcast to `T`. `None` if the slot doesn't exist or was a single
    /// (non-regex) match instead.
    pub fn get_many<T: Any + Send + Sync>(&self, name: &str) -> Option<Vec<Arc<T>>> {
        match self.values.get(name)? {
            InputSlot::Many(values) => values.iter().map(|v| v.clone().downcast().ok()).collect(),
            InputSlot::Single(_) => None,
        }
    }

    pub fn get_many_dynamic(&self, name: &str) -> Option<&[Dynamic]> {
        match self.values.get(name)? {
            InputSlot::Many(values) => Some(values),
            InputSlot::Single(_) => None,
        }
    }
}

/// What a running task is given access to beyond its params and inputs: the
/// artifact path its handler will persist to, already created on disk where
/// the handler needs that (a directory handler's directory, a continuable
/// handler's parent directory) before `run`/`run_typed` is invoked. A
/// directory-backed task writes its own files under [`TaskContext::artifact_path`]
/// directly; other handlers just ignore it.
pub struct TaskContext {
    artifact_path: Utf8PathBuf,
}

impl TaskContext {
    pub(crate) fn new(artifact_path: Utf8PathBuf) -> Self {
        TaskContext { artifact_path }
    }

    /// The path this instance's data handler will read and write, with its
    /// extension already applied — for [`crate::handler::HandlerKind::Directory`]
    /// this is the directory itself, already created.
    pub fn artifact_path(&self) -> &Utf8Path {
        &self.artifact_path
    }
}

/// The static, code-defined description of a task (spec §3 TaskClass).
///
/// Implementors are typically unit structs registered once via
/// `inventory::submit!` in [`crate::registry`]; `run` is where the actual
/// work happens.
pub trait TaskClass: Send + Sync {
    /// The group this class belongs to, used in `group:name` references.
    fn group(&self) -> &'static str;

    /// The class's own name within its group.
    fn name(&self) -> &'static str;

    /// Dotted path used for registration and `tasks:`/`excluded_tasks:`
    /// selectors (spec §4.2, §6): `"{group}.{name}"`.
    fn full_name(&self) -> String {
        format!("{}.{}", self.group(), self.name())
    }

    /// Abstract classes declare parameters and inputs for concrete
    /// subclasses but are never themselves instantiated (spec §4.2).
    fn is_abstract(&self) -> bool {
        false
    }

    /// Parameters this task's `run` method expects.
    fn params(&self) -> Vec<ParamSpec>;

    /// Input-task references this task's `run` method expects.
    fn inputs(&self) -> Vec<(&'static str, InputRefSpec)> {
        Vec::new()
    }

    /// A short name for the return type, used in diagnostics and loose
    /// return-type validation (spec §4.7).
    fn return_type_name(&self) -> &'static str;

    /// Which [`crate::handler::HandlerKind`] persists this task's output
    /// (spec §4.6, §9 design note 3).
    fn handler_kind(&self) -> crate::handler::HandlerKind {
        crate::handler::HandlerKind::Single
    }

    /// Executes the task, given its bound parameters, resolved inputs, and
    /// its artifact-path context. Returns a type-erased value; the
    /// Execution Engine validates its concrete type against
    /// [`TaskClass::return_type_name`] leniently.
    fn run(&self, params: &ParameterSet, inputs: &InputMap, ctx: &TaskContext) -> Result<Dynamic>;

    /// Converts a run result into the JSON the Data Handler Layer persists
    /// (spec §4.6). Implemented automatically for [`TypedTaskClass`]s; a
    /// hand-rolled [`TaskClass`] that never persists can leave this as-is.
    fn serialize_output(&self, _value: &Dynamic) -> Result<serde_json::Value> {
        anyhow::bail!("task class `{}` does not implement output serialization", self.full_name())
    }

    /// The inverse of [`TaskClass::serialize_output`], used when a data
    /// handler reloads a previously persisted artifact instead of rerunning
    /// the task.
    fn deserialize_output(&self, _value: serde_json::Value) -> Result<Dynamic> {
        anyhow::bail!("task class `{}` does not implement output deserialization", self.full_name())
    }
}

/// The ergonomic trait most task classes implement directly: an `Output`
/// associated type instead of hand-rolled `Dynamic` erasure and JSON
/// (de)serialization. The blanket impl below bridges it onto [`TaskClass`],
/// the same `TypedX -> X` shape the teacher uses for its own task/handle
/// erasure.
pub trait TypedTaskClass: Send + Sync {
    type Output: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static;

    fn group(&self) -> &'static str;
    fn name(&self) -> &'static str;

    fn is_abstract(&self) -> bool {
        false
    }

    fn params(&self) -> Vec<ParamSpec>;

    fn inputs(&self) -> Vec<(&'static str, InputRefSpec)> {
        Vec::new()
    }

    fn return_type_name(&self) -> &'static str {
        std::any::type_name::<Self::Output>()
    }

    fn handler_kind(&self) -> crate::handler::HandlerKind {
        crate::handler::HandlerKind::Single
    }

    fn run_typed(&self, params: &ParameterSet, inputs: &InputMap, ctx: &TaskContext) -> Result<Self::Output>;
}

impl<X: TypedTaskClass> TaskClass for X {
    fn group(&self) -> &'static str {
        TypedTaskClass::group(self)
    }

    fn name(&self) -> &'static str {
        TypedTaskClass::name(self)
    }

    fn is_abstract(&self) -> bool {
        TypedTaskClass::is_abstract(self)
    }

    fn params(&self) -> Vec<ParamSpec> {
        TypedTaskClass::params(self)
    }

    fn inputs(&self) -> Vec<(&'static str, InputRefSpec)> {
        TypedTaskClass::inputs(self)
    }

    fn return_type_name(&self) -> &'static str {
        TypedTaskClass::return_type_name(self)
    }

    fn handler_kind(&self) -> crate::handler::HandlerKind {
        TypedTaskClass::handler_kind(self)
    }

    fn run(&self, params: &ParameterSet, inputs: &InputMap, ctx: &TaskContext) -> Result<Dynamic> {
        let output = self.run_typed(params, inputs, ctx)?;
        Ok(Arc::new(output))
    }

    fn serialize_output(&self, value: &Dynamic) -> Result<serde_json::Value> {
        let typed = value
            .downcast_ref::<X::Output>()
            .ok_or_else(|| anyhow::anyhow!("return value did not match the declared Output type"))?;
        Ok(serde_json::to_value(typed)?)
    }

    fn deserialize_output(&self, value: serde_json::Value) -> Result<Dynamic> {
        let typed: X::Output = serde_json::from_value(value)?;
        Ok(Arc::new(typed))
    }
}
