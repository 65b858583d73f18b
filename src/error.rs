//! Per-component error types, aggregated into [`TaskChainError`].
//!
//! Follows the teacher's shape of one `thiserror` enum per component wired
//! together with `#[from]`, so a caller can match on the narrow error type
//! returned by a single-component API, or let it bubble up as the aggregate.

use camino::Utf8PathBuf;
use thiserror::Error;

/// The top-level error type returned by chain construction and execution.
#[derive(Debug, Error)]
pub enum TaskChainError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("two member chains disagree on parameter_mode")]
    ParameterModeMismatch,

    #[error("duplicate chain name in MultiChain: {0}")]
    DuplicateChainName(String),

    #[error("no chain named `{0}` in this MultiChain")]
    UnknownChain(String),
}

/// Errors raised while loading a config document (spec §4.1, §7 "Load-time config error").
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{0}`: {1}")]
    Io(Utf8PathBuf, #[source] std::io::Error),

    #[error("failed to parse config `{0}`: {1}")]
    Parse(Utf8PathBuf, String),

    #[error("unresolved placeholder `{{{placeholder}}}` in `{path}`")]
    UnresolvedPlaceholder { path: Utf8PathBuf, placeholder: String },

    #[error("cycle detected in `uses` resolution: {0}")]
    UsesCycle(String),

    #[error("multi-part file `{0}` has no part named `{1}` and no `main_part`")]
    MissingPart(Utf8PathBuf, String),

    #[error("malformed overlay in context `{0}`: {1}")]
    MalformedOverlay(Utf8PathBuf, String),

    #[error("unknown task import `{0}`")]
    UnknownTaskImport(String),

    #[error("context overlay sets reserved parameter name `{0}`")]
    ReservedParameterName(String),
}

/// Errors raised while resolving ConfigNodes into TaskInstances (spec §4.2).
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("ambiguous task reference `{0}` matches instances in multiple namespaces: {1:?}")]
    AmbiguousReference(String, Vec<String>),

    #[error("cycle detected in task DAG: {0}")]
    DagCycle(String),

    #[error("duplicate task instance for full name `{0}`")]
    DuplicateFullName(String),

    #[error("task class `{0}` is abstract and cannot be instantiated")]
    AbstractClass(String),

    #[error("no task instance named `{0}` in this chain")]
    UnknownTask(String),
}

/// Errors raised while binding parameters (spec §4.3, §7 "Parameter error").
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("required parameter `{0}` on task `{1}` has no default and was not found in any reachable config")]
    MissingRequired(String, String),

    #[error("failed to coerce parameter `{name}` on task `{task}` to its declared type: {reason}")]
    CoercionFailed { name: String, task: String, reason: String },

    #[error("parameter name `{0}` is reserved and cannot be used as a user parameter")]
    ReservedName(String),

    #[error("failed to construct parameter object for `{0}`: {1}")]
    ParameterObject(String, String),
}

/// Errors raised while linking input-task references (spec §4.4).
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("input-task reference `{0}` on task `{1}` did not resolve to any instance")]
    Unresolved(String, String),

    #[error("input-task reference `{0}` on task `{1}` is ambiguous: matches {2:?}")]
    Ambiguous(String, String, Vec<String>),

    #[error("invalid regex in input-task reference `{0}`: {1}")]
    InvalidRegex(String, #[source] regex::Error),
}

/// Errors raised during task execution (spec §4.7, §7).
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("task `{0}` run-method returned a value that did not match its declared return type (expected {expected}, got {actual})", expected = .1, actual = .2)]
    TypeMismatch(String, &'static str, &'static str),

    #[error("task `{0}` run-method failed: {1}")]
    UserError(String, #[source] anyhow::Error),

    #[error("failed to write run-info sidecar for task `{0}`: {1}")]
    RunInfo(String, #[source] std::io::Error),
}

/// Errors raised while acquiring or releasing the per-artifact lock (spec §5, §9).
#[derive(Debug, Error)]
pub enum LockError {
    #[error("failed to open lock file `{0}`: {1}")]
    Open(Utf8PathBuf, #[source] std::io::Error),

    #[error("failed to acquire lock on `{0}`: {1}")]
    Acquire(Utf8PathBuf, #[source] std::io::Error),
}

/// Errors raised by a data handler (spec §4.6, §7 "Persistence failure").
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("failed to read artifact `{0}`: {1}")]
    Read(Utf8PathBuf, #[source] std::io::Error),

    #[error("failed to write artifact `{0}`: {1}")]
    Write(Utf8PathBuf, #[source] std::io::Error),

    #[error("failed to (de)serialize artifact `{0}`: {1}")]
    Serde(Utf8PathBuf, String),

    #[error("failed to create directory `{0}`: {1}")]
    CreateDir(Utf8PathBuf, #[source] std::io::Error),
}
