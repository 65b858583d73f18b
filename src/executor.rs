//! Execution Engine (spec §4.7, §5): demand-driven, single-threaded
//! evaluation of one task instance, with cross-process advisory locking so
//! two processes racing to compute the same fingerprint serialize instead of
//! duplicating work.
//!
//! [`value`] is the only entry point that actually runs anything; the rest
//! of this module is its supporting path/IO bookkeeping. [`crate::chain`]
//! assembles the DAG this module walks; [`crate::instance::TaskInstance`] is
//! the public handle that forwards here.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use camino::Utf8PathBuf;
use chrono::Utc;
use indexmap::IndexMap;
use petgraph::graph::NodeIndex;
use petgraph::Direction;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Layer, Registry};

use crate::chain::ChainShared;
use crate::core::{Dynamic, Mode};
use crate::error::{ExecError, HandlerError, LinkError, TaskChainError};
use crate::lock;
use crate::run_info::{self, RunInfo};
use crate::task::{InputMap, TaskContext};

/// Computes this instance's value, reusing an in-memory or persisted result
/// for its fingerprint when one already exists, and recursing into its
/// declared inputs (in declaration order) otherwise.
pub fn value(chain: &Arc<ChainShared>, index: NodeIndex) -> Result<Dynamic, TaskChainError> {
    if let Some(cached) = chain.cache.lock().expect("chain cache mutex poisoned").get(&index).cloned() {
        return Ok(cached);
    }

    let base = base_path(chain, index);

    lock::hold(&base, || {
        if let Some(cached) = chain.cache.lock().expect("chain cache mutex poisoned").get(&index).cloned() {
            return Ok(cached);
        }

        let class_full_name = chain.graph[index].class_full_name.clone();
        let class = chain
            .registry
            .get(&class_full_name)
            .expect("every chain node's class is registered");
        let handler = chain.graph[index].handler_kind.build();

        if handler.is_finished(&base) {
            let loaded = handler.load(&base, class)?;
            sync_readable_symlink(chain, index, &data_path_for(&base, handler.extension()));
            chain.cache.lock().expect("chain cache mutex poisoned").insert(index, Arc::clone(&loaded));
            return Ok(loaded);
        }

        let full_name = chain.graph[index].full_name();
        let mut inputs = InputMap::new();
        let mut input_fingerprint_hexes = Vec::new();

        for (input_name, spec) in class.inputs() {
            let mut edges: Vec<_> = chain
                .graph
                .edges_directed(index, Direction::Incoming)
                .filter(|e| e.weight().name == input_name)
                .collect();
            edges.sort_by_key(|e| e.weight().ordinal);

            if edges.is_empty() {
                if spec.required {
                    return Err(TaskChainError::from(LinkError::Unresolved(spec.pattern.to_string(), full_name)));
                }
                continue;
            }

            if crate::linker::is_regex_pattern(spec.pattern) {
                let mut values = Vec::new();
                for edge in &edges {
                    let dep_value = value(chain, edge.source())?;
                    input_fingerprint_hexes.push(chain.graph[edge.source()].fingerprint.to_hex());
                    values.push(dep_value);
                }
                inputs.insert_many(input_name, values);
            } else {
                let edge = edges[0];
                let dep_value = value(chain, edge.source())?;
                input_fingerprint_hexes.push(chain.graph[edge.source()].fingerprint.to_hex());
                inputs.insert(input_name, dep_value);
            }
        }

        let params = chain.graph[index].params.clone();
        let artifact_path = data_path_for(&base, handler.extension());
        handler.prepare(&base)?;
        let ctx = TaskContext::new(artifact_path.clone());

        let started_at = Utc::now();
        let output = with_task_log(chain, index, || {
            tracing::info!(task = %full_name, "starting");
            let output = class
                .run(&params, &inputs, &ctx)
                .map_err(|e| ExecError::UserError(full_name.clone(), e))?;

            // Loose return-type validation (spec §4.7): a class whose `run`
            // returned something other than its declared `Output` fails here,
            // at persistence time, rather than via a TypeId check against
            // `return_type_name` (which is a diagnostic label, not a contract
            // the erasure layer can check directly).
            class
                .serialize_output(&output)
                .map_err(|_| ExecError::TypeMismatch(full_name.clone(), class.return_type_name(), "erased"))?;

            handler.save(&base, class, &output)?;
            handler.mark_finished(&base)?;
            tracing::info!(task = %full_name, "finished");
            Ok(output)
        })?;
        sync_readable_symlink(chain, index, &artifact_path);

        let finished_at = Utc::now();
        let info = RunInfo::new(
            full_name,
            class_full_name,
            chain.graph[index].owning_config_name.clone(),
            chain.graph[index].namespace.clone(),
            params.iter().map(|(k, v)| (k.to_string(), serde_json::Value::from(v.clone()))).collect::<IndexMap<_, _>>(),
            input_fingerprint_hexes,
            started_at,
            finished_at,
        );
        run_info::write(&run_info_path(chain, index), &info)?;

        chain.cache.lock().expect("chain cache mutex poisoned").insert(index, Arc::clone(&output));
        Ok(output)
    })
}

/// Drops the in-memory cache entry and, if `delete_data`, the persisted
/// artifact and run-info sidecar too (spec §6 `force`).
pub fn force(chain: &Arc<ChainShared>, index: NodeIndex, delete_data: bool) -> Result<(), TaskChainError> {
    chain.cache.lock().expect("chain cache mutex poisoned").remove(&index);

    if delete_data {
        let base = base_path(chain, index);
        let handler = chain.graph[index].handler_kind.build();
        lock::hold(&base, || Ok(handler.delete(&base)?))?;

        let info_path = run_info_path(chain, index);
        if info_path.exists() {
            std::fs::remove_file(&info_path).map_err(|e| HandlerError::Write(info_path, e))?;
        }
    }

    Ok(())
}

/// Whether a persisted artifact exists for this instance's fingerprint,
/// without triggering computation.
pub fn has_data(chain: &Arc<ChainShared>, index: NodeIndex) -> bool {
    let base = base_path(chain, index);
    chain.graph[index].handler_kind.build().is_finished(&base)
}

/// The instance's artifact path, including the handler's own extension.
/// Always fingerprint- (or config-name-)keyed — see [`base_path`] — even
/// when [`crate::chain::Chain::create_readable_filenames`] is set; that flag
/// only adds a sibling symlink, via [`sync_readable_symlink`], rather than
/// changing this canonical path.
pub fn data_path(chain: &Arc<ChainShared>, index: NodeIndex) -> Utf8PathBuf {
    let base = base_path(chain, index);
    let ext = chain.graph[index].handler_kind.build().extension();
    data_path_for(&base, ext)
}

fn data_path_for(base: &Utf8PathBuf, ext: &str) -> Utf8PathBuf {
    if ext.is_empty() {
        base.clone()
    } else {
        base.with_extension(ext)
    }
}

pub fn run_info_path(chain: &Arc<ChainShared>, index: NodeIndex) -> Utf8PathBuf {
    base_path(chain, index).with_extension("run_info.yaml")
}

/// The instance's per-task log sidecar path (spec §4.6), a sibling of the
/// artifact carrying its own `.log` extension.
pub(crate) fn log_path(chain: &Arc<ChainShared>, index: NodeIndex) -> Utf8PathBuf {
    base_path(chain, index).with_extension("log")
}

/// Runs `f` with a file-backed `tracing` subscriber scoped to the current
/// thread, writing everything at or above [`ChainShared::min_level`] into
/// this instance's `.log` sidecar — separate from whatever ambient
/// subscriber the embedding application installed. The writer (and its
/// background flush thread) is torn down when `f` returns, closing the file.
fn with_task_log<T>(
    chain: &Arc<ChainShared>,
    index: NodeIndex,
    f: impl FnOnce() -> Result<T, TaskChainError>,
) -> Result<T, TaskChainError> {
    let path = log_path(chain, index);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| HandlerError::CreateDir(parent.to_owned(), e))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_std_path())
        .map_err(|e| HandlerError::Write(path.clone(), e))?;

    let (writer, _guard) = tracing_appender::non_blocking(file);
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::LevelFilter::from_level(chain.min_level()));
    let subscriber = Registry::default().with(layer);

    tracing::subscriber::with_default(subscriber, f)
}

/// `{artifact_root}/{group}/{name}/{key}`, with no extension — each
/// [`crate::handler::DataHandler`] appends its own. `key` is always the
/// content-addressed fingerprint hex under [`Mode::Fingerprint`], or the
/// owning config's name under [`Mode::ConfigName`] — never the
/// human-readable name, so two configs resolving to the same fingerprint
/// always share one artifact regardless of what each calls it (spec.md:170).
fn base_path(chain: &ChainShared, index: NodeIndex) -> Utf8PathBuf {
    let meta = &chain.graph[index];

    let key = match chain.mode {
        Mode::Fingerprint => meta.fingerprint.to_hex(),
        Mode::ConfigName => meta.owning_config_name.clone(),
    };

    let mut path = chain.artifact_root.clone();
    path.push(&meta.group);
    path.push(&meta.name);
    path.push(key);
    path
}

/// When [`crate::chain::Chain::create_readable_filenames`] is set and this
/// instance declares a `human_readable_data_name`, (re)creates a sibling
/// symlink `<user-name>.<ext> -> <fingerprint>.<ext>` next to the canonical,
/// fingerprint-keyed artifact (spec.md:170). A no-op otherwise.
fn sync_readable_symlink(chain: &ChainShared, index: NodeIndex, canonical: &Utf8PathBuf) {
    if !chain.readable_filenames.load(Ordering::Relaxed) {
        return;
    }
    let meta = &chain.graph[index];
    let Some(human_name) = &meta.human_readable_data_name else {
        return;
    };

    let ext = canonical.extension();
    let link = match ext {
        Some(ext) => canonical.with_file_name(format!("{human_name}.{ext}")),
        None => canonical.with_file_name(human_name),
    };

    #[cfg(unix)]
    {
        if link.as_std_path().symlink_metadata().is_ok() {
            let _ = std::fs::remove_file(&link);
        }
        let _ = std::os::unix::fs::symlink(canonical.file_name().unwrap_or_default(), &link);
    }
    #[cfg(not(unix))]
    {
        if link.exists() {
            let _ = std::fs::remove_file(&link);
        }
        let _ = std::fs::copy(canonical, &link);
    }
}
