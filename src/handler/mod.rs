//! Data Handler Layer (spec §4.6): pluggable artifact persistence keyed off
//! a task's declared return type. [`HandlerKind`] is an explicit tagged
//! enum rather than runtime return-type dispatch (spec §9 design note 3):
//! a [`crate::task::TaskClass`] names which kind it wants, and the
//! Execution Engine asks that kind to build its handler.

pub mod continuable;
pub mod directory;
pub mod memory;
pub mod single;
pub mod streamed;

use camino::Utf8Path;

use crate::core::Dynamic;
use crate::error::HandlerError;
use crate::task::TaskClass;

/// Persists and reloads one task's output at a given artifact path.
///
/// `path` never includes the handler's own extension — each handler
/// appends its own (`.json`, `/`, `.jsonl`, ...) via [`DataHandler::extension`]
/// so [`crate::instance::TaskInstance::data_path`] can report the real,
/// final path.
pub trait DataHandler: Send + Sync {
    /// Whether anything has been persisted at `path` at all. For handlers
    /// with a distinct "in progress" state (continuable, directory), this
    /// may be true even when [`DataHandler::is_finished`] is false.
    fn exists(&self, path: &Utf8Path) -> bool;

    /// Whether the artifact at `path` is complete and safe to reload
    /// instead of rerunning the task.
    fn is_finished(&self, path: &Utf8Path) -> bool {
        self.exists(path)
    }

    /// Makes `path` ready for the task's `run`/`run_typed` to write into
    /// before it's invoked: a directory handler creates its directory here,
    /// a continuable handler writes its in-progress marker here. Most
    /// handlers have nothing to do in advance of `save` and leave this as-is.
    fn prepare(&self, _path: &Utf8Path) -> Result<(), HandlerError> {
        Ok(())
    }

    fn load(&self, path: &Utf8Path, class: &dyn TaskClass) -> Result<Dynamic, HandlerError>;

    fn save(&self, path: &Utf8Path, class: &dyn TaskClass, value: &Dynamic) -> Result<(), HandlerError>;

    /// Marks a partially-written artifact as complete. Most handlers fold
    /// this into `save`; handlers with an explicit in-progress marker
    /// (continuable, directory) override it.
    fn mark_finished(&self, _path: &Utf8Path) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Removes whatever `save` wrote, used by `TaskInstance::force(true)`.
    fn delete(&self, path: &Utf8Path) -> Result<(), HandlerError>;

    /// The on-disk suffix this handler's artifacts carry.
    fn extension(&self) -> &'static str;
}

/// Which [`DataHandler`] a task's declared return type maps onto (spec
/// §4.6, §9 design note 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// Never persisted; only cached in memory for the lifetime of one
    /// Execution Engine run.
    Memory,
    /// A single JSON artifact file.
    Single,
    /// A directory of related files plus a finished-marker.
    Directory,
    /// A single JSON artifact with an explicit in-progress marker, so a
    /// crash mid-write is distinguishable from a finished result.
    Continuable,
    /// Newline-delimited JSON, for outputs that are naturally a sequence.
    Streamed,
}

impl HandlerKind {
    pub fn build(self) -> Box<dyn DataHandler> {
        match self {
            HandlerKind::Memory => Box::new(memory::MemoryHandler),
            HandlerKind::Single => Box::new(single::SingleFileHandler),
            HandlerKind::Directory => Box::new(directory::DirectoryHandler),
            HandlerKind::Continuable => Box::new(continuable::ContinuableHandler),
            HandlerKind::Streamed => Box::new(streamed::StreamedHandler),
        }
    }
}
