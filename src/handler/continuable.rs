//! Handler for a task whose artifact should be distinguishable from a
//! result a crashed run left half-written. A `.inprogress` sidecar (a tiny
//! `ciborium`-encoded marker, not JSON — it never needs to be
//! human-readable) is written before the task starts and removed once
//! `save` completes; `is_finished` is true only when the artifact exists
//! and no marker is left over.

use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::core::Dynamic;
use crate::error::HandlerError;
use crate::task::TaskClass;

use super::DataHandler;

#[derive(Serialize, Deserialize)]
struct InProgressMarker {
    started: bool,
}

pub struct ContinuableHandler;

impl DataHandler for ContinuableHandler {
    fn exists(&self, path: &Utf8Path) -> bool {
        path.with_extension("json").exists()
    }

    fn is_finished(&self, path: &Utf8Path) -> bool {
        path.with_extension("json").exists() && !marker_path(path).exists()
    }

    /// Writes the in-progress marker before the task's `run_typed` runs, so
    /// a checkpoint it writes under this path's parent directory is never
    /// mistaken for a finished artifact if the process crashes mid-run.
    fn prepare(&self, path: &Utf8Path) -> Result<(), HandlerError> {
        self.begin(path)
    }

    fn load(&self, path: &Utf8Path, class: &dyn TaskClass) -> Result<Dynamic, HandlerError> {
        let file_path = path.with_extension("json");
        let text = fs::read_to_string(&file_path).map_err(|e| HandlerError::Read(file_path.clone(), e))?;
        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| HandlerError::Serde(file_path.clone(), e.to_string()))?;
        class
            .deserialize_output(json)
            .map_err(|e| HandlerError::Serde(file_path, e.to_string()))
    }

    fn save(&self, path: &Utf8Path, class: &dyn TaskClass, value: &Dynamic) -> Result<(), HandlerError> {
        let file_path = path.with_extension("json");
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).map_err(|e| HandlerError::CreateDir(parent.to_owned(), e))?;
        }

        self.begin(path)?;

        let json = class
            .serialize_output(value)
            .map_err(|e| HandlerError::Serde(file_path.clone(), e.to_string()))?;
        let text =
            serde_json::to_string_pretty(&json).map_err(|e| HandlerError::Serde(file_path.clone(), e.to_string()))?;
        fs::write(&file_path, text).map_err(|e| HandlerError::Write(file_path, e))?;

        self.mark_finished(path)
    }

    fn mark_finished(&self, path: &Utf8Path) -> Result<(), HandlerError> {
        let marker = marker_path(path);
        if marker.exists() {
            fs::remove_file(&marker).map_err(|e| HandlerError::Write(marker, e))?;
        }
        Ok(())
    }

    fn delete(&self, path: &Utf8Path) -> Result<(), HandlerError> {
        let file_path = path.with_extension("json");
        if file_path.exists() {
            fs::remove_file(&file_path).map_err(|e| HandlerError::Write(file_path, e))?;
        }
        self.mark_finished(path)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

impl ContinuableHandler {
    /// Writes the in-progress marker. Called before the task's run method
    /// executes, so a process crash mid-run leaves `exists` true but
    /// `is_finished` false — the Execution Engine reruns rather than
    /// trusting a half-written artifact.
    fn begin(&self, path: &Utf8Path) -> Result<(), HandlerError> {
        let marker = marker_path(path);
        if let Some(parent) = marker.parent() {
            fs::create_dir_all(parent).map_err(|e| HandlerError::CreateDir(parent.to_owned(), e))?;
        }
        let mut bytes = Vec::new();
        ciborium::into_writer(&InProgressMarker { started: true }, &mut bytes)
            .map_err(|e| HandlerError::Serde(marker.clone(), e.to_string()))?;
        fs::write(&marker, bytes).map_err(|e| HandlerError::Write(marker, e))
    }
}

fn marker_path(path: &Utf8Path) -> camino::Utf8PathBuf {
    let file_name = path.file_name().unwrap_or("artifact").to_string();
    let mut p = path.to_owned();
    p.set_file_name(format!("{file_name}.inprogress"));
    p
}
