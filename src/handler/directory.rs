//! Handler for a task whose output is a directory of related files rather
//! than one artifact. The task's declared `Output` is a manifest — typically
//! a list of relative file names it has already written into the
//! directory — serialized as `manifest.json`; a `.finished` marker
//! distinguishes a complete directory from one a crashed run left behind.

use std::fs;

use camino::Utf8Path;

use crate::core::Dynamic;
use crate::error::HandlerError;
use crate::task::TaskClass;

use super::DataHandler;

pub struct DirectoryHandler;

impl DataHandler for DirectoryHandler {
    fn exists(&self, path: &Utf8Path) -> bool {
        path.is_dir()
    }

    fn is_finished(&self, path: &Utf8Path) -> bool {
        finished_marker(path).exists()
    }

    fn prepare(&self, path: &Utf8Path) -> Result<(), HandlerError> {
        fs::create_dir_all(path).map_err(|e| HandlerError::CreateDir(path.to_owned(), e))
    }

    fn load(&self, path: &Utf8Path, class: &dyn TaskClass) -> Result<Dynamic, HandlerError> {
        let manifest_path = manifest_path(path);
        let text = fs::read_to_string(&manifest_path).map_err(|e| HandlerError::Read(manifest_path.clone(), e))?;
        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| HandlerError::Serde(manifest_path.clone(), e.to_string()))?;
        class
            .deserialize_output(json)
            .map_err(|e| HandlerError::Serde(manifest_path, e.to_string()))
    }

    fn save(&self, path: &Utf8Path, class: &dyn TaskClass, value: &Dynamic) -> Result<(), HandlerError> {
        self.prepare(path)?;

        let manifest_path = manifest_path(path);
        let json = class
            .serialize_output(value)
            .map_err(|e| HandlerError::Serde(manifest_path.clone(), e.to_string()))?;
        let text =
            serde_json::to_string_pretty(&json).map_err(|e| HandlerError::Serde(manifest_path.clone(), e.to_string()))?;
        fs::write(&manifest_path, text).map_err(|e| HandlerError::Write(manifest_path, e))?;

        self.mark_finished(path)
    }

    fn mark_finished(&self, path: &Utf8Path) -> Result<(), HandlerError> {
        let marker = finished_marker(path);
        fs::write(&marker, b"").map_err(|e| HandlerError::Write(marker, e))
    }

    fn delete(&self, path: &Utf8Path) -> Result<(), HandlerError> {
        if path.is_dir() {
            fs::remove_dir_all(path).map_err(|e| HandlerError::Write(path.to_owned(), e))?;
        }
        Ok(())
    }

    fn extension(&self) -> &'static str {
        ""
    }
}

fn manifest_path(path: &Utf8Path) -> camino::Utf8PathBuf {
    path.join("manifest.json")
}

fn finished_marker(path: &Utf8Path) -> camino::Utf8PathBuf {
    path.join(".finished")
}
