//! Handler for outputs that are naturally a sequence — persisted as
//! newline-delimited JSON rather than one big JSON array, so a downstream
//! reader can stream the file instead of holding the whole artifact in
//! memory. The task's `Output` must serialize to a JSON array.

use std::fs;

use camino::Utf8Path;

use crate::core::Dynamic;
use crate::error::HandlerError;
use crate::task::TaskClass;

use super::DataHandler;

pub struct StreamedHandler;

impl DataHandler for StreamedHandler {
    fn exists(&self, path: &Utf8Path) -> bool {
        path.with_extension("jsonl").exists()
    }

    fn load(&self, path: &Utf8Path, class: &dyn TaskClass) -> Result<Dynamic, HandlerError> {
        let file_path = path.with_extension("jsonl");
        let text = fs::read_to_string(&file_path).map_err(|e| HandlerError::Read(file_path.clone(), e))?;

        let mut rows = Vec::new();
        for line in text.lines().filter(|l| !l.is_empty()) {
            let value: serde_json::Value =
                serde_json::from_str(line).map_err(|e| HandlerError::Serde(file_path.clone(), e.to_string()))?;
            rows.push(value);
        }

        class
            .deserialize_output(serde_json::Value::Array(rows))
            .map_err(|e| HandlerError::Serde(file_path, e.to_string()))
    }

    fn save(&self, path: &Utf8Path, class: &dyn TaskClass, value: &Dynamic) -> Result<(), HandlerError> {
        let file_path = path.with_extension("jsonl");
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).map_err(|e| HandlerError::CreateDir(parent.to_owned(), e))?;
        }

        let json = class
            .serialize_output(value)
            .map_err(|e| HandlerError::Serde(file_path.clone(), e.to_string()))?;
        let serde_json::Value::Array(rows) = json else {
            return Err(HandlerError::Serde(
                file_path,
                "streamed handler requires an Output that serializes to a JSON array".to_string(),
            ));
        };

        let mut text = String::new();
        for row in &rows {
            text.push_str(&serde_json::to_string(row).map_err(|e| HandlerError::Serde(file_path.clone(), e.to_string()))?);
            text.push('\n');
        }

        fs::write(&file_path, text).map_err(|e| HandlerError::Write(file_path, e))
    }

    fn delete(&self, path: &Utf8Path) -> Result<(), HandlerError> {
        let file_path = path.with_extension("jsonl");
        if file_path.exists() {
            fs::remove_file(&file_path).map_err(|e| HandlerError::Write(file_path, e))?;
        }
        Ok(())
    }

    fn extension(&self) -> &'static str {
        "jsonl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{InputMap, ParamSpec, ParameterSet};
    use std::sync::Arc;

    struct Rows;
    impl crate::task::TypedTaskClass for Rows {
        type Output = Vec<i64>;
        fn group(&self) -> &'static str {
            "x"
        }
        fn name(&self) -> &'static str {
            "Rows"
        }
        fn params(&self) -> Vec<ParamSpec> {
            Vec::new()
        }
        fn run_typed(&self, _p: &ParameterSet, _i: &InputMap, _ctx: &crate::task::TaskContext) -> anyhow::Result<Vec<i64>> {
            Ok(vec![1, 2, 3])
        }
    }

    #[test]
    fn writes_one_json_value_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("rows")).unwrap();
        let handler = StreamedHandler;
        let value: Dynamic = Arc::new(vec![1i64, 2, 3]);

        handler.save(&path, &Rows, &value).unwrap();
        let text = fs::read_to_string(path.with_extension("jsonl")).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn round_trips_the_full_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("rows")).unwrap();
        let handler = StreamedHandler;
        let value: Dynamic = Arc::new(vec![1i64, 2, 3]);
        handler.save(&path, &Rows, &value).unwrap();

        let loaded = handler.load(&path, &Rows).unwrap();
        assert_eq!(*loaded.downcast_ref::<Vec<i64>>().unwrap(), vec![1, 2, 3]);
    }
}
