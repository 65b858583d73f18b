//! Handler for a task whose output is one JSON artifact.

use std::fs;

use camino::Utf8Path;

use crate::core::Dynamic;
use crate::error::HandlerError;
use crate::task::TaskClass;

use super::DataHandler;

pub struct SingleFileHandler;

impl DataHandler for SingleFileHandler {
    fn exists(&self, path: &Utf8Path) -> bool {
        path.with_extension("json").exists()
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

        let json = class
            .serialize_output(value)
            .map_err(|e| HandlerError::Serde(file_path.clone(), e.to_string()))?;
        let text =
            serde_json::to_string_pretty(&json).map_err(|e| HandlerError::Serde(file_path.clone(), e.to_string()))?;
        fs::write(&file_path, text).map_err(|e| HandlerError::Write(file_path, e))
    }

    fn delete(&self, path: &Utf8Path) -> Result<(), HandlerError> {
        let file_path = path.with_extension("json");
        if file_path.exists() {
            fs::remove_file(&file_path).map_err(|e| HandlerError::Write(file_path, e))?;
        }
        Ok(())
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{InputMap, ParamSpec, ParameterSet};
    use std::sync::Arc;

    #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
    struct Payload {
        n: i64,
    }

    struct Produces;
    impl crate::task::TypedTaskClass for Produces {
        type Output = Payload;
        fn group(&self) -> &'static str {
            "x"
        }
        fn name(&self) -> &'static str {
            "Produces"
        }
        fn params(&self) -> Vec<ParamSpec> {
            Vec::new()
        }
        fn run_typed(&self, _p: &ParameterSet, _i: &InputMap, _ctx: &crate::task::TaskContext) -> anyhow::Result<Payload> {
            Ok(Payload { n: 7 })
        }
    }

    #[test]
    fn round_trips_through_a_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("artifact")).unwrap();
        let handler = SingleFileHandler;
        let class = Produces;

        assert!(!handler.exists(&path));

        let value: Dynamic = Arc::new(Payload { n: 7 });
        handler.save(&path, &class, &value).unwrap();
        assert!(handler.exists(&path));
        assert!(handler.is_finished(&path));

        let loaded = handler.load(&path, &class).unwrap();
        assert_eq!(*loaded.downcast_ref::<Payload>().unwrap(), Payload { n: 7 });
    }

    #[test]
    fn delete_removes_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("artifact")).unwrap();
        let handler = SingleFileHandler;
        let value: Dynamic = Arc::new(Payload { n: 1 });
        handler.save(&path, &Produces, &value).unwrap();

        handler.delete(&path).unwrap();
        assert!(!handler.exists(&path));
    }
}
