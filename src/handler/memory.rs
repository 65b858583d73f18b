//! Handler for tasks whose output is never written to disk — only the
//! Execution Engine's in-memory cache keeps it alive for the run.

use camino::Utf8Path;

use crate::core::Dynamic;
use crate::error::HandlerError;
use crate::task::TaskClass;

use super::DataHandler;

pub struct MemoryHandler;

impl DataHandler for MemoryHandler {
    fn exists(&self, _path: &Utf8Path) -> bool {
        false
    }

    fn is_finished(&self, _path: &Utf8Path) -> bool {
        false
    }

    fn load(&self, path: &Utf8Path, _class: &dyn TaskClass) -> Result<Dynamic, HandlerError> {
        Err(HandlerError::Read(
            path.to_owned(),
            std::io::Error::new(std::io::ErrorKind::NotFound, "memory handler never persists"),
        ))
    }

    fn save(&self, _path: &Utf8Path, _class: &dyn TaskClass, _value: &Dynamic) -> Result<(), HandlerError> {
        Ok(())
    }

    fn delete(&self, _path: &Utf8Path) -> Result<(), HandlerError> {
        Ok(())
    }

    fn extension(&self) -> &'static str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_reports_existing_so_the_task_always_reruns() {
        let handler = MemoryHandler;
        assert!(!handler.exists(Utf8Path::new("/anything")));
        assert!(!handler.is_finished(Utf8Path::new("/anything")));
    }

    #[test]
    fn save_is_a_no_op() {
        let handler = MemoryHandler;
        let value: Dynamic = std::sync::Arc::new(42i64);
        assert!(handler.save(Utf8Path::new("/anything"), &Noop, &value).is_ok());
    }

    struct Noop;
    impl TaskClass for Noop {
        fn group(&self) -> &'static str {
            "x"
        }
        fn name(&self) -> &'static str {
            "Noop"
        }
        fn params(&self) -> Vec<crate::task::ParamSpec> {
            Vec::new()
        }
        fn return_type_name(&self) -> &'static str {
            "i64"
        }
        fn run(&self, _params: &crate::task::ParameterSet, _inputs: &crate::task::InputMap, _ctx: &crate::task::TaskContext) -> anyhow::Result<Dynamic> {
            Ok(std::sync::Arc::new(0i64))
        }
    }
}
