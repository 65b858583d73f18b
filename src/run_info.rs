//! Run-info sidecar (spec §4.6): a small YAML record written next to every
//! computed artifact, recording what produced it and when, independent of
//! the artifact's own format.

use camino::Utf8Path;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::HandlerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub full_name: String,
    pub class_full_name: String,
    pub config_name: String,
    pub namespace: Option<String>,
    pub params: IndexMap<String, serde_json::Value>,
    pub input_fingerprints: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    pub user: Option<String>,
    #[serde(default)]
    pub records: Vec<String>,
}

impl RunInfo {
    pub fn new(
        full_name: String,
        class_full_name: String,
        config_name: String,
        namespace: Option<String>,
        params: IndexMap<String, serde_json::Value>,
        input_fingerprints: Vec<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let elapsed_ms = (finished_at - started_at).num_milliseconds();
        RunInfo {
            full_name,
            class_full_name,
            config_name,
            namespace,
            params,
            input_fingerprints,
            started_at,
            finished_at,
            elapsed_ms,
            user: std::env::var("USER").ok(),
            records: Vec::new(),
        }
    }

    /// Appends a user-supplied note, preserved across reloads (spec §4.6
    /// "user-appended records").
    pub fn append_record(&mut self, record: impl Into<String>) {
        self.records.push(record.into());
    }
}

pub(crate) fn write(path: &Utf8Path, info: &RunInfo) -> Result<(), HandlerError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| HandlerError::CreateDir(parent.to_owned(), e))?;
    }
    let text = serde_yaml::to_string(info).map_err(|e| HandlerError::Serde(path.to_owned(), e.to_string()))?;
    std::fs::write(path, text).map_err(|e| HandlerError::Write(path.to_owned(), e))
}

pub(crate) fn read(path: &Utf8Path) -> Result<Option<RunInfo>, HandlerError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path).map_err(|e| HandlerError::Read(path.to_owned(), e))?;
    let info = serde_yaml::from_str(&text).map_err(|e| HandlerError::Serde(path.to_owned(), e.to_string()))?;
    Ok(Some(info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn elapsed_ms_is_derived_from_the_two_timestamps() {
        let started = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let finished = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 5).unwrap();
        let info = RunInfo::new(
            "training:Train".to_string(),
            "training.Train".to_string(),
            "root".to_string(),
            None,
            IndexMap::new(),
            Vec::new(),
            started,
            finished,
        );
        assert_eq!(info.elapsed_ms, 5000);
    }

    #[test]
    fn round_trips_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("run_info.yaml")).unwrap();

        let started = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut info = RunInfo::new(
            "training:Train".to_string(),
            "training.Train".to_string(),
            "root".to_string(),
            None,
            IndexMap::new(),
            vec!["abc123".to_string()],
            started,
            started,
        );
        info.append_record("reran manually after a data fix");

        write(&path, &info).unwrap();
        let loaded = read(&path).unwrap().unwrap();
        assert_eq!(loaded.records, vec!["reran manually after a data fix".to_string()]);
        assert_eq!(loaded.input_fingerprints, vec!["abc123".to_string()]);
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("absent.yaml")).unwrap();
        assert!(read(&path).unwrap().is_none());
    }
}
