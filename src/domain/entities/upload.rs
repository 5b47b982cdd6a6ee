use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::{
    errors::AppError,
    storage::{ImageExtension, Provisioned},
};

/// Text fields of a multipart body in arrival order. A repeated name keeps its last value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    pub fn new() -> Self {
        FormFields(Vec::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let (name, value) = (name.into(), value.into());
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    /// Value with surrounding whitespace removed, `None` when absent or blank.
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn uuid(&self, name: &str) -> Result<Option<Uuid>, AppError> {
        self.non_empty(name)
            .map(|v| Uuid::parse_str(v).map_err(|_| AppError::invalid(name, "Must be a valid id")))
            .transpose()
    }

    /// Accepts `true|false|1|0|on|off`.
    pub fn flag(&self, name: &str) -> Result<Option<bool>, AppError> {
        self.non_empty(name)
            .map(|v| match v.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => Ok(true),
                "false" | "0" | "off" => Ok(false),
                _ => Err(AppError::invalid(name, "Must be true or false")),
            })
            .transpose()
    }

    /// Decodes a JSON encoded value.
    pub fn json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<Option<T>, AppError> {
        self.non_empty(name)
            .map(|v| {
                serde_json::from_str(v)
                    .map_err(|e| AppError::invalid(name, format!("Invalid JSON value: {}", e)))
            })
            .transpose()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Where an accepted file ended up on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePlacement {
    pub path: PathBuf,
    pub original_filename: String,
    pub extension: ImageExtension,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Receiving,
    Finalizing,
    Committed,
    Failed,
}

/// One multipart upload, from the first byte read to the response.
#[derive(Debug)]
pub struct UploadSession {
    state: SessionState,
    pub fields: FormFields,
    pub placement: Option<FilePlacement>,
    provisioned: Vec<(PathBuf, Provisioned)>,
    written: Vec<PathBuf>,
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadSession {
    pub fn new() -> Self {
        UploadSession {
            state: SessionState::Receiving,
            fields: FormFields::new(),
            placement: None,
            provisioned: Vec::new(),
            written: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_receiving(&self) -> bool {
        self.state == SessionState::Receiving
    }

    /// The stream has finished; no more fields or files are accepted.
    pub fn finish_receiving(&mut self) -> Result<(), AppError> {
        self.transition(SessionState::Receiving, SessionState::Finalizing)
    }

    pub fn mark_committed(&mut self) -> Result<(), AppError> {
        self.transition(SessionState::Finalizing, SessionState::Committed)
    }

    /// Any state except `Committed` may fail.
    pub fn mark_failed(&mut self) {
        if self.state != SessionState::Committed {
            self.state = SessionState::Failed;
        }
    }

    fn transition(&mut self, from: SessionState, to: SessionState) -> Result<(), AppError> {
        if self.state != from {
            return Err(AppError::InternalError(format!(
                "Upload session cannot move from {:?} to {:?}",
                self.state, to
            )));
        }
        self.state = to;
        Ok(())
    }

    pub fn record_provisioned(&mut self, dir: PathBuf, outcome: Provisioned) {
        self.provisioned.push((dir, outcome));
    }

    pub fn record_written(&mut self, path: PathBuf) {
        if !self.written.contains(&path) {
            self.written.push(path);
        }
    }

    pub fn forget_written(&mut self, path: &Path) {
        self.written.retain(|p| p != path);
    }

    /// Directories this session brought into existence, outermost first.
    pub fn created_dirs(&self) -> impl Iterator<Item = &Path> {
        self.provisioned
            .iter()
            .filter(|(_, outcome)| *outcome == Provisioned::Created)
            .map(|(dir, _)| dir.as_path())
    }

    pub fn written_files(&self) -> &[PathBuf] {
        &self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_field_values_replace_earlier_ones() {
        let mut fields = FormFields::new();
        fields.insert("title", "Algebra");
        fields.insert("publish", "on");
        fields.insert("title", "Geometry");

        assert_eq!(fields.get("title"), Some("Geometry"));
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.flag("publish").unwrap(), Some(true));
    }

    #[test]
    fn typed_accessors_reject_bad_values() {
        let mut fields = FormFields::new();
        fields.insert("publish", "maybe");
        fields.insert("programId", "not-a-uuid");
        fields.insert("types", "[1,");

        assert!(fields.flag("publish").is_err());
        assert!(fields.uuid("programId").is_err());
        assert!(fields.json::<Vec<Uuid>>("types").is_err());
        assert_eq!(fields.uuid("recordId").unwrap(), None);
    }

    #[test]
    fn blank_values_count_as_missing() {
        let mut fields = FormFields::new();
        fields.insert("description", "   ");
        assert_eq!(fields.non_empty("description"), None);
    }

    #[test]
    fn session_moves_through_its_states() {
        let mut session = UploadSession::new();
        assert!(session.is_receiving());
        assert!(session.mark_committed().is_err());

        session.finish_receiving().unwrap();
        assert_eq!(session.state(), SessionState::Finalizing);
        assert!(session.finish_receiving().is_err());

        session.mark_committed().unwrap();
        session.mark_failed();
        assert_eq!(session.state(), SessionState::Committed);
    }

    #[test]
    fn session_tracks_only_directories_it_created() {
        let mut session = UploadSession::new();
        session.record_provisioned("/up/programs/a".into(), Provisioned::Created);
        session.record_provisioned("/up/programs/a/photo".into(), Provisioned::Existing);
        session.record_written("/up/programs/a/photo/photo.png".into());
        session.record_written("/up/programs/a/photo/photo.png".into());

        let created: Vec<_> = session.created_dirs().collect();
        assert_eq!(created, vec![Path::new("/up/programs/a")]);
        assert_eq!(session.written_files().len(), 1);

        session.forget_written(Path::new("/up/programs/a/photo/photo.png"));
        assert!(session.written_files().is_empty());
    }
}
