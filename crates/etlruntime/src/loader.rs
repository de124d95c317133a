use etlcore::{EngineError, Workflow, WorkflowId};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// External persistence seam
///
/// The engine only ever receives and returns workflow snapshots as values;
/// where they durably live is the caller's concern, expressed through this
/// trait.
pub trait WorkflowStore: Send + Sync {
    fn load(&self, id: WorkflowId) -> Result<Workflow, EngineError>;
    fn save(&self, workflow: &Workflow) -> Result<(), EngineError>;
    fn list(&self) -> Result<Vec<WorkflowId>, EngineError>;
}

/// One pretty-printed JSON document per workflow id in a directory
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: WorkflowId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

impl WorkflowStore for JsonFileStore {
    fn load(&self, id: WorkflowId) -> Result<Workflow, EngineError> {
        let path = self.path_for(id);
        let raw = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                EngineError::WorkflowNotFound(id.to_string())
            } else {
                EngineError::Io(e)
            }
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, workflow: &Workflow) -> Result<(), EngineError> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(workflow)?;
        fs::write(self.path_for(workflow.id), json)?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<WorkflowId>, EngineError> {
        let mut ids = Vec::new();
        if !self.dir.exists() {
            return Ok(ids);
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension() == Some("json".as_ref()) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if let Ok(id) = stem.parse() {
                        ids.push(id);
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
