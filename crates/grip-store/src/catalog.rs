use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use grip_core::{CatalogSink, SessionError, SessionRecord};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub const DEFAULT_CATALOG_FILE: &str = "grip_sessions_db.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCatalog {
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
}

/// JSON session index. Every append rewrites the whole file atomically.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Catalog at `dir/grip_sessions_db.json`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(DEFAULT_CATALOG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the catalog. A missing file is empty; an unreadable one is
    /// reported and treated as empty, so the next append starts it over.
    pub fn load(&self) -> Result<SessionCatalog, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SessionCatalog::default()),
            Err(e) if e.kind() == ErrorKind::InvalidData => return Ok(self.replaced(&e)),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(catalog) => Ok(catalog),
            Err(e) => Ok(self.replaced(&e)),
        }
    }

    fn replaced(&self, reason: &dyn std::fmt::Display) -> SessionCatalog {
        log::warn!(
            "session catalog {} is corrupt ({reason}); starting a new one",
            self.path.display()
        );
        SessionCatalog::default()
    }

    pub fn sessions(&self) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(self.load()?.sessions)
    }

    pub fn push(&self, record: SessionRecord) -> Result<usize, StoreError> {
        let mut catalog = self.load()?;
        catalog.sessions.push(record);
        self.save(&catalog)?;
        Ok(catalog.sessions.len())
    }

    fn save(&self, catalog: &SessionCatalog) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        f.write_all(serde_json::to_string_pretty(catalog)?.as_bytes())?;
        f.flush()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CatalogSink for JsonCatalog {
    fn append(&mut self, record: &SessionRecord) -> Result<(), SessionError> {
        let total = self
            .push(record.clone())
            .map_err(|e| SessionError::Catalog(e.to_string()))?;
        log::info!("session {} cataloged ({total} total)", record.id);
        Ok(())
    }
}
