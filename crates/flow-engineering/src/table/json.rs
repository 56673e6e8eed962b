//! Table store backed by a single JSON document on disk.

use flow_types::FlowDirection;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use super::{FlowRow, InterfaceRow, TableStore, Tables};
use crate::error::TableError;

/// Persists all three tables to one JSON file after every write.
#[derive(Debug)]
pub struct JsonFileTableStore {
    path: PathBuf,
    tables: Tables,
}

impl JsonFileTableStore {
    /// Opens the store, reading the file if it exists.
    ///
    /// A missing file yields empty tables; it is created on the first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref().to_path_buf();

        let tables = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| TableError::Io {
                path: path.display().to_string(),
                source,
            })?;
            if contents.trim().is_empty() {
                Tables::default()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            info!("Table file {} not found, starting empty", path.display());
            Tables::default()
        };

        Ok(Self { path, tables })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    fn persist(&self) -> Result<(), TableError> {
        let contents = serde_json::to_string_pretty(&self.tables)?;
        fs::write(&self.path, contents).map_err(|source| TableError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        debug!("Persisted tables to {}", self.path.display());
        Ok(())
    }
}

impl TableStore for JsonFileTableStore {
    fn load_interface_rows(&self) -> Result<Vec<InterfaceRow>, TableError> {
        Ok(self.tables.interfaces.clone())
    }

    fn load_flow_rows(&self, direction: FlowDirection) -> Result<Vec<FlowRow>, TableError> {
        Ok(self.tables.flows(direction).to_vec())
    }

    fn write_interface_rows(&mut self, rows: &[InterfaceRow]) -> Result<(), TableError> {
        self.tables.interfaces = rows.to_vec();
        self.persist()
    }

    fn write_flow_rows(
        &mut self,
        direction: FlowDirection,
        rows: &[FlowRow],
    ) -> Result<(), TableError> {
        *self.tables.flows_mut(direction) = rows.to_vec();
        self.persist()
    }
}
