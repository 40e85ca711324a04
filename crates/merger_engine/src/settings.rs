use std::fs;
use std::io;
use std::path::Path;

use engine_logging::engine_info;
use merger_core::{DEFAULT_CHUNK_SIZE, DEFAULT_OUTPUT_FILENAME};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persist::{write_atomically, PersistError};

/// Row capacity of a single `.xlsx` worksheet.
pub const EXCEL_MAX_ROWS: u32 = 1_048_576;

pub const DEFAULT_SHEET_NAME: &str = "MergedData";

const SHEET_NAME_MAX_CHARS: usize = 31;
const SHEET_NAME_FORBIDDEN: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read settings: {0}")]
    Io(#[from] io::Error),
    #[error("invalid settings file: {0}")]
    Parse(String),
    #[error("could not serialize settings: {0}")]
    Serialize(String),
    #[error("invalid setting: {0}")]
    Invalid(String),
    #[error("could not save settings: {0}")]
    Persist(#[from] PersistError),
}

/// Parameters of a merge run. Stored as RON; missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    /// Zero-based column whose blank cells exclude a row.
    pub key_column_index: usize,
    /// Accepted rows per file between status updates.
    pub chunk_size: usize,
    /// Output row ceiling, header included.
    pub max_rows: u32,
    pub sheet_name: String,
    pub output_filename: String,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            key_column_index: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_rows: EXCEL_MAX_ROWS,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            output_filename: DEFAULT_OUTPUT_FILENAME.to_string(),
        }
    }
}

impl MergeSettings {
    /// Loads settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                engine_info!("No settings file at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        let settings: Self =
            ron::from_str(&content).map_err(|err| SettingsError::Parse(err.to_string()))?;
        settings.validate()?;
        engine_info!("Loaded merge settings from {:?}", path);
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        self.validate()?;
        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(self, pretty)
            .map_err(|err| SettingsError::Serialize(err.to_string()))?;
        write_atomically(path, content.as_bytes())?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_rows == 0 || self.max_rows > EXCEL_MAX_ROWS {
            return Err(SettingsError::Invalid(format!(
                "max_rows must be between 1 and {EXCEL_MAX_ROWS}, got {}",
                self.max_rows
            )));
        }
        let name = self.sheet_name.as_str();
        if name.trim().is_empty()
            || name.chars().count() > SHEET_NAME_MAX_CHARS
            || name.contains(SHEET_NAME_FORBIDDEN)
        {
            return Err(SettingsError::Invalid(format!(
                "sheet_name {name:?} is not a valid worksheet name"
            )));
        }
        if self.output_filename.trim().is_empty() {
            return Err(SettingsError::Invalid("output_filename is empty".into()));
        }
        Ok(())
    }

    /// Chunk size with 0 treated as 1.
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}
