//! Reads line definition files from disk.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers, plus the error type shared by the whole crate.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use robotline_core::line::LineError;
use robotline_core::stage::StageError;

use crate::schema::LineDefinition;

/// Base name looked up when a directory is given instead of a file.
pub const LINE_FILE: &str = "line";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading or building a line definition.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No line file was found in the given directory.
    #[error("no line definition found in {dir}")]
    Missing { dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("line definition has no stages")]
    EmptyLine,

    #[error("invalid run parameters: {detail}")]
    InvalidRun { detail: String },

    #[error("invalid stage '{name}': {source}")]
    InvalidStage {
        name: String,
        #[source]
        source: StageError,
    },

    #[error("stage '{name}' has success rate {rate}, expected a value in [0, 1]")]
    InvalidSuccessRate { name: String, rate: f64 },

    /// The engine refused the assembled line.
    #[error(transparent)]
    Line(#[from] LineError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(ConfigError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, ConfigError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(ConfigError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let parse_error = |detail: String| ConfigError::Parse {
        file: path.to_path_buf(),
        detail,
    };

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Load a line definition from a file, or from `line.{ron,toml,json}` when
/// `path` is a directory. The definition is validated but not built.
pub fn load_line_definition(path: &Path) -> Result<LineDefinition, ConfigError> {
    let file = if path.is_dir() {
        find_data_file(path, LINE_FILE)?.ok_or_else(|| ConfigError::Missing {
            dir: path.to_path_buf(),
        })?
    } else {
        path.to_path_buf()
    };

    let definition: LineDefinition = deserialize_file(&file)?;
    definition.validate()?;
    tracing::debug!(
        file = %file.display(),
        stages = definition.stages.len(),
        "line definition loaded"
    );
    Ok(definition)
}

// ===========================================================================
// Tests
// ===========================================================================
