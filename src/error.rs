use std::fmt;

use thiserror::Error;

pub type SheetResult<T> = Result<T, SheetError>;

/// Export stage that failed, carried by [`SheetError::Export`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStage {
    /// Resolving columns or converting record fields into cells
    Mapping,
    /// Creating the worksheet, title or header row
    Layout,
    /// Writing body rows
    Write,
    /// Running a caller-supplied worksheet hook
    Hook,
    /// Serializing the workbook
    Save,
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportStage::Mapping => "mapping",
            ExportStage::Layout => "layout",
            ExportStage::Write => "write",
            ExportStage::Hook => "hook",
            ExportStage::Save => "save",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Export failed during {stage}: {message}")]
    Export { stage: ExportStage, message: String },

    #[error("Coercion error: {0}")]
    Coercion(#[from] CoercionError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl SheetError {
    pub fn export(stage: ExportStage, message: impl Into<String>) -> Self {
        SheetError::Export {
            stage,
            message: message.into(),
        }
    }

    /// Re-label an error as an export failure at `stage`.
    ///
    /// Errors that already name a stage, and cancellations, pass through.
    pub fn at_stage(self, stage: ExportStage) -> Self {
        match self {
            SheetError::Export { .. } | SheetError::Cancelled => self,
            other => SheetError::export(stage, other.to_string()),
        }
    }

    /// The failed export stage, if this is an export error.
    pub fn stage(&self) -> Option<ExportStage> {
        match self {
            SheetError::Export { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Failure converting a single cell or field value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoercionError {
    #[error("cannot convert {from} to {to}")]
    Incompatible { from: &'static str, to: &'static str },

    #[error("'{text}' is not a valid {to}")]
    InvalidText { text: String, to: &'static str },

    #[error("'{text}' does not name an enum member")]
    EnumMember { text: String },

    #[error("enum ordinal {ordinal} out of range (0..{len})")]
    EnumOrdinal { ordinal: f64, len: usize },

    #[error("{value} does not fit in {to}")]
    Overflow { value: String, to: &'static str },

    #[error("{0} is not a valid serial date")]
    InvalidSerialDate(f64),

    #[error("unknown field '{0}'")]
    UnknownField(String),
}
