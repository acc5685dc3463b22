//! Pipeline configuration
//!
//! `ExcelOptions` is an immutable snapshot handed to each pipeline call.
//! It can be built in code or loaded from YAML using the documented
//! camelCase option names:
//!
//! ```yaml
//! parallelProcessingThreshold: 1000
//! batchSize: 5000
//! continueOnError: true
//! enablePerformanceMonitoring: true
//! performanceThreshold: 250
//! style:
//!   headerBackground: "#DDEBF7"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{SheetError, SheetResult};

/// Global import/export options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ExcelOptions {
    /// Row count above which record-to-row conversion runs in parallel
    pub parallel_processing_threshold: usize,
    /// Rows handed to the backend per write call when batching is enabled
    pub batch_size: usize,
    pub enable_batch_write: bool,
    /// Skip cells that fail coercion instead of aborting the call
    pub continue_on_error: bool,
    pub enable_performance_monitoring: bool,
    /// Milliseconds an operation may take before a timing record is logged
    pub performance_threshold: u64,
    pub default_date_format: String,
    pub auto_fit_columns: bool,
    pub style: StyleOptions,
}

impl Default for ExcelOptions {
    fn default() -> Self {
        Self {
            parallel_processing_threshold: 1000,
            batch_size: 5000,
            enable_batch_write: true,
            continue_on_error: true,
            enable_performance_monitoring: false,
            performance_threshold: 500,
            default_date_format: "yyyy-mm-dd".to_string(),
            auto_fit_columns: true,
            style: StyleOptions::default(),
        }
    }
}

impl ExcelOptions {
    pub fn from_yaml_str(yaml: &str) -> SheetResult<Self> {
        let options: ExcelOptions = serde_yaml::from_str(yaml)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: impl AsRef<Path>) -> SheetResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml(&self) -> SheetResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> SheetResult<()> {
        if self.batch_size == 0 {
            return Err(SheetError::Validation(
                "batchSize must be greater than zero".to_string(),
            ));
        }
        if self.default_date_format.trim().is_empty() {
            return Err(SheetError::Validation(
                "defaultDateFormat must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_processing_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    #[must_use]
    pub fn with_performance_monitoring(mut self, enabled: bool, threshold_ms: u64) -> Self {
        self.enable_performance_monitoring = enabled;
        self.performance_threshold = threshold_ms;
        self
    }
}

/// Rendering hints for concrete backends; the pipeline never reads these
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StyleOptions {
    pub header_bold: bool,
    /// Hex color such as `#DDEBF7`
    pub header_background: Option<String>,
    pub title_bold: bool,
    pub title_font_size: f64,
    pub borders: bool,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            header_bold: true,
            header_background: None,
            title_bold: true,
            title_font_size: 14.0,
            borders: false,
        }
    }
}

/// Per-call import settings
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    /// Worksheet to read; the first sheet when `None`
    pub sheet_name: Option<String>,
    /// Zero-based header row; `None` means the sheet has no header row
    pub header_row: Option<usize>,
    pub keep_empty_rows: bool,
    /// Infer each column's kind from its values
    pub infer_types: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            sheet_name: None,
            header_row: Some(0),
            keep_empty_rows: false,
            infer_types: true,
        }
    }
}

impl ImportOptions {
    #[must_use]
    pub fn sheet(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn header_row(mut self, row: Option<usize>) -> Self {
        self.header_row = row;
        self
    }

    #[must_use]
    pub fn keep_empty_rows(mut self, keep: bool) -> Self {
        self.keep_empty_rows = keep;
        self
    }

    #[must_use]
    pub fn infer_types(mut self, infer: bool) -> Self {
        self.infer_types = infer;
        self
    }
}
