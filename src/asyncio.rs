//! Async facade over [`ExcelService`]
//!
//! Each call runs the blocking pipeline on tokio's blocking pool. File reads
//! and writes go through `tokio::fs`. Cancellation is cooperative: the token
//! is checked before work starts and again at each file I/O boundary, never
//! in the middle of a backend call.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::SpreadsheetBackend;
use crate::config::ImportOptions;
use crate::error::{SheetError, SheetResult};
use crate::pipeline::{validate_output_path, ExcelService, ExportHooks};
use crate::record::Record;
use crate::tabular::TabularData;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the token has fired
    pub fn check(&self) -> SheetResult<()> {
        if self.is_cancelled() {
            Err(SheetError::Cancelled)
        } else {
            Ok(())
        }
    }
}

pub struct AsyncExcelService<B: SpreadsheetBackend + 'static> {
    inner: Arc<ExcelService<B>>,
}

impl<B: SpreadsheetBackend + 'static> Clone for AsyncExcelService<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: SpreadsheetBackend + 'static> AsyncExcelService<B> {
    pub fn new(service: ExcelService<B>) -> Self {
        Self {
            inner: Arc::new(service),
        }
    }

    pub fn service(&self) -> &ExcelService<B> {
        &self.inner
    }

    /// Import a worksheet from `path` into tabular data.
    ///
    /// A missing or unreadable file is `Ok(None)`, like every other
    /// input-absence case.
    pub async fn import_file(
        &self,
        path: impl AsRef<Path>,
        options: ImportOptions,
        token: &CancelToken,
    ) -> SheetResult<Option<TabularData>> {
        let Some(bytes) = read_input(path.as_ref(), token).await? else {
            return Ok(None);
        };
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.import_bytes(&bytes, &options))
            .await
            .map_err(join_error)
    }

    /// Import a worksheet from `path` into typed records.
    pub async fn import_records_file<T: Record + Default>(
        &self,
        path: impl AsRef<Path>,
        options: ImportOptions,
        token: &CancelToken,
    ) -> SheetResult<Vec<T>> {
        let Some(bytes) = read_input(path.as_ref(), token).await? else {
            return Ok(Vec::new());
        };
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.import_records::<T>(&bytes, &options))
            .await
            .map_err(join_error)?
    }

    /// Export records to `path`, creating parent directories as needed.
    ///
    /// Cancelling after the file write has started may leave a partial file.
    pub async fn export_records_to_file<T: Record>(
        &self,
        records: Vec<T>,
        path: impl AsRef<Path>,
        sheet_name: &str,
        title: &str,
        token: &CancelToken,
    ) -> SheetResult<PathBuf> {
        let path = validate_output_path(path.as_ref())?;
        token.check()?;
        let inner = Arc::clone(&self.inner);
        let (sheet_name, title) = (sheet_name.to_string(), title.to_string());
        let bytes = tokio::task::spawn_blocking(move || {
            inner.export_records(&records, &sheet_name, &title, ExportHooks::none())
        })
        .await
        .map_err(join_error)??;
        write_output(&path, &bytes, token).await?;
        Ok(path)
    }

    /// Export tabular data to `path`, creating parent directories as needed.
    pub async fn export_tabular_to_file(
        &self,
        data: TabularData,
        path: impl AsRef<Path>,
        sheet_name: &str,
        title: &str,
        token: &CancelToken,
    ) -> SheetResult<PathBuf> {
        let path = validate_output_path(path.as_ref())?;
        token.check()?;
        let inner = Arc::clone(&self.inner);
        let (sheet_name, title) = (sheet_name.to_string(), title.to_string());
        let bytes = tokio::task::spawn_blocking(move || {
            inner.export_tabular(&data, &sheet_name, &title, ExportHooks::none())
        })
        .await
        .map_err(join_error)??;
        write_output(&path, &bytes, token).await?;
        Ok(path)
    }
}

async fn read_input(path: &Path, token: &CancelToken) -> SheetResult<Option<Vec<u8>>> {
    token.check()?;
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read import file");
            return Ok(None);
        }
    };
    token.check()?;
    Ok(Some(bytes))
}

async fn write_output(path: &Path, bytes: &[u8], token: &CancelToken) -> SheetResult<()> {
    token.check()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    token.check()?;
    tokio::fs::write(path, bytes).await?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote workbook");
    Ok(())
}

fn join_error(e: tokio::task::JoinError) -> SheetError {
    SheetError::Task(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(SheetError::Cancelled)));
    }
}
