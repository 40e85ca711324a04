use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use merger_core::{ProgressEvent, ReportLevel};
use rust_xlsxwriter::XlsxError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::output::OutputWorkbook;
use crate::persist::{commit_staged, stage_beside, PersistError};
use crate::reader::{read_first_sheet, SourceError};
use crate::settings::{MergeSettings, SettingsError};
use crate::sink::ProgressSink;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no source files were provided")]
    NoSources,
    #[error("file '{}': header row does not match the first file", file_name(.file))]
    HeaderMismatch { file: PathBuf },
    #[error("row limit of {limit} reached; merge aborted")]
    RowLimit { limit: u32 },
    #[error("merge cancelled by user")]
    Cancelled,
    #[error("could not open '{}': {detail}", file_name(.file))]
    Open { file: PathBuf, detail: String },
    #[error("could not read '{}': {detail}", file_name(.file))]
    Read { file: PathBuf, detail: String },
    #[error("could not write merged workbook: {0}")]
    Write(String),
    #[error("could not save merged file: {0}")]
    Persist(#[from] PersistError),
    #[error("{0}")]
    Settings(#[from] SettingsError),
}

impl From<XlsxError> for MergeError {
    fn from(err: XlsxError) -> Self {
        MergeError::Write(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    /// Data rows written, header excluded.
    pub rows_merged: u64,
    pub files_merged: usize,
    pub destination: PathBuf,
}

/// Everything a controller-driven merge needs.
#[derive(Debug, Clone)]
pub struct MergeJob {
    pub sources: Vec<PathBuf>,
    pub destination: PathBuf,
    pub settings: MergeSettings,
}

impl MergeJob {
    /// Runs the job, reducing the outcome to the controller's message contract.
    pub fn run(
        &self,
        cancel: &CancellationToken,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<(), String> {
        merge_files(
            &self.sources,
            &self.destination,
            &self.settings,
            sink.as_ref(),
            cancel,
        )
        .map(|_| ())
        .map_err(|err| err.to_string())
    }
}

/// Overall percent for a status update while file `index` of `total` is being read.
///
/// Finished files count fully and the current file counts as half done,
/// whatever its position: `((index / total) + (0.5 / total)) * 100`, floored.
pub fn overall_percent(index: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (2 * index + 1) * 50 / total;
    percent.min(100) as u8
}

/// Merges the first sheet of every source into a single workbook at `destination`.
///
/// The destination is only replaced once the whole merge has succeeded.
pub fn merge_files(
    sources: &[PathBuf],
    destination: &Path,
    settings: &MergeSettings,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<MergeSummary, MergeError> {
    if sources.is_empty() {
        return Err(MergeError::NoSources);
    }
    settings.validate()?;

    engine_info!(
        "Merging {} file(s) into {:?} (key column {}, chunk {})",
        sources.len(),
        destination,
        settings.key_column_index,
        settings.effective_chunk_size()
    );
    let result = run_merge(sources, destination, settings, sink, cancel);
    match &result {
        Ok(summary) => engine_info!(
            "Merged {} row(s) from {} file(s) into {:?}",
            summary.rows_merged,
            summary.files_merged,
            summary.destination
        ),
        Err(MergeError::Cancelled) => engine_warn!("Merge into {:?} cancelled", destination),
        Err(err) => engine_error!("Merge into {:?} failed: {}", destination, err),
    }
    result
}

fn run_merge(
    sources: &[PathBuf],
    destination: &Path,
    settings: &MergeSettings,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<MergeSummary, MergeError> {
    sink.emit(
        ProgressEvent::message(ReportLevel::ProcessStart, "merge started")
            .with_progress_text("0%")
            .with_progress_value(0),
    );

    let mut run = MergeRun {
        output: OutputWorkbook::new(&settings.sheet_name)?,
        canonical_header: None,
        next_row: 0,
        rows_merged: 0,
        settings,
        sink,
        cancel,
    };

    let total = sources.len();
    for (index, source) in sources.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(MergeError::Cancelled);
        }
        let mut cursor = FileCursor {
            path: source,
            index,
            total,
            header_read: false,
            accepted: 0,
        };
        sink.emit(
            ProgressEvent::message(
                ReportLevel::Information,
                format!("preparing file: {}", file_name(source)),
            )
            .with_progress_text(cursor.label())
            .with_tag(source),
        );

        let outcome = read_first_sheet(source, |row| run.visit_row(&mut cursor, row))
            .map_err(|err| match err {
                SourceError::Open(detail) => MergeError::Open {
                    file: source.clone(),
                    detail,
                },
                SourceError::Read(detail) => MergeError::Read {
                    file: source.clone(),
                    detail,
                },
            })?;
        if let Some(err) = outcome {
            return Err(err);
        }

        engine_debug!("{:?}: {} row(s) accepted", source, cursor.accepted);
        sink.emit(ProgressEvent::message(ReportLevel::Detail, "processed").with_tag(source));
    }

    sink.emit(
        ProgressEvent::message(
            ReportLevel::Information,
            "all files read, saving merged workbook...",
        )
        .with_progress_text("...")
        .with_progress_value(99),
    );
    let mut staged = stage_beside(destination)?;
    run.output.save_to(staged.as_file_mut())?;
    commit_staged(staged, destination)?;

    let rows_merged = run.rows_merged;
    sink.emit(
        ProgressEvent::message(
            ReportLevel::Success,
            format!("merge complete: {rows_merged} data row(s) merged"),
        )
        .with_progress_text("✓")
        .with_progress_value(100),
    );

    Ok(MergeSummary {
        rows_merged,
        files_merged: total,
        destination: destination.to_path_buf(),
    })
}

struct MergeRun<'a> {
    output: OutputWorkbook,
    canonical_header: Option<Vec<String>>,
    /// Next output row; also the count of rows written so far.
    next_row: u32,
    rows_merged: u64,
    settings: &'a MergeSettings,
    sink: &'a dyn ProgressSink,
    cancel: &'a CancellationToken,
}

struct FileCursor<'p> {
    path: &'p Path,
    index: usize,
    total: usize,
    header_read: bool,
    /// Rows accepted from this file.
    accepted: u64,
}

impl FileCursor<'_> {
    fn label(&self) -> String {
        format!("[{}/{}]", self.index + 1, self.total)
    }
}

impl MergeRun<'_> {
    fn visit_row(
        &mut self,
        cursor: &mut FileCursor<'_>,
        row: Vec<String>,
    ) -> ControlFlow<MergeError> {
        if !cursor.header_read {
            cursor.header_read = true;
            return self.check_header(cursor, row);
        }

        if self.next_row >= self.settings.max_rows {
            let limit = self.settings.max_rows;
            self.sink.emit(
                ProgressEvent::message(
                    ReportLevel::Error,
                    format!("row limit of {limit} reached; merge aborted"),
                )
                .with_progress_text("Limit Reached"),
            );
            return ControlFlow::Break(MergeError::RowLimit { limit });
        }
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(MergeError::Cancelled);
        }

        let key_present = row
            .get(self.settings.key_column_index)
            .is_some_and(|key| !key.trim().is_empty());
        if !key_present {
            return ControlFlow::Continue(());
        }

        if let Err(err) = self.output.write_row(self.next_row, &row) {
            return ControlFlow::Break(err.into());
        }
        self.next_row += 1;
        self.rows_merged += 1;
        cursor.accepted += 1;

        if cursor.accepted % self.settings.effective_chunk_size() as u64 == 0 {
            self.sink.emit(
                ProgressEvent::message(
                    ReportLevel::StatusUpdate,
                    format!(
                        "processing: {} ({} rows so far)",
                        file_name(cursor.path),
                        cursor.accepted
                    ),
                )
                .with_progress_text(cursor.label())
                .with_progress_value(overall_percent(cursor.index, cursor.total))
                .with_tag(cursor.path),
            );
        }
        ControlFlow::Continue(())
    }

    fn check_header(
        &mut self,
        cursor: &FileCursor<'_>,
        row: Vec<String>,
    ) -> ControlFlow<MergeError> {
        let header = normalize_header(row);
        match &self.canonical_header {
            None => {
                if let Err(err) = self.output.write_row(self.next_row, &header) {
                    return ControlFlow::Break(err.into());
                }
                self.next_row += 1;
                engine_debug!("Canonical header from {:?}: {:?}", cursor.path, header);
                self.canonical_header = Some(header);
                ControlFlow::Continue(())
            }
            Some(canonical) if *canonical == header => ControlFlow::Continue(()),
            Some(canonical) => {
                engine_warn!(
                    "Header mismatch in {:?}: expected {:?}, found {:?}",
                    cursor.path,
                    canonical,
                    header
                );
                self.sink.emit(
                    ProgressEvent::message(
                        ReportLevel::Error,
                        "header row does not match the first file",
                    )
                    .with_tag(cursor.path),
                );
                ControlFlow::Break(MergeError::HeaderMismatch {
                    file: cursor.path.to_path_buf(),
                })
            }
        }
    }
}

/// Trims every cell; the cell count is kept so headers compare positionally.
fn normalize_header(row: Vec<String>) -> Vec<String> {
    row.into_iter()
        .map(|cell| cell.trim().to_string())
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
