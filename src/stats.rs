use crate::converter::ErrorType;
use crate::merger::FileStats;
use crate::utils::FileOutcome;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A note that could not be processed at all.
#[derive(Clone, Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Aggregate counters for one batch run. Counts only ever increase.
#[derive(Clone, Debug, Default)]
pub struct ProcessingStatistics {
    pub files_processed: usize,
    /// Written, but with at least one attachment error. Subset of `files_processed`.
    pub files_with_attachment_errors: usize,
    pub files_errored: usize,
    pub files_skipped: usize,
    pub files_unchanged: usize,

    pub total_attachments: usize,
    pub success_attachments: usize,
    pub error_attachments: usize,
    pub skipped_attachments: usize,
    pub external_attachments: usize,
    pub error_types: BTreeMap<ErrorType, usize>,

    pub failures: Vec<FileFailure>,
}

impl ProcessingStatistics {
    pub fn record(&mut self, path: &Path, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Unchanged => self.files_unchanged += 1,
            FileOutcome::Vanished => self.files_skipped += 1,
            FileOutcome::Written(stats) => self.record_written(&stats),
            FileOutcome::Failed(e) => {
                self.files_errored += 1;
                self.failures.push(FileFailure {
                    path: path.to_path_buf(),
                    message: format!("{:#}", e),
                });
            }
        }
    }

    fn record_written(&mut self, stats: &FileStats) {
        self.files_processed += 1;
        if stats.error > 0 {
            self.files_with_attachment_errors += 1;
        }
        self.total_attachments += stats.total;
        self.success_attachments += stats.success;
        self.error_attachments += stats.error;
        self.skipped_attachments += stats.skipped;
        self.external_attachments += stats.external;
        for (error_type, count) in &stats.error_types {
            *self.error_types.entry(*error_type).or_default() += count;
        }
    }

    pub fn total_files(&self) -> usize {
        self.files_processed + self.files_errored + self.files_skipped + self.files_unchanged
    }

    /// Whether any note failed outright. Attachment errors do not count.
    pub fn has_file_errors(&self) -> bool {
        self.files_errored > 0
    }
}

impl fmt::Display for ProcessingStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Processing Summary")?;
        writeln!(f, "┏━━━━━━━━━━━━━┳━━━━━━━┳━━━━━━━━━┳━━━━━━━┳━━━━━━━━━┓")?;
        writeln!(f, "┃ Category    ┃ Total ┃ Success ┃ Error ┃ Skipped ┃")?;
        writeln!(f, "┡━━━━━━━━━━━━━╇━━━━━━━╇━━━━━━━━━╇━━━━━━━╇━━━━━━━━━┩")?;
        writeln!(
            f,
            "│ Files       │ {:5} │ {:7} │ {:5} │ {:7} │",
            self.total_files(),
            self.files_processed,
            self.files_errored,
            self.files_unchanged + self.files_skipped,
        )?;
        writeln!(
            f,
            "│ Attachments │ {:5} │ {:7} │ {:5} │ {:7} │",
            self.total_attachments,
            self.success_attachments,
            self.error_attachments,
            self.skipped_attachments,
        )?;
        writeln!(f, "└─────────────┴───────┴─────────┴───────┴─────────┘")?;

        if self.external_attachments > 0 {
            writeln!(f, "External URLs skipped: {}", self.external_attachments)?;
        }
        if self.files_with_attachment_errors > 0 {
            writeln!(
                f,
                "Notes written with attachment errors: {}",
                self.files_with_attachment_errors
            )?;
        }
        if !self.error_types.is_empty() {
            writeln!(f, "Error type breakdown:")?;
            for (error_type, count) in &self.error_types {
                writeln!(f, "  - {}: {}", error_type, count)?;
            }
        }
        if !self.failures.is_empty() {
            writeln!(f, "Failed notes:")?;
            for failure in &self.failures {
                writeln!(f, "  - {}: {}", failure.path.display(), failure.message)?;
            }
        }
        Ok(())
    }
}
