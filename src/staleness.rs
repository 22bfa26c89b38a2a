use crate::markdown_file::MarkdownFile;
use crate::utils::modified_time;
use std::path::{Path, PathBuf};

/// Why a note does or does not need regenerating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    Forced,
    MissingOutput,
    SourceModified,
    AttachmentModified(PathBuf),
    Unchanged,
}

impl Staleness {
    pub fn needs_processing(&self) -> bool {
        !matches!(self, Staleness::Unchanged)
    }
}

/// Compare modification times of a note, its attachments and its previous
/// output. Rules are evaluated in order and the first match decides.
///
/// Only `stat` metadata is consulted; content is never hashed. Any timestamp
/// that cannot be read counts as "needs processing".
pub fn assess(file: &MarkdownFile, output: &Path, force: bool) -> Staleness {
    if force {
        return Staleness::Forced;
    }
    let Some(output_mtime) = modified_time(output) else {
        return Staleness::MissingOutput;
    };
    match modified_time(file.path()) {
        Some(source_mtime) if source_mtime <= output_mtime => {}
        _ => return Staleness::SourceModified,
    }
    for attachment in file.attachments() {
        match modified_time(attachment) {
            Some(mtime) if mtime <= output_mtime => {}
            _ => return Staleness::AttachmentModified(attachment.clone()),
        }
    }
    Staleness::Unchanged
}

pub fn should_process(file: &MarkdownFile, output: &Path, force: bool) -> bool {
    assess(file, output, force).needs_processing()
}
