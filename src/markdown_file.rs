use eyre::{Context, Result, eyre};
use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

/// A discovered note and its (optional) sibling attachment directory.
///
/// For `Notes/Trip.md` the attachment directory is `Notes/Trip/`. The
/// directory is only recorded if it exists when the note is opened.
#[derive(Debug)]
pub struct MarkdownFile {
    path: PathBuf,
    attachment_dir: Option<PathBuf>,
    attachments: OnceCell<Vec<PathBuf>>,
}

impl MarkdownFile {
    /// Open a note, locating its attachment directory by the stem convention.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(eyre!("Markdown file not found: {}", path.display()));
        }
        let attachment_dir = path
            .file_stem()
            .map(|stem| path.with_file_name(stem))
            .filter(|dir| dir.is_dir());
        Ok(Self {
            path,
            attachment_dir,
            attachments: OnceCell::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the note itself.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new(""))
    }

    pub fn attachment_dir(&self) -> Option<&Path> {
        self.attachment_dir.as_deref()
    }

    /// Non-hidden regular files directly inside the attachment directory,
    /// sorted by path. Enumerated on first use.
    pub fn attachments(&self) -> &[PathBuf] {
        self.attachments.get_or_init(|| match &self.attachment_dir {
            Some(dir) => list_attachments(dir),
            None => Vec::new(),
        })
    }

    pub fn read_content(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .wrap_err_with(|| format!("Failed to read markdown: {}", self.path.display()))
    }
}

fn list_attachments(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Could not list attachment directory");
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files
}
