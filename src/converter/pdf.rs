use super::{
    ContentKind, ConversionResult, Converter, ErrorType, OutputTarget, file_name, has_extension,
};
use eyre::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Extracts PDF text page by page with poppler's `pdftotext`.
pub struct PdfConverter {
    program: Option<PathBuf>,
}

impl PdfConverter {
    /// `program` overrides the `pdftotext` found on `PATH`.
    pub fn new(program: Option<PathBuf>) -> Self {
        Self {
            program: program.or_else(|| which::which("pdftotext").ok()),
        }
    }
}

impl Converter for PdfConverter {
    fn name(&self) -> &str {
        "pdf"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, &["pdf"])
    }

    fn convert(&self, path: &Path, _: &OutputTarget) -> Result<ConversionResult> {
        let Some(program) = &self.program else {
            return Ok(ConversionResult::failed(
                ContentKind::Pdf,
                ErrorType::ToolUnavailable,
                "pdftotext not available; install poppler-utils",
            ));
        };

        let output = Command::new(program)
            .arg("-layout")
            .arg("-enc")
            .arg("UTF-8")
            .arg(path)
            .arg("-")
            .output()
            .wrap_err_with(|| format!("Failed to run {}", program.display()))?;

        if !output.status.success() {
            return Ok(ConversionResult::failed(
                ContentKind::Pdf,
                ErrorType::ConversionError,
                format!(
                    "Failed to convert PDF {}: {}",
                    file_name(path),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        match format_pages(&text) {
            Some(content) => Ok(ConversionResult::converted(ContentKind::Pdf, content)),
            None => Ok(ConversionResult::failed(
                ContentKind::Pdf,
                ErrorType::EmptyContent,
                "No text content found in PDF",
            )),
        }
    }
}

/// `pdftotext` separates pages with form feeds. Blank pages are dropped but
/// keep their number in the headings.
fn format_pages(text: &str) -> Option<String> {
    let pages: Vec<String> = text
        .split('\x0c')
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| format!("### Page {}\n\n{}", i + 1, page.trim_end()))
        .collect();
    (!pages.is_empty()).then(|| pages.join("\n\n"))
}
