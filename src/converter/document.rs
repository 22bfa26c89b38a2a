use super::{
    ContentKind, ConversionResult, Converter, ErrorType, OutputTarget, extension, file_name,
    has_extension,
};
use eyre::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const EXTENSIONS: &[&str] = &["docx", "doc", "rtf", "odt", "pptx", "ppt", "epub"];

/// Office-style documents converted through `pandoc`.
///
/// Embedded media is extracted into the note's [`OutputTarget`] and linked
/// relative to the output note.
pub struct DocumentConverter {
    program: Option<PathBuf>,
}

impl DocumentConverter {
    /// `program` overrides the `pandoc` found on `PATH`.
    pub fn new(program: Option<PathBuf>) -> Self {
        Self {
            program: program.or_else(|| which::which("pandoc").ok()),
        }
    }
}

/// pandoc reader name for an extension.
fn input_format(ext: &str) -> &str {
    match ext {
        "doc" | "docx" => "docx",
        "ppt" | "pptx" => "pptx",
        other => other,
    }
}

impl Converter for DocumentConverter {
    fn name(&self) -> &str {
        "document"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, EXTENSIONS)
    }

    fn convert(&self, path: &Path, target: &OutputTarget) -> Result<ConversionResult> {
        let Some(program) = &self.program else {
            return Ok(ConversionResult::failed(
                ContentKind::Document,
                ErrorType::ToolUnavailable,
                "pandoc not available; install it from https://pandoc.org/installing.html",
            ));
        };
        let ext = extension(path).unwrap_or_default();
        let input = fs::canonicalize(path)
            .wrap_err_with(|| format!("Failed to resolve {}", path.display()))?;
        fs::create_dir_all(target.note_dir())
            .wrap_err_with(|| format!("Failed to create {}", target.note_dir().display()))?;

        // pandoc writes media links exactly as given, so run it from the
        // note's directory with a relative media path.
        let output = Command::new(program)
            .current_dir(target.note_dir())
            .arg("-f")
            .arg(input_format(&ext))
            .arg("-t")
            .arg("markdown")
            .arg("--wrap=none")
            .arg("--extract-media")
            .arg(target.media_relative())
            .arg(&input)
            .output()
            .wrap_err_with(|| format!("Failed to run {}", program.display()))?;

        if !output.status.success() {
            return Ok(ConversionResult::failed(
                ContentKind::Document,
                ErrorType::ConversionError,
                format!(
                    "Failed to convert document {}: {}",
                    file_name(path),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let markdown = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        if markdown.trim().is_empty() {
            return Ok(ConversionResult::failed(
                ContentKind::Document,
                ErrorType::EmptyContent,
                format!("Document {} produced no text", file_name(path)),
            ));
        }
        Ok(ConversionResult::converted(ContentKind::Document, markdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("doc", "docx")]
    #[case("ppt", "pptx")]
    #[case("odt", "odt")]
    #[case("rtf", "rtf")]
    fn maps_extensions_to_readers(#[case] ext: &str, #[case] format: &str) {
        assert_eq!(input_format(ext), format);
    }

    #[test]
    fn handles_office_extensions_case_insensitively() {
        let converter = DocumentConverter { program: None };
        assert!(converter.can_handle(Path::new("Report.DOCX")));
        assert!(!converter.can_handle(Path::new("report.pdf")));
    }

    #[test]
    fn missing_pandoc_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.docx");
        fs::write(&path, b"PK").unwrap();
        let converter = DocumentConverter { program: None };
        let target = OutputTarget::new(&tmp.path().join("out/a.md"), &path);
        let result = converter.convert(&path, &target).unwrap();
        assert_eq!(result.error_type, Some(ErrorType::ToolUnavailable));
    }

    /// Stand-in for pandoc: extracts one image into the `--extract-media`
    /// directory and links it the way pandoc does.
    #[cfg(unix)]
    fn fake_pandoc(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("pandoc");
        fs::write(
            &script,
            "#!/bin/sh\n\
             while [ $# -gt 0 ]; do\n\
             \x20 if [ \"$1\" = \"--extract-media\" ]; then media=\"$2\"; shift; fi\n\
             \x20 shift\n\
             done\n\
             mkdir -p \"$media/media\"\n\
             printf 'png' > \"$media/media/image1.png\"\n\
             printf 'Body\\n\\n![](%s/media/image1.png)\\n' \"$media\"\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn media_is_extracted_beside_the_output_note() {
        let tmp = tempfile::tempdir().unwrap();
        let attachment = tmp.path().join("src/Report/report.docx");
        fs::create_dir_all(attachment.parent().unwrap()).unwrap();
        fs::write(&attachment, b"PK").unwrap();
        let output_note = tmp.path().join("dest/Report.md");
        let target = OutputTarget::new(&output_note, &attachment);
        let converter = DocumentConverter {
            program: Some(fake_pandoc(tmp.path())),
        };

        let result = converter.convert(&attachment, &target).unwrap();

        let content = result.content.unwrap();
        assert!(content.contains("![](Report/report-docx/media/image1.png)"));
        assert!(tmp.path().join("dest/Report/report-docx/media/image1.png").is_file());
        let again = converter.convert(&attachment, &target).unwrap();
        assert_eq!(again.content.unwrap(), content);
    }
}
