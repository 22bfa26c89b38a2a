//! Attachment converters.
//!
//! Each converter handles one family of files and turns it into
//! markdown-ready text. The [`ConverterRegistry`] picks the first converter
//! whose [`Converter::can_handle`] accepts a path, and falls back to the
//! binary converter for anything else.

mod analysis_cache;
mod binary;
mod document;
mod image;
mod pdf;
mod spreadsheet;
mod text;
mod vision;

pub use self::analysis_cache::AnalysisCache;
pub use self::binary::BinaryConverter;
pub use self::document::DocumentConverter;
pub use self::image::ImageConverter;
pub use self::pdf::PdfConverter;
pub use self::spreadsheet::SpreadsheetConverter;
pub use self::text::TextConverter;
pub use self::vision::{OpenAiVision, VisionClient, VisionConverter};

use crate::utils::ConsolidateConfig;
use std::fmt;
use std::path::{Path, PathBuf};

/// Coarse content family of a conversion result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Document,
    Image,
    Pdf,
    Spreadsheet,
    Text,
    Binary,
    Unknown,
}

/// Closed taxonomy of attachment failures, used to bucket statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorType {
    FileNotFound,
    UnsupportedType,
    ConversionError,
    ProcessingError,
    ExternalUrl,
    MissingAttachmentDir,
    EmptyContent,
    ToolUnavailable,
    EncodingError,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::FileNotFound => "file_not_found",
            ErrorType::UnsupportedType => "unsupported_type",
            ErrorType::ConversionError => "conversion_error",
            ErrorType::ProcessingError => "processing_error",
            ErrorType::ExternalUrl => "external_url",
            ErrorType::MissingAttachmentDir => "missing_attachment_dir",
            ErrorType::EmptyContent => "empty_content",
            ErrorType::ToolUnavailable => "tool_unavailable",
            ErrorType::EncodingError => "encoding_error",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standardized outcome of converting one attachment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionResult {
    pub success: bool,
    pub content: Option<String>,
    pub kind: ContentKind,
    pub error: Option<String>,
    pub error_type: Option<ErrorType>,
}

impl ConversionResult {
    pub fn converted(kind: ContentKind, content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: Some(content.into()),
            kind,
            error: None,
            error_type: None,
        }
    }

    pub fn failed(kind: ContentKind, error_type: ErrorType, error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            kind,
            error: Some(error.into()),
            error_type: Some(error_type),
        }
    }
}

/// Where the note embedding a conversion is written.
///
/// Files a converter extracts (document media) go under [`Self::media_dir`]
/// and are linked from the note through [`Self::media_relative`], so the
/// links stay valid and identical from one run to the next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputTarget {
    note_dir: PathBuf,
    media_relative: PathBuf,
}

impl OutputTarget {
    /// Media for `attachment` lives in `<note stem>/<attachment stem>-<ext>/`
    /// beside `output_note`.
    pub fn new(output_note: &Path, attachment: &Path) -> Self {
        let note_dir = output_note.parent().map(Path::to_path_buf).unwrap_or_default();
        let note_stem = output_note.file_stem().unwrap_or_default();
        let mut folder = attachment.file_stem().unwrap_or_default().to_os_string();
        if let Some(ext) = attachment.extension() {
            folder.push("-");
            folder.push(ext);
        }
        Self {
            note_dir,
            media_relative: Path::new(note_stem).join(folder),
        }
    }

    /// Directory of the output note.
    pub fn note_dir(&self) -> &Path {
        &self.note_dir
    }

    /// Media directory relative to [`Self::note_dir`].
    pub fn media_relative(&self) -> &Path {
        &self.media_relative
    }

    pub fn media_dir(&self) -> PathBuf {
        self.note_dir.join(&self.media_relative)
    }
}

/// A converter for one family of attachment files.
///
/// `convert` may return `Err` for unexpected failures (I/O, subprocess
/// spawn); the registry turns those into a `conversion_error` result.
/// Expected failures are reported as an unsuccessful [`ConversionResult`].
pub trait Converter: Send + Sync {
    fn name(&self) -> &str;
    fn can_handle(&self, path: &Path) -> bool;
    fn convert(&self, path: &Path, target: &OutputTarget) -> eyre::Result<ConversionResult>;
}

/// Ordered converters plus a catch-all fallback.
pub struct ConverterRegistry {
    converters: Vec<Box<dyn Converter>>,
    fallback: Option<Box<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new(converters: Vec<Box<dyn Converter>>, fallback: Option<Box<dyn Converter>>) -> Self {
        Self {
            converters,
            fallback,
        }
    }

    /// The standard converter chain.
    ///
    /// Images are described by the vision model when an API key is
    /// configured, and inlined as data URIs otherwise. `scratch_dir` holds
    /// intermediate PNG renderings for the vision model.
    pub fn standard(config: &ConsolidateConfig, scratch_dir: &Path) -> Self {
        let mut converters: Vec<Box<dyn Converter>> = vec![
            Box::new(DocumentConverter::new(config.pandoc_path.clone())),
            Box::new(PdfConverter::new(config.pdftotext_path.clone())),
            Box::new(SpreadsheetConverter),
        ];
        if let Some(api_key) = &config.openai_api_key {
            converters.push(Box::new(VisionConverter::new(
                Box::new(OpenAiVision::new(api_key.clone(), config.vision_model.clone())),
                AnalysisCache::new(config.analysis_cache_dir()),
                scratch_dir.to_path_buf(),
            )));
        }
        converters.push(Box::new(ImageConverter));
        converters.push(Box::new(TextConverter));
        Self::new(converters, Some(Box::new(BinaryConverter)))
    }

    fn select(&self, path: &Path) -> Option<&dyn Converter> {
        self.converters
            .iter()
            .find(|c| c.can_handle(path))
            .or(self.fallback.as_ref())
            .map(|c| c.as_ref())
    }

    pub fn convert(&self, path: &Path, target: &OutputTarget) -> ConversionResult {
        if !path.exists() {
            return ConversionResult::failed(
                ContentKind::Unknown,
                ErrorType::FileNotFound,
                format!("File not found: {}", path.display()),
            );
        }
        let Some(converter) = self.select(path) else {
            return ConversionResult::failed(
                ContentKind::Unknown,
                ErrorType::UnsupportedType,
                format!("No converter found for file: {}", path.display()),
            );
        };
        tracing::info!(converter = converter.name(), path = %path.display(), "Converting attachment");
        match converter.convert(path, target) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(path = %path.display(), error = %format!("{:#}", e), "Converter failed");
                ConversionResult::failed(
                    ContentKind::Unknown,
                    ErrorType::ConversionError,
                    format!("Error converting file: {:#}", e),
                )
            }
        }
    }
}

/// Lower-cased extension without the dot.
pub(crate) fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

pub(crate) fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    extension(path).is_some_and(|ext| allowed.contains(&ext.as_str()))
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A target for converters that never extract media.
#[cfg(test)]
pub(crate) fn scratch_target() -> OutputTarget {
    OutputTarget::new(Path::new("out/Note.md"), Path::new("Note/attachment.bin"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::eyre;
    use std::fs;

    struct Upper;

    impl Converter for Upper {
        fn name(&self) -> &str {
            "upper"
        }
        fn can_handle(&self, path: &Path) -> bool {
            has_extension(path, &["up"])
        }
        fn convert(&self, path: &Path, _: &OutputTarget) -> eyre::Result<ConversionResult> {
            Ok(ConversionResult::converted(
                ContentKind::Text,
                fs::read_to_string(path)?.to_uppercase(),
            ))
        }
    }

    struct Exploding;

    impl Converter for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }
        fn can_handle(&self, _: &Path) -> bool {
            true
        }
        fn convert(&self, _: &Path, _: &OutputTarget) -> eyre::Result<ConversionResult> {
            Err(eyre!("boom"))
        }
    }

    #[test]
    fn first_matching_converter_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.up");
        fs::write(&path, "hi").unwrap();
        let registry = ConverterRegistry::new(vec![Box::new(Upper), Box::new(Exploding)], None);
        assert_eq!(registry.convert(&path, &scratch_target()).content.as_deref(), Some("HI"));
    }

    #[test]
    fn converter_errors_become_conversion_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.bin");
        fs::write(&path, "x").unwrap();
        let registry = ConverterRegistry::new(vec![Box::new(Exploding)], None);
        let result = registry.convert(&path, &scratch_target());
        assert!(!result.success);
        assert_eq!(result.error_type, Some(ErrorType::ConversionError));
        assert!(result.error.unwrap().contains("boom"));
    }

    #[test]
    fn unmatched_without_fallback_is_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.zzz");
        fs::write(&path, "x").unwrap();
        let registry = ConverterRegistry::new(vec![Box::new(Upper)], None);
        assert_eq!(registry.convert(&path, &scratch_target()).error_type, Some(ErrorType::UnsupportedType));
    }

    #[test]
    fn fallback_handles_anything() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.zzz");
        fs::write(&path, [0u8, 1, 2, 3]).unwrap();
        let registry = ConverterRegistry::new(vec![Box::new(Upper)], Some(Box::new(BinaryConverter)));
        let result = registry.convert(&path, &scratch_target());
        assert!(result.success);
        assert_eq!(result.kind, ContentKind::Binary);
    }

    #[test]
    fn missing_file_is_reported() {
        let registry = ConverterRegistry::new(Vec::new(), Some(Box::new(BinaryConverter)));
        let result = registry.convert(Path::new("/definitely/not/here.png"), &scratch_target());
        assert_eq!(result.error_type, Some(ErrorType::FileNotFound));
    }

    #[test]
    fn media_lands_beside_the_output_note() {
        let target = OutputTarget::new(
            Path::new("/out/Trips/Paris.md"),
            Path::new("/src/Trips/Paris/itinerary.docx"),
        );
        assert_eq!(target.note_dir(), Path::new("/out/Trips"));
        assert_eq!(target.media_relative(), Path::new("Paris/itinerary-docx"));
        assert_eq!(target.media_dir(), PathBuf::from("/out/Trips/Paris/itinerary-docx"));
    }

    #[test]
    fn same_stem_different_extension_gets_separate_media() {
        let out = Path::new("/out/Note.md");
        let docx = OutputTarget::new(out, Path::new("report.docx"));
        let odt = OutputTarget::new(out, Path::new("report.odt"));
        assert_ne!(docx.media_dir(), odt.media_dir());
    }
}
