use super::{
    ContentKind, ConversionResult, Converter, OutputTarget, extension, file_name, has_extension,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use eyre::{Context, Result};
use std::fs;
use std::path::Path;

const EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "heic", "heif", "svg", "bmp", "tiff", "tif",
];

/// Images inlined as base64 `data:` URIs.
pub struct ImageConverter;

impl Converter for ImageConverter {
    fn name(&self) -> &str {
        "image"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, EXTENSIONS)
    }

    fn convert(&self, path: &Path, _: &OutputTarget) -> Result<ConversionResult> {
        let bytes = fs::read(path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let sniffed = match extension(path).as_deref() {
            Some("svg") => None,
            _ => infer::get(&bytes).map(|t| t.mime_type()),
        };
        let mime = sniffed
            .or_else(|| mime_from_extension(path))
            .unwrap_or("application/octet-stream");
        let name = file_name(path);
        let content = format!("![{}](data:{};base64,{})", name, mime, STANDARD.encode(&bytes));
        Ok(ConversionResult::converted(ContentKind::Image, content))
    }
}

/// SVG is text, and truncated files may not sniff.
fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let mime = match extension(path)?.as_str() {
        "svg" => "image/svg+xml",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(mime)
}
