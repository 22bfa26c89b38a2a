use super::{ContentKind, ConversionResult, Converter, OutputTarget, extension, has_extension};
use eyre::{Context, Result};
use std::fs;
use std::path::Path;

const EXTENSIONS: &[&str] = &[
    "txt", "json", "log", "md", "html", "htm", "xml", "yaml", "yml", "toml",
];

/// Plain-text attachments, wrapped in a fenced block.
pub struct TextConverter;

impl Converter for TextConverter {
    fn name(&self) -> &str {
        "text"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, EXTENSIONS)
    }

    fn convert(&self, path: &Path, _: &OutputTarget) -> Result<ConversionResult> {
        let bytes = fs::read(path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let text = decode_text(bytes);
        let ext = extension(path).unwrap_or_default();

        let content = match ext.as_str() {
            "json" => match serde_json::from_str::<serde_json::Value>(&text)
                .and_then(|v| serde_json::to_string_pretty(&v))
            {
                Ok(pretty) => fenced("json", &pretty),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "JSON attachment did not parse; embedding verbatim");
                    fenced("json", &text)
                }
            },
            "html" | "htm" => fenced("html", &text),
            "xml" | "yaml" | "toml" => fenced(&ext, &text),
            "yml" => fenced("yaml", &text),
            _ => fenced("", &text),
        };
        Ok(ConversionResult::converted(ContentKind::Text, content))
    }
}

/// UTF-8, falling back to Latin-1 (every byte maps to one char).
fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
    }
}

/// Fence with enough backticks to survive backtick runs inside `body`.
fn fenced(lang: &str, body: &str) -> String {
    let longest = body
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat(longest.max(2) + 1);
    format!("{fence}{lang}\n{}\n{fence}", body.trim_end_matches('\n'))
}
