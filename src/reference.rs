use regex::Regex;
use serde_json::{Map, Value};
use std::ops::Range;
use std::sync::LazyLock;

/// `![alt](path)` or `[alt](path)`, optionally glued to a `<!-- {json} -->` comment.
/// Group 1 is image alt text, group 2 is link alt text.
static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:!\[(.*?)\]|\[(.*?)\])\((.*?)\)(?:<!--\s*(.*?)\s*-->)?")
        .expect("reference pattern is valid")
});

/// One parsed reference occurrence in a markdown document.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceMatch {
    /// Exact matched text, metadata comment included.
    pub original_text: String,
    pub alt_text: String,
    /// Raw path between the parentheses; neither decoded nor resolved.
    pub link_path: String,
    pub embed: bool,
    pub is_image: bool,
    pub metadata: Map<String, Value>,
    /// Byte range of `original_text` within the parsed content.
    pub span: Range<usize>,
}

/// Find every reference in `content`, in document order.
///
/// Never fails: a metadata comment that is not a JSON object is logged and
/// treated as empty metadata.
pub fn parse(content: &str) -> Vec<ReferenceMatch> {
    REFERENCE_RE
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let is_image = caps.get(1).is_some();
            let alt_text = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            let link_path = caps
                .get(3)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            let metadata = caps
                .get(4)
                .map(|m| parse_metadata(m.as_str(), &link_path))
                .unwrap_or_default();
            let embed = metadata
                .get("embed")
                .and_then(Value::as_bool)
                .unwrap_or(true);

            Some(ReferenceMatch {
                original_text: whole.as_str().to_string(),
                alt_text,
                link_path,
                embed,
                is_image,
                metadata,
                span: whole.range(),
            })
        })
        .collect()
}

fn parse_metadata(raw: &str, link_path: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            tracing::warn!(link = link_path, "Reference metadata is not a JSON object; ignoring");
            Map::new()
        }
        Err(e) => {
            tracing::warn!(link = link_path, error = %e, "Invalid reference metadata; ignoring");
            Map::new()
        }
    }
}
