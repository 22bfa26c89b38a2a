use crate::converter::{ConverterRegistry, ErrorType, OutputTarget, file_name};
use crate::markdown_file::MarkdownFile;
use crate::reference::{self, ReferenceMatch};
use crate::resolver::AttachmentResolver;
use eyre::Result;
use std::collections::BTreeMap;
use std::path::Path;
use url::Url;

pub const NOT_FOUND_NOTE: &str = "<!-- File not found -->";
pub const EXTERNAL_NOTE: &str = "<!-- Error: External URL skipped -->";

/// Attachment tallies for one note.
///
/// `total == success + error + skipped`; `external` is a subset of `skipped`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileStats {
    pub total: usize,
    pub success: usize,
    pub error: usize,
    pub skipped: usize,
    pub external: usize,
    pub error_types: BTreeMap<ErrorType, usize>,
}

impl FileStats {
    fn record_success(&mut self) {
        self.total += 1;
        self.success += 1;
    }

    fn record_error(&mut self, error_type: ErrorType) {
        self.total += 1;
        self.error += 1;
        *self.error_types.entry(error_type).or_default() += 1;
    }

    fn record_skipped(&mut self) {
        self.total += 1;
        self.skipped += 1;
    }

    fn record_external(&mut self) {
        self.record_skipped();
        self.external += 1;
    }
}

/// Rewritten note content plus its tallies.
#[derive(Debug)]
pub struct MergeOutcome {
    pub content: String,
    pub stats: FileStats,
}

/// Outcome for a single reference: text appended right after it, if any.
enum Splice {
    Keep,
    Append(String),
}

/// Expands references in a note with the converted content of their targets.
pub struct ReferenceMerger<'a> {
    resolver: &'a AttachmentResolver,
    converters: &'a ConverterRegistry,
}

impl<'a> ReferenceMerger<'a> {
    pub fn new(resolver: &'a AttachmentResolver, converters: &'a ConverterRegistry) -> Self {
        Self {
            resolver,
            converters,
        }
    }

    /// Merge `file`, which will be written to `output`.
    pub fn merge_file(&self, file: &MarkdownFile, output: &Path) -> Result<MergeOutcome> {
        let content = file.read_content()?;
        Ok(self.merge_content(file, &content, output))
    }

    /// Rewrite `content` (the text of `file`). Media extracted while
    /// converting is placed relative to `output`.
    ///
    /// The original reference text always stays in place; annotations and
    /// embedded blocks are inserted after it. Splices are applied by byte
    /// offset in one forward pass, so repeated identical references are each
    /// handled on their own.
    pub fn merge_content(&self, file: &MarkdownFile, content: &str, output: &Path) -> MergeOutcome {
        let references = reference::parse(content);
        let mut stats = FileStats::default();
        let mut out = String::with_capacity(content.len());
        let mut cursor = 0;

        if file.attachment_dir().is_none() && references.iter().any(|r| r.embed) {
            tracing::warn!(note = %file.path().display(), "Missing attachment directory");
        }

        for reference in &references {
            let splice = self.merge_reference(file, reference, output, &mut stats);
            out.push_str(&content[cursor..reference.span.end]);
            if let Splice::Append(text) = splice {
                out.push_str(&text);
            }
            cursor = reference.span.end;
        }
        out.push_str(&content[cursor..]);

        debug_assert_eq!(stats.total, references.len());
        MergeOutcome {
            content: out,
            stats,
        }
    }

    fn merge_reference(
        &self,
        file: &MarkdownFile,
        reference: &ReferenceMatch,
        output: &Path,
        stats: &mut FileStats,
    ) -> Splice {
        if !reference.embed {
            stats.record_skipped();
            return Splice::Keep;
        }

        if is_external_url(&reference.link_path) {
            tracing::debug!(link = %reference.link_path, "Skipping external URL");
            stats.record_external();
            return Splice::Append(format!("\n{}\n", EXTERNAL_NOTE));
        }

        let Some(path) = self.resolver.resolve(file, &reference.link_path) else {
            let error_type = if file.attachment_dir().is_none() {
                ErrorType::MissingAttachmentDir
            } else {
                ErrorType::FileNotFound
            };
            stats.record_error(error_type);
            return Splice::Append(format!("\n{}\n", NOT_FOUND_NOTE));
        };

        let result = self.converters.convert(&path, &OutputTarget::new(output, &path));
        if result.success {
            stats.record_success();
            let summary = summary_for(reference, &path);
            Splice::Append(embedded_block(&summary, result.content.as_deref().unwrap_or("")))
        } else {
            let error_type = result.error_type.unwrap_or(ErrorType::ConversionError);
            let message = result
                .error
                .unwrap_or_else(|| "Unknown conversion error".to_string());
            tracing::warn!(note = %file.path().display(), attachment = %path.display(), %error_type, "{}", message);
            stats.record_error(error_type);
            Splice::Append(error_note(&message))
        }
    }
}

/// Has both a scheme and a network location, e.g. `https://host/…`.
pub fn is_external_url(link: &str) -> bool {
    Url::parse(link.trim()).is_ok_and(|url| url.host_str().is_some_and(|host| !host.is_empty()))
}

fn summary_for(reference: &ReferenceMatch, path: &Path) -> String {
    if reference.alt_text.trim().is_empty() {
        file_name(path)
    } else {
        reference.alt_text.clone()
    }
}

fn embedded_block(summary: &str, content: &str) -> String {
    let summary = escape_html(summary);
    format!("\n<details>\n<summary>{summary}</summary>\n\n{content}\n\n</details>\n")
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// HTML comments cannot contain `--`.
fn error_note(message: &str) -> String {
    let mut message = message.replace("--", "- -");
    message = message.replace(['\r', '\n'], " ");
    format!("\n<!-- Error: {} -->\n", message.trim())
}
