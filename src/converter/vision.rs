use super::{
    AnalysisCache, ContentKind, ConversionResult, Converter, ErrorType, OutputTarget, extension,
    file_name, has_extension,
};
use crate::utils::human_size;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use eyre::{Context, Result, eyre};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic", "heif", "svg"];
const PROMPT: &str = "Describe this image in detail.";

/// Something that can describe an image in prose.
pub trait VisionClient: Send + Sync {
    fn describe(&self, image: &[u8], mime: &str) -> Result<String>;
}

/// OpenAI chat-completions vision endpoint.
pub struct OpenAiVision {
    agent: ureq::Agent,
    api_key: String,
    model: String,
}

impl OpenAiVision {
    pub const ENDPOINT: &'static str = "https://api.openai.com/v1/chat/completions";

    pub fn new(api_key: String, model: String) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(120)))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            api_key,
            model,
        }
    }
}

impl VisionClient for OpenAiVision {
    fn describe(&self, image: &[u8], mime: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": PROMPT },
                    {
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:{};base64,{}", mime, STANDARD.encode(image)),
                            "detail": "high",
                        },
                    },
                ],
            }],
        });

        let mut response = self
            .agent
            .post(Self::ENDPOINT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send_json(&body)
            .wrap_err("Vision request failed")?;
        let reply: Value = response
            .body_mut()
            .read_json()
            .wrap_err("Invalid vision response")?;

        reply
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .ok_or_else(|| eyre!("No analysis generated"))
    }
}

/// External programs that render vector or HEIF images to PNG.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PngTool {
    RsvgConvert,
    Inkscape,
    Sips,
    HeifConvert,
}

impl PngTool {
    const ALL: [PngTool; 4] = [
        PngTool::RsvgConvert,
        PngTool::Inkscape,
        PngTool::Sips,
        PngTool::HeifConvert,
    ];

    fn program(self) -> &'static str {
        match self {
            PngTool::RsvgConvert => "rsvg-convert",
            PngTool::Inkscape => "inkscape",
            PngTool::Sips => "sips",
            PngTool::HeifConvert => "heif-convert",
        }
    }

    fn accepts(self, ext: &str) -> bool {
        match self {
            PngTool::RsvgConvert | PngTool::Inkscape => ext == "svg",
            PngTool::Sips => matches!(ext, "heic" | "heif" | "svg"),
            PngTool::HeifConvert => matches!(ext, "heic" | "heif"),
        }
    }

    fn command(self, program: &Path, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(program);
        match self {
            PngTool::RsvgConvert => cmd.arg("-f").arg("png").arg("-o").arg(output).arg(input),
            PngTool::Inkscape => cmd.arg(input).arg("--export-filename").arg(output),
            PngTool::Sips => cmd.args(["-s", "format", "png"]).arg(input).arg("--out").arg(output),
            PngTool::HeifConvert => cmd.arg(input).arg(output),
        };
        cmd
    }
}

fn needs_png(ext: &str) -> bool {
    matches!(ext, "heic" | "heif" | "svg")
}

/// Payload for the vision model, or the reason there is none.
enum Prepared {
    Image(Vec<u8>, &'static str),
    Failed(ConversionResult),
}

/// Images described by a vision model, with descriptions cached on disk.
///
/// SVG and HEIC/HEIF are rendered to PNG first. Without a renderer for
/// them this converter declines those files, leaving them to the next
/// image converter in the chain.
pub struct VisionConverter {
    client: Box<dyn VisionClient>,
    cache: AnalysisCache,
    scratch_dir: PathBuf,
    png_tools: Vec<(PngTool, PathBuf)>,
}

impl VisionConverter {
    pub fn new(client: Box<dyn VisionClient>, cache: AnalysisCache, scratch_dir: PathBuf) -> Self {
        let png_tools = PngTool::ALL
            .into_iter()
            .filter_map(|tool| which::which(tool.program()).ok().map(|p| (tool, p)))
            .collect();
        Self {
            client,
            cache,
            scratch_dir,
            png_tools,
        }
    }

    fn png_tool(&self, ext: &str) -> Option<&(PngTool, PathBuf)> {
        self.png_tools.iter().find(|(tool, _)| tool.accepts(ext))
    }

    /// Image bytes and MIME type to send, rendering to PNG when needed.
    fn prepare(&self, path: &Path, key: &str) -> Result<Prepared> {
        let ext = extension(path).unwrap_or_default();
        if !needs_png(&ext) {
            let bytes =
                fs::read(path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;
            let mime = infer::get(&bytes)
                .map(|t| t.mime_type())
                .unwrap_or("image/jpeg");
            return Ok(Prepared::Image(bytes, mime));
        }

        let Some((tool, program)) = self.png_tool(&ext) else {
            return Ok(Prepared::Failed(ConversionResult::failed(
                ContentKind::Image,
                ErrorType::ToolUnavailable,
                format!("No PNG renderer available for .{} files", ext),
            )));
        };
        fs::create_dir_all(&self.scratch_dir)
            .wrap_err_with(|| format!("Failed to create {}", self.scratch_dir.display()))?;
        let png = self.scratch_dir.join(format!("{}.png", key));
        let output = tool
            .command(program, path, &png)
            .output()
            .wrap_err_with(|| format!("Failed to run {}", program.display()))?;
        if !output.status.success() || !png.is_file() {
            return Ok(Prepared::Failed(ConversionResult::failed(
                ContentKind::Image,
                ErrorType::ConversionError,
                format!(
                    "Failed to convert .{} to PNG: {}",
                    ext,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            )));
        }
        let bytes = fs::read(&png).wrap_err_with(|| format!("Failed to read {}", png.display()))?;
        Ok(Prepared::Image(bytes, "image/png"))
    }
}

impl Converter for VisionConverter {
    fn name(&self) -> &str {
        "vision"
    }

    fn can_handle(&self, path: &Path) -> bool {
        if !has_extension(path, EXTENSIONS) {
            return false;
        }
        let ext = extension(path).unwrap_or_default();
        !needs_png(&ext) || self.png_tool(&ext).is_some()
    }

    fn convert(&self, path: &Path, _: &OutputTarget) -> Result<ConversionResult> {
        let key = AnalysisCache::key(path)?;
        let analysis = match self.cache.get(&key) {
            Some(cached) => {
                tracing::debug!(path = %path.display(), "Using cached image analysis");
                cached
            }
            None => {
                let (bytes, mime) = match self.prepare(path, &key)? {
                    Prepared::Image(bytes, mime) => (bytes, mime),
                    Prepared::Failed(result) => return Ok(result),
                };
                let analysis = match self.client.describe(&bytes, mime) {
                    Ok(analysis) => analysis,
                    Err(e) => {
                        return Ok(ConversionResult::failed(
                            ContentKind::Image,
                            ErrorType::ProcessingError,
                            format!("Error analyzing image: {:#}", e),
                        ));
                    }
                };
                if let Err(e) = self.cache.store(&key, &analysis) {
                    tracing::warn!(path = %path.display(), error = %format!("{:#}", e), "Failed to cache image analysis");
                }
                analysis
            }
        };

        let size = fs::metadata(path)
            .map(|m| human_size(m.len()))
            .unwrap_or_default();
        Ok(ConversionResult::converted(
            ContentKind::Image,
            format!(
                "## Image Analysis: {}\n\n**Details**: {}\n\n{}\n",
                file_name(path),
                size,
                analysis.trim()
            ),
        ))
    }
}
