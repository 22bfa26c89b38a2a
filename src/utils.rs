use crate::merger::FileStats;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";

/// Settings for one consolidation run, already merged from the command
/// line, the config file and defaults.
#[derive(Clone, Debug)]
pub struct ConsolidateConfig {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub force: bool,
    pub verbose: bool,
    pub quiet: bool,
    /// Worker threads; 1 runs the sequential driver.
    pub jobs: usize,
    pub pandoc_path: Option<PathBuf>,
    pub pdftotext_path: Option<PathBuf>,
    /// Enables image descriptions through the vision model.
    pub openai_api_key: Option<String>,
    pub vision_model: String,
    /// Persistent state such as cached image analyses. Defaults to
    /// `<dest_dir>/.cbm`.
    pub cache_dir: Option<PathBuf>,
}

impl ConsolidateConfig {
    pub fn new(source_dir: impl Into<PathBuf>, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            dest_dir: dest_dir.into(),
            force: false,
            verbose: false,
            quiet: true,
            jobs: 1,
            pandoc_path: None,
            pdftotext_path: None,
            openai_api_key: None,
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            cache_dir: None,
        }
    }

    pub fn analysis_cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.dest_dir.join(".cbm"))
            .join("image_cache")
    }
}

/// Terminal state of a single note in a batch run.
#[derive(Debug)]
pub enum FileOutcome {
    /// Output is newer than the note and all its attachments.
    Unchanged,
    /// The note disappeared between discovery and processing.
    Vanished,
    Written(FileStats),
    Failed(eyre::Report),
}

pub fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// True if any component of `relative` starts with a dot.
pub fn has_hidden_component(relative: &Path) -> bool {
    relative
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name.to_string_lossy().starts_with('.')))
}

/// `1.5KB`, `2.3MB`; plain bytes below one kilobyte.
pub fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if b < KB * KB {
        format!("{:.1}KB", b / KB)
    } else {
        format!("{:.1}MB", b / (KB * KB))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("notes/a.md", false)]
    #[case(".hidden/a.md", true)]
    #[case("notes/.trash/a.md", true)]
    #[case("notes/.a.md", true)]
    fn detects_hidden_segments(#[case] path: &str, #[case] hidden: bool) {
        assert_eq!(has_hidden_component(Path::new(path)), hidden);
    }

    #[rstest]
    #[case(12, "12B")]
    #[case(1536, "1.5KB")]
    #[case(3 * 1024 * 1024, "3.0MB")]
    fn formats_sizes(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(human_size(bytes), expected);
    }

    #[test]
    fn analysis_cache_defaults_under_destination() {
        let mut config = ConsolidateConfig::new("/src", "/out");
        assert_eq!(config.analysis_cache_dir(), PathBuf::from("/out/.cbm/image_cache"));
        config.cache_dir = Some(PathBuf::from("/var/cbm"));
        assert_eq!(config.analysis_cache_dir(), PathBuf::from("/var/cbm/image_cache"));
    }
}
