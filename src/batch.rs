use crate::converter::ConverterRegistry;
use crate::markdown_file::MarkdownFile;
use crate::merger::ReferenceMerger;
use crate::resolver::AttachmentResolver;
use crate::staleness::{self, Staleness};
use crate::stats::ProcessingStatistics;
use crate::utils::{ConsolidateConfig, FileOutcome, has_hidden_component};
use crate::{parallel, sequential};
use eyre::{Context, Result, eyre};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Everything a batch run needs, built once and passed down explicitly.
pub struct RunContext {
    pub config: ConsolidateConfig,
    pub resolver: AttachmentResolver,
    pub converters: ConverterRegistry,
}

impl RunContext {
    pub fn merger(&self) -> ReferenceMerger<'_> {
        ReferenceMerger::new(&self.resolver, &self.converters)
    }

    /// Mirror of `source` under the destination root.
    pub fn output_path(&self, source: &Path) -> Result<PathBuf> {
        let relative = source
            .strip_prefix(&self.config.source_dir)
            .wrap_err_with(|| format!("{} is outside the source directory", source.display()))?;
        Ok(self.config.dest_dir.join(relative))
    }
}

/// Run a full consolidation with the standard converters.
///
/// Converter scratch space (intermediate image renderings) lives in a
/// temporary directory owned by this call and removed when it returns.
/// Nothing the output links to is placed there.
pub fn run(config: ConsolidateConfig) -> Result<ProcessingStatistics> {
    let scratch = tempfile::Builder::new()
        .prefix("consolidate-bear-")
        .tempdir()
        .wrap_err("Failed to create scratch directory")?;
    let converters = ConverterRegistry::standard(&config, scratch.path());
    let ctx = RunContext {
        config,
        resolver: AttachmentResolver::default(),
        converters,
    };
    let result = run_with(&ctx);
    if let Err(e) = scratch.close() {
        tracing::warn!(error = %e, "Failed to remove scratch directory");
    }
    result
}

/// Run a consolidation with a caller-supplied context.
pub fn run_with(ctx: &RunContext) -> Result<ProcessingStatistics> {
    let source = &ctx.config.source_dir;
    if !source.is_dir() {
        return Err(eyre!("Source directory not found: {}", source.display()));
    }
    fs::create_dir_all(&ctx.config.dest_dir).wrap_err_with(|| {
        format!(
            "Failed to create destination directory: {}",
            ctx.config.dest_dir.display()
        )
    })?;
    if fs::canonicalize(source).ok() == fs::canonicalize(&ctx.config.dest_dir).ok() {
        return Err(eyre!(
            "Destination must differ from the source directory: {}",
            source.display()
        ));
    }

    let files = discover_markdown_files(source, &ctx.config.dest_dir)?;
    tracing::info!(count = files.len(), source = %source.display(), "Discovered markdown files");

    if ctx.config.jobs > 1 {
        parallel::execute(ctx, files)
    } else {
        sequential::execute(ctx, files)
    }
}

/// All `*.md` files under `root`, sorted, skipping dot-prefixed segments
/// and anything inside `exclude` (the destination, when nested in the source).
pub fn discover_markdown_files(root: &Path, exclude: &Path) -> Result<Vec<PathBuf>> {
    let exclude = fs::canonicalize(exclude).ok();
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if has_hidden_component(relative) {
                return false;
            }
            match (&exclude, entry.file_type().is_dir()) {
                (Some(excluded), true) => fs::canonicalize(entry.path())
                    .map(|p| &p != excluded)
                    .unwrap_or(true),
                _ => true,
            }
        });

    for entry in walker {
        let entry = entry.wrap_err_with(|| format!("Failed to walk {}", root.display()))?;
        let is_markdown = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
        if entry.file_type().is_file() && is_markdown {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Take one note through staleness, merge and write.
/// Never panics or propagates: every problem becomes a [`FileOutcome`].
pub fn process_file(ctx: &RunContext, path: &Path) -> FileOutcome {
    if !path.is_file() {
        tracing::warn!(path = %path.display(), "Markdown file vanished before processing");
        return FileOutcome::Vanished;
    }
    match process_file_inner(ctx, path) {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %format!("{:#}", e), "Failed to process markdown file");
            FileOutcome::Failed(e)
        }
    }
}

fn process_file_inner(ctx: &RunContext, path: &Path) -> Result<FileOutcome> {
    let file = MarkdownFile::open(path)?;
    let output = ctx.output_path(path)?;

    let staleness = staleness::assess(&file, &output, ctx.config.force);
    if staleness == Staleness::Unchanged {
        tracing::debug!(path = %path.display(), "No changes detected");
        return Ok(FileOutcome::Unchanged);
    }
    tracing::debug!(path = %path.display(), reason = ?staleness, "Regenerating");

    let merged = ctx.merger().merge_file(&file, &output)?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&output, &merged.content)
        .wrap_err_with(|| format!("Failed to write {}", output.display()))?;
    Ok(FileOutcome::Written(merged.stats))
}
