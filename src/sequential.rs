use crate::batch::{RunContext, process_file};
use crate::stats::ProcessingStatistics;
use crate::utils::FileOutcome;
use eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

/// Process notes one after another, in discovery order.
pub fn execute(ctx: &RunContext, files: Vec<PathBuf>) -> Result<ProcessingStatistics> {
    let config = &ctx.config;
    let pb = progress_bar(files.len() as u64, config.quiet);
    let mut stats = ProcessingStatistics::default();

    for path in &files {
        let outcome = process_file(ctx, path);
        if config.verbose {
            let relative = path.strip_prefix(&config.source_dir).unwrap_or(path);
            pb.println(outcome_line(relative, &outcome));
        }
        stats.record(path, outcome);
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(stats)
}

/// One `--verbose` line for a finished note.
pub(crate) fn outcome_line(relative: &Path, outcome: &FileOutcome) -> String {
    match outcome {
        FileOutcome::Written(s) if s.error > 0 => format!(
            "Written:   {} ({} attachment error(s))",
            relative.display(),
            s.error
        ),
        FileOutcome::Written(_) => format!("Written:   {}", relative.display()),
        FileOutcome::Unchanged => format!("Unchanged: {}", relative.display()),
        FileOutcome::Vanished => format!("Vanished:  {}", relative.display()),
        FileOutcome::Failed(e) => format!("Error:     {}: {:#}", relative.display(), e),
    }
}

pub(crate) fn progress_bar(total: u64, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    ) {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar.println(format!("Found {} markdown files.", total));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{ConverterRegistry, ErrorType};
    use crate::merger::FileStats;
    use crate::resolver::AttachmentResolver;
    use crate::utils::ConsolidateConfig;
    use std::fs;

    #[test]
    fn a_failing_note_does_not_stop_the_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a.md"), "fine").unwrap();
        fs::write(src.join("b.md"), [0xFF, 0xFE, 0x00]).unwrap();
        fs::write(src.join("c.md"), "also fine").unwrap();

        let ctx = RunContext {
            config: ConsolidateConfig::new(&src, tmp.path().join("dest")),
            resolver: AttachmentResolver::without_remapping(),
            converters: ConverterRegistry::new(Vec::new(), None),
        };
        let files = vec![src.join("a.md"), src.join("b.md"), src.join("c.md")];
        let stats = execute(&ctx, files).unwrap();

        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.files_errored, 1);
        assert!(stats.failures[0].path.ends_with("b.md"));
        assert_eq!(
            fs::read_to_string(tmp.path().join("dest/c.md")).unwrap(),
            "also fine"
        );
    }

    #[test]
    fn verbose_lines_mention_attachment_errors() {
        let relative = Path::new("trips/Paris.md");
        let mut stats = FileStats::default();
        assert_eq!(
            outcome_line(relative, &FileOutcome::Written(stats.clone())),
            "Written:   trips/Paris.md"
        );
        stats.error = 2;
        stats.error_types.insert(ErrorType::FileNotFound, 2);
        assert_eq!(
            outcome_line(relative, &FileOutcome::Written(stats)),
            "Written:   trips/Paris.md (2 attachment error(s))"
        );
        assert_eq!(
            outcome_line(relative, &FileOutcome::Unchanged),
            "Unchanged: trips/Paris.md"
        );
    }
}
