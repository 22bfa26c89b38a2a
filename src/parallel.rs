use crate::batch::{RunContext, process_file};
use crate::sequential::{outcome_line, progress_bar};
use crate::stats::ProcessingStatistics;
use crossbeam_channel::{SendTimeoutError, bounded};
use eyre::{Result, eyre};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Process notes on `config.jobs` worker threads.
///
/// Notes are independent; each one is still handled start to finish by a
/// single worker. Only the statistics accumulator is shared.
pub fn execute(ctx: &RunContext, files: Vec<PathBuf>) -> Result<ProcessingStatistics> {
    let config = &ctx.config;
    let pb = progress_bar(files.len() as u64, config.quiet);
    let stats = Mutex::new(ProcessingStatistics::default());
    let (tx, rx) = bounded::<PathBuf>(64);
    let n_workers = config.jobs.max(1);

    std::thread::scope(|s| {
        for _ in 0..n_workers {
            let rx = rx.clone();
            let (stats, pb) = (&stats, &pb);

            s.spawn(move || {
                while let Ok(path) = rx.recv() {
                    let outcome = process_file(ctx, &path);
                    if config.verbose {
                        let relative = path.strip_prefix(&config.source_dir).unwrap_or(&path);
                        pb.println(outcome_line(relative, &outcome));
                    }
                    match stats.lock() {
                        Ok(mut guard) => guard.record(&path, outcome),
                        Err(poisoned) => poisoned.into_inner().record(&path, outcome),
                    }
                    pb.inc(1);
                }
            });
        }

        drop(rx);

        'outer: for path in files {
            let mut pending = path;
            loop {
                match tx.send_timeout(pending, Duration::from_millis(50)) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Disconnected(_)) => break 'outer,
                    Err(SendTimeoutError::Timeout(p)) => pending = p,
                }
            }
        }

        drop(tx);
    });

    pb.finish_and_clear();
    stats
        .into_inner()
        .map_err(|_| eyre!("Statistics lock poisoned by a worker panic"))
}
