//! # consolidate-bear-markdown
//!
//! A CLI tool that turns a [Bear](https://bear.app) markdown export into a
//! self-contained markdown tree, inlining every attachment a note refers to.
//!
//! ## What it does
//!
//! Bear exports each note as `Note.md` with its attachments in a sibling
//! `Note/` directory. This tool walks the export, finds image and link
//! references in every note (`![alt](path)` / `[alt](path)`), resolves them to
//! attachment files, converts those files to markdown (documents via pandoc,
//! PDFs via pdftotext, CSV and Excel sheets as tables, images as data URIs or,
//! with an OpenAI key configured, as vision-model descriptions, text as code
//! blocks) and writes the note to the destination tree with each conversion
//! in a collapsible `<details>` block right after its reference. Media
//! extracted from documents is written next to the consolidated note.
//!
//! Source files are only read, never modified.
//!
//! ## Opting out per reference
//!
//! A reference followed by a JSON comment with `"embed": false` is left as a
//! plain link:
//!
//! ```markdown
//! [Big scan](scan.pdf)<!-- {"embed": false} -->
//! ```
//!
//! ## Incremental runs
//!
//! A note is regenerated only if its output is missing or older than the note
//! or any of its attachments. `--force` regenerates everything.
//!
//! ## Usage
//!
//! ```sh
//! consolidate-bear-markdown ~/Exports/Bear ~/notes/consolidated
//!
//! # Four worker threads, list every file
//! consolidate-bear-markdown ~/Exports/Bear ~/notes/consolidated -j 4 --verbose
//! ```
//!
//! Preferences can be persisted in `~/.config/consolidate-bear-markdown/config.toml`.

pub mod batch;
pub mod cloud;
pub mod converter;
pub mod markdown_file;
pub mod merger;
mod parallel;
pub mod reference;
pub mod resolver;
mod sequential;
pub mod staleness;
pub mod stats;
pub mod utils;
