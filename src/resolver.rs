use crate::cloud::{self, RemapRule};
use crate::markdown_file::MarkdownFile;
use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};

/// Maps raw reference paths onto files belonging to a note.
///
/// Lookups are confined to the note's own folder and its attachment
/// directory; references are never matched against sibling notes.
pub struct AttachmentResolver {
    remap_rules: Vec<Box<dyn RemapRule>>,
}

impl Default for AttachmentResolver {
    fn default() -> Self {
        Self::new(cloud::default_rules())
    }
}

impl AttachmentResolver {
    pub fn new(remap_rules: Vec<Box<dyn RemapRule>>) -> Self {
        Self { remap_rules }
    }

    /// A resolver that never remaps cloud paths.
    pub fn without_remapping() -> Self {
        Self::new(Vec::new())
    }

    /// Resolve `raw` (as written in the markdown) to a file on disk.
    ///
    /// Candidates, first hit wins:
    /// 1. cloud remapping of `<note dir>/<decoded>`
    /// 2. `<note dir>/<decoded>`, for plain relative paths only
    /// 3. `<note dir>/<file name>`
    /// 4. `<attachment dir>/<file name>`
    /// 5. any enumerated attachment whose file name matches, ignoring ASCII case
    ///
    /// A note without an attachment directory resolves nothing.
    pub fn resolve(&self, file: &MarkdownFile, raw: &str) -> Option<PathBuf> {
        let Some(attachment_dir) = file.attachment_dir() else {
            tracing::debug!(note = %file.path().display(), link = raw, "No attachment directory");
            return None;
        };

        let decoded = decode_segments(raw);
        if decoded.is_empty() {
            return None;
        }
        let relative = PathBuf::from(&decoded);
        let full = file.directory().join(&relative);

        for rule in &self.remap_rules {
            if let Some(candidate) = rule.remap(&full)
                && candidate.is_file()
            {
                tracing::debug!(rule = rule.name(), path = %candidate.display(), "Resolved via cloud remap");
                return Some(candidate);
            }
        }

        if stays_in_folder(&relative) && full.is_file() {
            return Some(full);
        }

        let name = relative.file_name()?;

        let flattened = file.directory().join(name);
        if flattened.is_file() {
            return Some(flattened);
        }

        let in_attachments = attachment_dir.join(name);
        if in_attachments.is_file() {
            return Some(in_attachments);
        }

        let wanted = name.to_string_lossy();
        let found = file
            .attachments()
            .iter()
            .find(|a| {
                a.file_name()
                    .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(&wanted))
            })
            .cloned();
        if found.is_none() {
            tracing::debug!(note = %file.path().display(), link = raw, "Attachment not found");
        }
        found
    }
}

/// Percent-decode each `/`-separated segment independently. An encoded
/// separator (`%2F`) inside a segment therefore still splits the path.
pub fn decode_segments(raw: &str) -> String {
    raw.split('/')
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Only plain relative paths are looked up under the note's folder; `..`
/// and absolute paths would reach outside it.
fn stays_in_folder(relative: &Path) -> bool {
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::{GoogleDrive, ICloudDrive, RemapRule};
    use rstest::rstest;
    use std::fs;

    /// `<root>/Note.md` with an attachment dir `<root>/Note/`.
    fn note_with_dir(root: &Path) -> PathBuf {
        let note = root.join("Note.md");
        fs::write(&note, "body").unwrap();
        fs::create_dir(root.join("Note")).unwrap();
        note
    }

    #[rstest]
    #[case("My%20Photo.jpg", "My Photo.jpg")]
    #[case("Note/My%20Photo.jpg", "Note/My Photo.jpg")]
    #[case("a%2Fb.png", "a/b.png")]
    #[case("plain.txt", "plain.txt")]
    #[case("caf%C3%A9.md", "café.md")]
    fn decodes_per_segment(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(decode_segments(raw), expected);
    }

    #[test]
    fn resolves_relative_subpath() {
        let tmp = tempfile::tempdir().unwrap();
        let note = note_with_dir(tmp.path());
        fs::write(tmp.path().join("Note/My Photo.jpg"), b"img").unwrap();
        let file = MarkdownFile::open(&note).unwrap();

        let resolved = AttachmentResolver::without_remapping()
            .resolve(&file, "Note/My%20Photo.jpg")
            .unwrap();
        assert_eq!(resolved, tmp.path().join("Note/My Photo.jpg"));
    }

    #[test]
    fn falls_back_to_basename_in_attachment_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let note = note_with_dir(tmp.path());
        fs::write(tmp.path().join("Note/photo.jpg"), b"img").unwrap();
        let file = MarkdownFile::open(&note).unwrap();

        // Neither `<dir>/elsewhere/photo.jpg` nor `<dir>/photo.jpg` exist.
        let resolved = AttachmentResolver::without_remapping()
            .resolve(&file, "elsewhere/photo.jpg")
            .unwrap();
        assert_eq!(resolved, tmp.path().join("Note/photo.jpg"));
    }

    #[test]
    fn prefers_note_folder_over_attachment_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let note = note_with_dir(tmp.path());
        fs::write(tmp.path().join("photo.jpg"), b"folder").unwrap();
        fs::write(tmp.path().join("Note/photo.jpg"), b"attachment").unwrap();
        let file = MarkdownFile::open(&note).unwrap();

        let resolved = AttachmentResolver::without_remapping()
            .resolve(&file, "other/photo.jpg")
            .unwrap();
        assert_eq!(resolved, tmp.path().join("photo.jpg"));
    }

    #[test]
    fn does_not_climb_into_sibling_notes() {
        let tmp = tempfile::tempdir().unwrap();
        let notes = tmp.path().join("notes");
        fs::create_dir(&notes).unwrap();
        let note = note_with_dir(&notes);
        fs::create_dir(tmp.path().join("Other")).unwrap();
        fs::write(tmp.path().join("Other/secret.pdf"), b"x").unwrap();
        let file = MarkdownFile::open(&note).unwrap();

        assert!(
            AttachmentResolver::without_remapping()
                .resolve(&file, "../Other/secret.pdf")
                .is_none()
        );
    }

    #[test]
    fn missing_attachment_dir_resolves_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let note = tmp.path().join("Bare.md");
        fs::write(&note, "x").unwrap();
        fs::write(tmp.path().join("photo.jpg"), b"img").unwrap();
        let file = MarkdownFile::open(&note).unwrap();

        assert!(
            AttachmentResolver::without_remapping()
                .resolve(&file, "photo.jpg")
                .is_none()
        );
    }

    #[test]
    fn unknown_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let note = note_with_dir(tmp.path());
        let file = MarkdownFile::open(&note).unwrap();
        assert!(
            AttachmentResolver::without_remapping()
                .resolve(&file, "gone.png")
                .is_none()
        );
    }

    #[test]
    fn cloud_remap_wins_when_target_exists() {
        let tmp = tempfile::tempdir().unwrap();
        let note = note_with_dir(tmp.path());
        let home = tmp.path().join("home");
        let docs = home.join("Library/Mobile Documents/com~apple~CloudDocs/Docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("plan.pdf"), b"pdf").unwrap();
        let file = MarkdownFile::open(&note).unwrap();

        let resolver = AttachmentResolver::new(vec![Box::new(ICloudDrive::new(&home))]);
        let resolved = resolver
            .resolve(&file, "iCloud%20Drive/Docs/plan.pdf")
            .unwrap();
        assert_eq!(resolved, docs.join("plan.pdf"));
    }

    #[test]
    fn absolute_paths_outside_the_note_are_not_followed() {
        let tmp = tempfile::tempdir().unwrap();
        let notes = tmp.path().join("notes");
        fs::create_dir(&notes).unwrap();
        let note = note_with_dir(&notes);
        let outside = tmp.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("secret.txt"), b"x").unwrap();
        let file = MarkdownFile::open(&note).unwrap();

        let link = outside.join("secret.txt");
        assert!(
            AttachmentResolver::without_remapping()
                .resolve(&file, &link.to_string_lossy())
                .is_none()
        );
    }

    #[test]
    fn absolute_path_still_matches_by_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        let note = note_with_dir(tmp.path());
        fs::write(tmp.path().join("Note/scan.pdf"), b"pdf").unwrap();
        let file = MarkdownFile::open(&note).unwrap();

        let resolved = AttachmentResolver::without_remapping()
            .resolve(&file, "/Users/me/Desktop/scan.pdf")
            .unwrap();
        assert_eq!(resolved, tmp.path().join("Note/scan.pdf"));
    }

    #[test]
    fn attachment_scan_ignores_case() {
        let tmp = tempfile::tempdir().unwrap();
        let note = note_with_dir(tmp.path());
        fs::write(tmp.path().join("Note/photo.jpg"), b"img").unwrap();
        let file = MarkdownFile::open(&note).unwrap();

        let resolved = AttachmentResolver::without_remapping()
            .resolve(&file, "elsewhere/Photo.JPG")
            .unwrap();
        assert_eq!(resolved.parent(), Some(tmp.path().join("Note").as_path()));
        assert_eq!(fs::read(&resolved).unwrap(), b"img");
    }

    /// Maps every path onto a fixed candidate.
    struct Fixed(PathBuf);

    impl RemapRule for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn remap(&self, _: &Path) -> Option<PathBuf> {
            Some(self.0.clone())
        }
    }

    #[test]
    fn remap_to_a_non_file_falls_through_to_the_note_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let note = note_with_dir(tmp.path());
        fs::write(tmp.path().join("Note/photo.jpg"), b"img").unwrap();
        let file = MarkdownFile::open(&note).unwrap();

        let resolver = AttachmentResolver::new(vec![Box::new(Fixed(tmp.path().join("Note")))]);
        let resolved = resolver.resolve(&file, "Note/photo.jpg").unwrap();
        assert_eq!(resolved, tmp.path().join("Note/photo.jpg"));
    }

    #[test]
    fn google_drive_without_account_falls_through() {
        let tmp = tempfile::tempdir().unwrap();
        let note = note_with_dir(tmp.path());
        fs::write(tmp.path().join("Note/sheet.csv"), b"a,b").unwrap();
        let home = tmp.path().join("home");
        fs::create_dir_all(home.join("Library/CloudStorage")).unwrap();
        let file = MarkdownFile::open(&note).unwrap();

        let rule = GoogleDrive::new(&home);
        assert!(rule.remap(Path::new("/Volumes/Google Drive/Shared/sheet.csv")).is_none());
        let resolver = AttachmentResolver::new(vec![Box::new(rule)]);
        let resolved = resolver
            .resolve(&file, "Google%20Drive/Shared/sheet.csv")
            .unwrap();
        assert_eq!(resolved, tmp.path().join("Note/sheet.csv"));
    }
}
