//! Cloud-storage path remapping.
//!
//! Bear exports sometimes carry logical paths such as
//! `~/iCloud Drive/Docs/report.pdf` or `…/Google Drive/Shared/sheet.csv`
//! that do not exist on disk verbatim. Each [`RemapRule`] recognises one such
//! logical prefix and maps it onto the local mount point. Rules are tried in
//! order; a rule with no mount on this machine simply yields nothing.

use std::fs;
use std::path::{Path, PathBuf};

pub trait RemapRule: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Map a logical path to a local candidate, or `None` if the rule does
    /// not apply or its mount point is absent.
    fn remap(&self, path: &Path) -> Option<PathBuf>;
}

/// `…/iCloud Drive/<rest>` → `<home>/Library/Mobile Documents/com~apple~CloudDocs/<rest>`.
pub struct ICloudDrive {
    base: PathBuf,
}

impl ICloudDrive {
    const MARKER: &'static str = "iCloud Drive/";

    pub fn new(home: &Path) -> Self {
        Self {
            base: home.join("Library/Mobile Documents/com~apple~CloudDocs"),
        }
    }
}

impl RemapRule for ICloudDrive {
    fn name(&self) -> &str {
        "icloud"
    }

    fn remap(&self, path: &Path) -> Option<PathBuf> {
        let rest = after_marker(path, Self::MARKER)?;
        if !self.base.is_dir() {
            tracing::debug!(base = %self.base.display(), "iCloud Drive mount not found");
            return None;
        }
        Some(self.base.join(rest))
    }
}

/// `…/Google Drive/<rest>` → `<home>/Library/CloudStorage/GoogleDrive-<account>/My Drive/<rest>`.
///
/// With several accounts mounted, the first one (by name) that holds the
/// file wins; otherwise the first account is used.
pub struct GoogleDrive {
    cloud_storage: PathBuf,
}

impl GoogleDrive {
    const MARKER: &'static str = "Google Drive/";

    pub fn new(home: &Path) -> Self {
        Self {
            cloud_storage: home.join("Library/CloudStorage"),
        }
    }

    fn drive_roots(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.cloud_storage) else {
            return Vec::new();
        };
        let mut roots: Vec<PathBuf> = entries
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with("GoogleDrive-"))
            .map(|e| e.path().join("My Drive"))
            .filter(|p| p.is_dir())
            .collect();
        roots.sort();
        roots
    }
}

impl RemapRule for GoogleDrive {
    fn name(&self) -> &str {
        "google-drive"
    }

    fn remap(&self, path: &Path) -> Option<PathBuf> {
        let rest = after_marker(path, Self::MARKER)?;
        let roots = self.drive_roots();
        if roots.is_empty() {
            tracing::debug!(base = %self.cloud_storage.display(), "Google Drive mount not found");
            return None;
        }
        roots
            .iter()
            .map(|root| root.join(&rest))
            .find(|candidate| candidate.is_file())
            .or_else(|| roots.first().map(|root| root.join(&rest)))
    }
}

/// The part of `path` after the last occurrence of `marker`.
fn after_marker(path: &Path, marker: &str) -> Option<String> {
    let s = path.to_string_lossy();
    let idx = s.rfind(marker)?;
    let rest = &s[idx + marker.len()..];
    (!rest.is_empty()).then(|| rest.to_string())
}

/// The rules available for the current user, in priority order.
pub fn default_rules() -> Vec<Box<dyn RemapRule>> {
    match dirs::home_dir() {
        Some(home) => vec![
            Box::new(ICloudDrive::new(&home)),
            Box::new(GoogleDrive::new(&home)),
        ],
        None => {
            tracing::debug!("No home directory; cloud path remapping disabled");
            Vec::new()
        }
    }
}
