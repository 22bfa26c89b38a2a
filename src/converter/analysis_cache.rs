use eyre::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// On-disk store of image descriptions, one text file per image version.
///
/// Entries are keyed by the image's canonical path, modification time and
/// size, so an edited image is described again while an untouched one
/// reproduces the same text on every run.
pub struct AnalysisCache {
    dir: PathBuf,
}

impl AnalysisCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn key(image: &Path) -> Result<String> {
        let canonical = fs::canonicalize(image)
            .wrap_err_with(|| format!("Failed to resolve {}", image.display()))?;
        let meta = fs::metadata(&canonical)
            .wrap_err_with(|| format!("Failed to stat {}", canonical.display()))?;
        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string_lossy().as_bytes());
        hasher.update(modified.to_le_bytes());
        hasher.update(meta.len().to_le_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn entry(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", key))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.entry(key)).ok()
    }

    pub fn store(&self, key: &str, analysis: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .wrap_err_with(|| format!("Failed to create {}", self.dir.display()))?;
        let entry = self.entry(key);
        fs::write(&entry, analysis).wrap_err_with(|| format!("Failed to write {}", entry.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    #[test]
    fn stored_analysis_is_returned_for_the_same_image() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("cat.png");
        fs::write(&image, b"png").unwrap();
        let cache = AnalysisCache::new(tmp.path().join(".cbm/image_cache"));

        let key = AnalysisCache::key(&image).unwrap();
        assert_eq!(cache.get(&key), None);
        cache.store(&key, "A cat on a mat.").unwrap();
        assert_eq!(AnalysisCache::key(&image).unwrap(), key);
        assert_eq!(cache.get(&key).as_deref(), Some("A cat on a mat."));
    }

    #[test]
    fn touching_the_image_changes_the_key() {
        let tmp = tempfile::tempdir().unwrap();
        let image = tmp.path().join("cat.png");
        fs::write(&image, b"png").unwrap();
        let before = AnalysisCache::key(&image).unwrap();

        File::options()
            .write(true)
            .open(&image)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
        assert_ne!(AnalysisCache::key(&image).unwrap(), before);
    }

    #[test]
    fn missing_image_has_no_key() {
        assert!(AnalysisCache::key(Path::new("/definitely/not/here.png")).is_err());
    }
}
