use super::{ContentKind, ConversionResult, Converter, OutputTarget, file_name};
use crate::utils::human_size;
use eyre::{Context, Result};
use std::fs;
use std::path::Path;

/// Catch-all for files nothing else understands: emits a short metadata
/// block instead of content.
pub struct BinaryConverter;

impl Converter for BinaryConverter {
    fn name(&self) -> &str {
        "binary"
    }

    fn can_handle(&self, _path: &Path) -> bool {
        true
    }

    fn convert(&self, path: &Path, _: &OutputTarget) -> Result<ConversionResult> {
        let size = fs::metadata(path)
            .wrap_err_with(|| format!("Failed to stat {}", path.display()))?
            .len();
        let mime = infer::get_from_path(path)
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?
            .map(|t| t.mime_type())
            .unwrap_or("application/octet-stream");

        let content = format!(
            "## Binary File: {}\n\n\
             - **Type**: {}\n\
             - **Size**: {}\n\n\
             > This file is in binary format and cannot be displayed directly.\n\
             > Please access the original file to view its contents.\n",
            file_name(path),
            mime,
            human_size(size),
        );
        Ok(ConversionResult::converted(ContentKind::Binary, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::scratch_target;

    #[test]
    fn describes_a_zip_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bundle.zip");
        let mut bytes = vec![0x50, 0x4B, 0x03, 0x04];
        bytes.resize(2048, 0);
        fs::write(&path, &bytes).unwrap();

        let result = BinaryConverter.convert(&path, &scratch_target()).unwrap();
        let content = result.content.unwrap();
        assert!(content.contains("## Binary File: bundle.zip"));
        assert!(content.contains("application/zip"));
        assert!(content.contains("2.0KB"));
    }

    #[test]
    fn unknown_bytes_are_octet_stream() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("blob.dat");
        fs::write(&path, [0u8, 1, 2, 3]).unwrap();
        let content = BinaryConverter.convert(&path, &scratch_target()).unwrap().content.unwrap();
        assert!(content.contains("application/octet-stream"));
        assert!(content.contains("4B"));
    }
}
