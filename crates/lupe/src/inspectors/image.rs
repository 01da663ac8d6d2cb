//! Raster image inspector.

use crate::Result;
use crate::error::LupeError;
use crate::plugins::traits::Inspector;
use crate::types::FileMetadata;
use image::ImageReader;
use std::path::Path;

const EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".bmp", ".gif", ".tiff", ".tif", ".webp"];

const MAX_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Inspector for raster images.
///
/// Reads dimensions and the container format from the image header without
/// decoding pixel data, so extraction stays cheap even for large files.
#[derive(Debug, Default)]
pub struct ImageInspector;

impl ImageInspector {
    pub fn new() -> Self {
        Self
    }
}

impl Inspector for ImageInspector {
    fn name(&self) -> &str {
        "image"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn domain(&self) -> &str {
        "Images"
    }

    fn extensions(&self) -> &[&str] {
        EXTENSIONS
    }

    fn description(&self) -> &str {
        "Raster image dimensions and format from header data"
    }

    fn author(&self) -> &str {
        "lupe developers"
    }

    fn max_file_size(&self) -> Option<u64> {
        Some(MAX_FILE_SIZE)
    }

    fn extract(&self, path: &Path) -> Result<FileMetadata> {
        let file_size = std::fs::metadata(path)?.len();
        let file_name = path.file_name().unwrap_or_default().to_string_lossy().into_owned();

        let reader = ImageReader::open(path)?
            .with_guessed_format()
            .map_err(|e| LupeError::inspector(self.name(), format!("failed to sniff image format: {e}")))?;
        let format = reader
            .format()
            .map(|f| format!("{f:?}").to_ascii_uppercase())
            .unwrap_or_else(|| "UNKNOWN".to_string());
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| LupeError::inspector(self.name(), format!("failed to read image header: {e}")))?;

        let megapixels = (width as f64 * height as f64) / 1_000_000.0;

        Ok(FileMetadata::new(
            file_name,
            file_size,
            format!("Image ({format})"),
            format!("{width}x{height} {format}"),
        )
        .with("width", width)
        .with("height", height)
        .with("format", format)
        .with("megapixels", (megapixels * 10.0).round() / 10.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    /// Minimal 1x1 RGBA PNG: signature, IHDR, IDAT, IEND.
    const TINY_PNG: &[u8] = &[
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52, 0x00, 0x00,
        0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4, 0x89, 0x00, 0x00, 0x00,
        0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x62, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d,
        0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];

    fn write_png(dir: &Path, name: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(TINY_PNG).unwrap();
        path
    }

    #[test]
    fn test_extract_png_dimensions() {
        let dir = tempdir().unwrap();
        let path = write_png(dir.path(), "pixel.png");

        let meta = ImageInspector::new().extract(&path).unwrap();
        assert_eq!(meta.extra["width"], 1);
        assert_eq!(meta.extra["height"], 1);
        assert_eq!(meta.extra["format"], "PNG");
        assert_eq!(meta.file_type, "Image (PNG)");
        assert_eq!(meta.summary, "1x1 PNG");
    }

    #[test]
    fn test_probe_follows_extension() {
        let dir = tempdir().unwrap();
        let inspector = ImageInspector::new();

        // The default probe is extension membership, so even a corrupt
        // .png resolves here and fails at extraction time instead.
        let fake = dir.path().join("fake.png");
        std::fs::write(&fake, b"definitely not a png").unwrap();
        assert!(inspector.probe(&fake));

        let disguised = write_png(dir.path(), "not_an_image.dat");
        assert!(!inspector.probe(&disguised));
    }

    #[test]
    fn test_extract_garbage_fails_with_inspector_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"not an image at all").unwrap();

        let err = ImageInspector::new().extract(&path).unwrap_err();
        assert!(matches!(err, LupeError::Inspector { .. }));
    }

    #[test]
    fn test_declared_capabilities() {
        let inspector = ImageInspector::new();
        assert_eq!(inspector.domain(), "Images");
        assert!(inspector.extensions().contains(&".webp"));
        assert_eq!(inspector.max_file_size(), Some(MAX_FILE_SIZE));
    }
}
