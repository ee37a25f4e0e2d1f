//! Image recompression and WebP conversion.
//!
//! | Input | `minify-images` | `webp-images` |
//! |---|---|---|
//! | JPEG | re-encoded at the configured quality | lossless WebP sibling |
//! | PNG | re-encoded with best compression, adaptive filtering | lossless WebP sibling |
//! | GIF | copied | lossless WebP sibling (first frame) |
//! | anything else | copied | skipped |
//!
//! A re-encoded image is only kept when it is smaller than the source.

use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat};
use rayon::prelude::*;

use crate::fsutil::{collect_files, extension, read_file, write_file};
use crate::pipeline::BuildError;

/// Raster formats the optimizer knows how to decode.
const RASTER_FORMATS: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
];

fn raster_format(path: &Path) -> Option<ImageFormat> {
    let ext = extension(path);
    RASTER_FORMATS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, fmt)| *fmt)
}

/// Optimizes every file under the image source directory.
pub struct ImageOptimizer {
    images_dir: PathBuf,
    img_dir: PathBuf,
    jpeg_quality: u8,
}

impl ImageOptimizer {
    /// Create an optimizer writing into `img_dir`.
    pub fn new(images_dir: impl Into<PathBuf>, img_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
            img_dir: img_dir.into(),
            jpeg_quality: 80,
        }
    }

    /// Set the JPEG quality, clamped to 1-100.
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Recompress every image. Returns the number of files written.
    pub fn minify_all(&self) -> Result<usize, BuildError> {
        let files = collect_files(&self.images_dir, |_| true);

        files
            .par_iter()
            .map(|rel| self.minify_file(rel))
            .collect::<Result<Vec<()>, BuildError>>()?;

        Ok(files.len())
    }

    /// Write a WebP sibling for every raster image. Returns the number written.
    pub fn webp_all(&self) -> Result<usize, BuildError> {
        let files = collect_files(&self.images_dir, |rel| raster_format(rel).is_some());

        files
            .par_iter()
            .map(|rel| self.webp_file(rel))
            .collect::<Result<Vec<()>, BuildError>>()?;

        Ok(files.len())
    }

    fn minify_file(&self, rel: &Path) -> Result<(), BuildError> {
        let source = self.images_dir.join(rel);
        let original = read_file(&source)?;

        let recompressed = match raster_format(rel) {
            Some(ImageFormat::Jpeg) => {
                let img = decode(&original, ImageFormat::Jpeg, &source)?;
                Some(encode_jpeg(&img, self.jpeg_quality).map_err(|e| image_error(&source, e))?)
            }
            Some(ImageFormat::Png) => {
                let img = decode(&original, ImageFormat::Png, &source)?;
                Some(encode_png(&img).map_err(|e| image_error(&source, e))?)
            }
            _ => None,
        };

        let bytes = match recompressed {
            Some(smaller) if smaller.len() < original.len() => smaller,
            _ => original,
        };

        write_file(&self.img_dir.join(rel), bytes)
    }

    fn webp_file(&self, rel: &Path) -> Result<(), BuildError> {
        let source = self.images_dir.join(rel);
        let Some(format) = raster_format(rel) else {
            return Ok(());
        };

        let img = decode(&read_file(&source)?, format, &source)?;
        let webp = encode_webp(&img).map_err(|e| image_error(&source, e))?;

        write_file(&self.img_dir.join(rel.with_extension("webp")), webp)
    }
}

fn decode(bytes: &[u8], format: ImageFormat, path: &Path) -> Result<DynamicImage, BuildError> {
    image::load_from_memory_with_format(bytes, format).map_err(|e| image_error(path, e))
}

fn image_error(path: &Path, e: image::ImageError) -> BuildError {
    BuildError::ImageError {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
    Ok(buf)
}

fn encode_png(img: &DynamicImage) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
    img.write_with_encoder(encoder)?;
    Ok(buf)
}

fn encode_webp(img: &DynamicImage) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = WebPEncoder::new_lossless(&mut buf);
    DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::tempdir;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]))
    }

    fn fixture(root: &Path) -> ImageOptimizer {
        let src = root.join("img");
        fs::create_dir_all(src.join("icons")).unwrap();
        gradient(32, 32).save(src.join("photo.jpg")).unwrap();
        gradient(16, 16).save(src.join("icons/logo.png")).unwrap();
        fs::write(src.join("icons/mark.svg"), "<svg xmlns=\"http://www.w3.org/2000/svg\"/>").unwrap();

        ImageOptimizer::new(src, root.join("dest/img"))
    }

    #[test]
    fn minify_mirrors_tree() {
        let temp = tempdir().unwrap();
        let optimizer = fixture(temp.path());

        assert_eq!(optimizer.minify_all().unwrap(), 3);

        let out = temp.path().join("dest/img");
        assert!(out.join("photo.jpg").exists());
        assert!(out.join("icons/logo.png").exists());
        assert_eq!(
            fs::read_to_string(out.join("icons/mark.svg")).unwrap(),
            "<svg xmlns=\"http://www.w3.org/2000/svg\"/>"
        );
    }

    #[test]
    fn minified_images_never_grow() {
        let temp = tempdir().unwrap();
        let optimizer = fixture(temp.path());
        optimizer.minify_all().unwrap();

        for rel in ["photo.jpg", "icons/logo.png"] {
            let before = fs::metadata(temp.path().join("img").join(rel)).unwrap().len();
            let after = fs::metadata(temp.path().join("dest/img").join(rel)).unwrap().len();
            assert!(after <= before, "{} grew from {} to {}", rel, before, after);
        }
    }

    #[test]
    fn writes_webp_siblings() {
        let temp = tempdir().unwrap();
        let optimizer = fixture(temp.path());

        assert_eq!(optimizer.webp_all().unwrap(), 2);

        let webp = temp.path().join("dest/img/icons/logo.webp");
        let decoded = image::open(&webp).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
        assert!(!temp.path().join("dest/img/icons/mark.webp").exists());
    }

    #[test]
    fn corrupt_image_is_an_error() {
        let temp = tempdir().unwrap();
        let optimizer = fixture(temp.path());
        fs::write(temp.path().join("img/broken.png"), b"not a png").unwrap();

        let err = optimizer.minify_all().unwrap_err();
        assert!(matches!(err, BuildError::ImageError { .. }));
    }
}
