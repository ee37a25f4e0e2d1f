//! Pipeline configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Minimum browser versions used for vendor prefixing.
///
/// Versions are major version numbers; `None` leaves a browser out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BrowserTargets {
    pub chrome: Option<u32>,
    pub firefox: Option<u32>,
    pub safari: Option<u32>,
    pub ios_safari: Option<u32>,
    pub edge: Option<u32>,
}

impl Default for BrowserTargets {
    fn default() -> Self {
        Self {
            chrome: Some(90),
            firefox: Some(88),
            safari: Some(13),
            ios_safari: Some(13),
            edge: Some(90),
        }
    }
}

/// Configuration for every build task.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Template sources (`*.jinja`)
    pub templates_dir: PathBuf,

    /// JSON document whose keys become template variables
    pub data_file: PathBuf,

    /// SCSS sources
    pub styles_dir: PathBuf,

    /// Script sources
    pub scripts_dir: PathBuf,

    /// Image sources
    pub images_dir: PathBuf,

    /// Output root
    pub output_dir: PathBuf,

    /// Stylesheet output, relative to `output_dir`
    pub css_subdir: PathBuf,

    /// Script output, relative to `output_dir`
    pub js_subdir: PathBuf,

    /// Image output, relative to `output_dir`
    pub img_subdir: PathBuf,

    /// Minify CSS output
    pub minify: bool,

    /// Emit CSS source maps
    pub source_maps: bool,

    /// Browsers to prefix for
    pub browsers: BrowserTargets,

    /// JPEG re-encode quality (1-100)
    pub jpeg_quality: u8,

    /// Emit WebP siblings as part of full builds
    pub webp: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("src/templates"),
            data_file: PathBuf::from("src/data/data.json"),
            styles_dir: PathBuf::from("src/scss"),
            scripts_dir: PathBuf::from("src/js"),
            images_dir: PathBuf::from("src/img"),
            output_dir: PathBuf::from("dest"),
            css_subdir: PathBuf::from("css"),
            js_subdir: PathBuf::from("js"),
            img_subdir: PathBuf::from("img"),
            minify: true,
            source_maps: true,
            browsers: BrowserTargets::default(),
            jpeg_quality: 80,
            webp: true,
        }
    }
}

impl PipelineConfig {
    /// Stylesheet output directory.
    pub fn css_dir(&self) -> PathBuf {
        self.output_dir.join(&self.css_subdir)
    }

    /// Script output directory.
    pub fn js_dir(&self) -> PathBuf {
        self.output_dir.join(&self.js_subdir)
    }

    /// Image output directory.
    pub fn img_dir(&self) -> PathBuf {
        self.output_dir.join(&self.img_subdir)
    }

    /// Output subdirectories that a full clean leaves alone.
    pub fn preserved_dirs(&self) -> Vec<PathBuf> {
        vec![self.css_dir(), self.js_dir(), self.img_dir()]
    }

    /// Directory holding the data document.
    pub fn data_dir(&self) -> PathBuf {
        self.data_file
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default()
    }
}
