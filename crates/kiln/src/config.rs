//! Configuration file (kiln.toml).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kiln_build::{BrowserTargets, PipelineConfig};
use kiln_server::DevServerConfig;
use serde::Deserialize;

/// Configuration file structure. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub styles: StylesConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    pub templates: Option<PathBuf>,
    pub data: Option<PathBuf>,
    pub styles: Option<PathBuf>,
    pub scripts: Option<PathBuf>,
    pub images: Option<PathBuf>,
    pub output: Option<PathBuf>,
    /// Relative to `output`
    pub css: Option<PathBuf>,
    /// Relative to `output`
    pub js: Option<PathBuf>,
    /// Relative to `output`
    pub img: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StylesConfig {
    pub minify: Option<bool>,
    pub source_maps: Option<bool>,
    pub browsers: Option<BrowserTargets>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImagesConfig {
    pub jpeg_quality: Option<u8>,
    pub webp: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub open: Option<bool>,
}

/// Load configuration from `path` if it exists.
/// Returns an error if the file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!("No {} found, using defaults", path.display());
        return Ok(ConfigFile::default());
    }

    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

impl ConfigFile {
    /// Pipeline configuration with file values laid over the defaults.
    pub fn pipeline_config(&self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        let paths = &self.paths;
        let pick = |value: &Option<PathBuf>, default: PathBuf| value.clone().unwrap_or(default);

        PipelineConfig {
            templates_dir: pick(&paths.templates, defaults.templates_dir),
            data_file: pick(&paths.data, defaults.data_file),
            styles_dir: pick(&paths.styles, defaults.styles_dir),
            scripts_dir: pick(&paths.scripts, defaults.scripts_dir),
            images_dir: pick(&paths.images, defaults.images_dir),
            output_dir: pick(&paths.output, defaults.output_dir),
            css_subdir: pick(&paths.css, defaults.css_subdir),
            js_subdir: pick(&paths.js, defaults.js_subdir),
            img_subdir: pick(&paths.img, defaults.img_subdir),
            minify: self.styles.minify.unwrap_or(defaults.minify),
            source_maps: self.styles.source_maps.unwrap_or(defaults.source_maps),
            browsers: self.styles.browsers.unwrap_or(defaults.browsers),
            jpeg_quality: self.images.jpeg_quality.unwrap_or(defaults.jpeg_quality),
            webp: self.images.webp.unwrap_or(defaults.webp),
        }
    }

    /// Dev server configuration. `port` and `open` come from the command line
    /// and win over the file.
    pub fn server_config(&self, port: Option<u16>, open: Option<bool>) -> DevServerConfig {
        let defaults = DevServerConfig::default();

        DevServerConfig {
            root: self.pipeline_config().output_dir,
            port: port.or(self.server.port).unwrap_or(defaults.port),
            host: self.server.host.clone().unwrap_or(defaults.host),
            open: open.or(self.server.open).unwrap_or(defaults.open),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_uses_defaults() {
        let temp = tempdir().unwrap();
        let config = load_config(&temp.path().join("kiln.toml")).unwrap();

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.output_dir, PathBuf::from("dest"));
        assert_eq!(pipeline.jpeg_quality, 80);
    }

    #[test]
    fn file_values_override_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("kiln.toml");
        fs::write(
            &path,
            r#"
[paths]
output = "public"
css = "styles"

[styles]
minify = false

[styles.browsers]
safari = 15

[images]
webp = false

[server]
host = "0.0.0.0"
port = 8080
open = true
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        let pipeline = config.pipeline_config();

        assert_eq!(pipeline.css_dir(), PathBuf::from("public/styles"));
        assert!(!pipeline.minify);
        assert!(!pipeline.webp);
        assert_eq!(pipeline.browsers.safari, Some(15));
        assert_eq!(pipeline.browsers.chrome, BrowserTargets::default().chrome);

        let server = config.server_config(None, Some(false));
        assert_eq!(server.port, 8080);
        assert_eq!(server.host, "0.0.0.0");
        assert!(!server.open);

        let preview = config.server_config(Some(4000), None);
        assert_eq!(preview.port, 4000);
        assert!(preview.open);
        assert_eq!(server.root, PathBuf::from("public"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("kiln.toml");
        fs::write(&path, "[paths]\noutput = 3\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("kiln.toml");
        fs::write(&path, "[paths]\ntemplate = \"views\"\n").unwrap();

        assert!(load_config(&path).is_err());
    }
}
