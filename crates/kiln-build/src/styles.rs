//! Stylesheet pipeline: SCSS with grass, prefixing and minification with
//! lightningcss.

use std::path::{Path, PathBuf};

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;

use crate::config::BrowserTargets;
use crate::fsutil::{collect_files, extension, is_partial, write_file};
use crate::notify::Notifier;

/// Directory, relative to the CSS output, that holds source maps.
pub const MAPS_DIR: &str = "maps";

/// A compiled stylesheet.
#[derive(Debug, Clone)]
pub struct CompiledStyle {
    /// Final CSS, including the `sourceMappingURL` comment when a map exists
    pub css: String,
    /// Source map JSON
    pub map: Option<String>,
}

/// Outcome of compiling every stylesheet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StyleSummary {
    pub written: usize,
    pub failed: usize,
}

/// Compiles every non-partial `.scss` file under a directory.
pub struct StyleCompiler {
    styles_dir: PathBuf,
    css_dir: PathBuf,
    minify: bool,
    source_maps: bool,
    browsers: BrowserTargets,
}

impl StyleCompiler {
    /// Create a compiler writing into `css_dir`.
    pub fn new(styles_dir: impl Into<PathBuf>, css_dir: impl Into<PathBuf>) -> Self {
        Self {
            styles_dir: styles_dir.into(),
            css_dir: css_dir.into(),
            minify: true,
            source_maps: true,
            browsers: BrowserTargets::default(),
        }
    }

    /// Toggle minification.
    pub fn minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    /// Toggle source map output.
    pub fn source_maps(mut self, source_maps: bool) -> Self {
        self.source_maps = source_maps;
        self
    }

    /// Set the browsers to prefix for.
    pub fn browsers(mut self, browsers: BrowserTargets) -> Self {
        self.browsers = browsers;
        self
    }

    /// Compile every stylesheet.
    ///
    /// Compile and write failures go to `notifier` and are counted; they never
    /// abort the run.
    pub fn compile_all(&self, notifier: &dyn Notifier) -> StyleSummary {
        let mut summary = StyleSummary::default();

        for rel in self.discover() {
            let source = self.styles_dir.join(&rel);

            let result = self
                .compile_file(&source, &rel)
                .and_then(|compiled| self.write(&rel, compiled));

            match result {
                Ok(()) => summary.written += 1,
                Err(message) => {
                    summary.failed += 1;
                    notifier.notify("compile-styles", &format!("{}: {}", source.display(), message));
                }
            }
        }

        summary
    }

    /// Stylesheets to compile, relative to the styles directory.
    pub fn discover(&self) -> Vec<PathBuf> {
        collect_files(&self.styles_dir, |rel| {
            extension(rel) == "scss" && !is_partial(rel)
        })
    }

    /// Compile a single SCSS file. `rel` is its path relative to the styles
    /// directory and decides where the map points.
    pub fn compile_file(&self, source: &Path, rel: &Path) -> Result<CompiledStyle, String> {
        let options = grass::Options::default()
            .style(grass::OutputStyle::Expanded)
            .load_path(&self.styles_dir);

        let expanded = grass::from_path(source, &options).map_err(|e| e.to_string())?;

        self.process(&expanded, rel)
    }

    /// Prefix, optionally minify, and map compiled CSS.
    pub fn process(&self, css: &str, rel: &Path) -> Result<CompiledStyle, String> {
        let filename = slash_path(rel);

        let mut stylesheet = StyleSheet::parse(
            css,
            ParserOptions {
                filename: filename.clone(),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| format!("CSS parse error: {}", e))?;

        stylesheet
            .minify(MinifyOptions {
                targets: self.targets(),
                ..MinifyOptions::default()
            })
            .map_err(|e| format!("CSS minify error: {}", e))?;

        let mut source_map = SourceMap::new("/");
        if self.source_maps {
            source_map.add_source(&filename);
            source_map
                .set_source_content(0, css)
                .map_err(|e| format!("Source map error: {:?}", e))?;
        }

        let printed = stylesheet
            .to_css(PrinterOptions {
                minify: self.minify,
                source_map: self.source_maps.then_some(&mut source_map),
                targets: self.targets(),
                ..PrinterOptions::default()
            })
            .map_err(|e| format!("CSS print error: {}", e))?;

        if !self.source_maps {
            return Ok(CompiledStyle {
                css: printed.code,
                map: None,
            });
        }

        let map = source_map
            .to_json(None)
            .map_err(|e| format!("Source map error: {:?}", e))?;

        let mut css = printed.code;
        if !css.ends_with('\n') {
            css.push('\n');
        }
        css.push_str(&format!("/*# sourceMappingURL={} */\n", map_url(rel)));

        Ok(CompiledStyle {
            css,
            map: Some(map),
        })
    }

    fn write(&self, rel: &Path, compiled: CompiledStyle) -> Result<(), String> {
        let css_path = self.css_dir.join(rel.with_extension("css"));
        write_file(&css_path, compiled.css).map_err(|e| e.to_string())?;

        if let Some(map) = compiled.map {
            let map_path = self.css_dir.join(MAPS_DIR).join(map_file(rel));
            write_file(&map_path, map).map_err(|e| e.to_string())?;
        }

        Ok(())
    }

    fn targets(&self) -> Targets {
        let version = |major: Option<u32>| major.map(|m| m << 16);

        Targets::from(Browsers {
            chrome: version(self.browsers.chrome),
            firefox: version(self.browsers.firefox),
            safari: version(self.browsers.safari),
            ios_saf: version(self.browsers.ios_safari),
            edge: version(self.browsers.edge),
            ..Browsers::default()
        })
    }
}

/// `a/b.scss` -> `a/b.css.map`
fn map_file(rel: &Path) -> PathBuf {
    let mut name = rel.with_extension("css").into_os_string();
    name.push(".map");
    PathBuf::from(name)
}

/// URL of the map relative to the CSS file that references it.
fn map_url(rel: &Path) -> String {
    let depth = rel.components().count().saturating_sub(1);
    format!(
        "{}{}/{}",
        "../".repeat(depth),
        MAPS_DIR,
        slash_path(&map_file(rel))
    )
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
