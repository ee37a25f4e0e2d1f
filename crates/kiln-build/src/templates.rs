//! Template rendering with minijinja.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use minijinja::{context, path_loader, AutoEscape, Environment, Value};
use rayon::prelude::*;
use regex::Regex;

use crate::fsutil::{collect_files, extension, is_partial, read_file, write_file};
use crate::pipeline::BuildError;

/// Extension of template sources.
pub const TEMPLATE_EXTENSION: &str = "jinja";

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\r?\n").expect("valid blank line pattern"));

/// Renders every non-partial template under a directory to HTML.
///
/// A new [`Environment`] is built for every run, so edits to templates and
/// partials are always picked up.
pub struct TemplateRenderer {
    templates_dir: PathBuf,
    data_file: PathBuf,
    output_dir: PathBuf,
}

impl TemplateRenderer {
    /// Create a renderer.
    pub fn new(
        templates_dir: impl Into<PathBuf>,
        data_file: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            data_file: data_file.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Render all pages. Returns the number of pages written.
    pub fn render_all(&self) -> Result<usize, BuildError> {
        let data = self.load_data()?;
        let pages = self.discover_pages();
        let env = self.environment();

        let results: Vec<Result<(), BuildError>> = pages
            .par_iter()
            .map(|page| {
                let html = render_page(&env, &data, page)?;
                write_file(&self.output_dir.join(page.with_extension("html")), html)
            })
            .collect();

        for result in results {
            result?;
        }

        tracing::debug!(
            "Rendered {} pages from {}",
            pages.len(),
            self.templates_dir.display()
        );

        Ok(pages.len())
    }

    /// Load the data document. It must be a JSON object.
    pub fn load_data(&self) -> Result<Value, BuildError> {
        let bytes = read_file(&self.data_file)?;

        let data: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| BuildError::DataError {
                path: self.data_file.display().to_string(),
                message: e.to_string(),
            })?;

        if !data.is_object() {
            return Err(BuildError::DataError {
                path: self.data_file.display().to_string(),
                message: "top level must be a JSON object".to_string(),
            });
        }

        Ok(Value::from_serialize(&data))
    }

    /// Pages to render, relative to the templates directory.
    pub fn discover_pages(&self) -> Vec<PathBuf> {
        collect_files(&self.templates_dir, |rel| {
            extension(rel) == TEMPLATE_EXTENSION && !is_partial(rel)
        })
    }

    fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_loader(path_loader(&self.templates_dir));
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.set_keep_trailing_newline(true);
        env
    }
}

/// Render one page with the data document merged into its context.
fn render_page(env: &Environment<'_>, data: &Value, page: &Path) -> Result<String, BuildError> {
    let name = template_name(page);
    let output = page.with_extension("html");

    let rendered = env
        .get_template(&name)
        .and_then(|tmpl| {
            tmpl.render(context! {
                page => context! {
                    path => template_name(&output),
                    name => page.file_stem().and_then(|s| s.to_str()).unwrap_or_default(),
                },
                ..data.clone()
            })
        })
        .map_err(|e| BuildError::TemplateError {
            path: name.clone(),
            message: format!("{:#}", e),
        })?;

    Ok(strip_blank_lines(&rendered))
}

/// Loader name for a relative template path. Always uses `/`.
fn template_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Drop lines that are empty or contain only spaces and tabs.
pub fn strip_blank_lines(html: &str) -> String {
    BLANK_LINES.replace_all(html, "").into_owned()
}
