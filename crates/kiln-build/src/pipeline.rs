//! Task pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::clean::{self, Cleaner};
use crate::config::PipelineConfig;
use crate::images::ImageOptimizer;
use crate::notify::{LogNotifier, Notifier};
use crate::scripts::copy_scripts;
use crate::styles::StyleCompiler;
use crate::task::Task;
use crate::templates::TemplateRenderer;

/// Report for a single finished task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    /// Task that ran
    pub task: Task,

    /// Files written or entries removed
    pub files: usize,

    /// Files that failed without failing the task
    pub failed: usize,

    /// Wall time in milliseconds
    pub duration_ms: u64,
}

/// Result of a full build.
#[derive(Debug)]
pub struct BuildResult {
    /// Reports in the order the tasks ran
    pub reports: Vec<TaskReport>,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

impl BuildResult {
    /// Files written by `task`, if it ran.
    pub fn files(&self, task: Task) -> Option<usize> {
        self.reports.iter().find(|r| r.task == task).map(|r| r.files)
    }
}

/// Errors that can occur while running tasks.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Failed to read {0}")]
    ReadError(String),

    #[error("Invalid data document {path}: {message}")]
    DataError { path: String, message: String },

    #[error("Failed to render template {path}: {message}")]
    TemplateError { path: String, message: String },

    #[error("Failed to process image {path}: {message}")]
    ImageError { path: String, message: String },

    #[error("Failed to write {0}")]
    WriteError(String),
}

/// Something that can run a task by name.
///
/// The watch coordinator depends on this rather than on [`Pipeline`] so the
/// rebuild graph can be exercised without touching the filesystem.
pub trait TaskRunner: Send + Sync {
    /// Run one task to completion.
    fn run_task(&self, task: Task) -> Result<TaskReport, BuildError>;

    /// Sink for failures that must not stop the process.
    fn notifier(&self) -> Arc<dyn Notifier>;
}

/// Runs build tasks against a [`PipelineConfig`].
pub struct Pipeline {
    config: PipelineConfig,
    notifier: Arc<dyn Notifier>,
}

impl Pipeline {
    /// Create a pipeline that reports to the log.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Replace the notification sink.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// The configuration this pipeline runs with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run a single task.
    pub fn run(&self, task: Task) -> Result<TaskReport, BuildError> {
        let start = Instant::now();
        tracing::info!("Starting '{}'", task);

        let (files, failed) = match task {
            Task::Clean => (self.cleaner().clean(), 0),
            Task::CleanHtml => (self.cleaner().clean_html(), 0),
            Task::CleanImages => (clean::clean_contents(&self.config.img_dir()), 0),
            Task::RenderTemplates => (self.renderer().render_all()?, 0),
            Task::CompileStyles => {
                let summary = self.style_compiler().compile_all(self.notifier.as_ref());
                (summary.written, summary.failed)
            }
            Task::CopyScripts => (copy_scripts(&self.config.scripts_dir, &self.config.js_dir())?, 0),
            Task::MinifyImages => (self.image_optimizer().minify_all()?, 0),
            Task::WebpImages => (self.image_optimizer().webp_all()?, 0),
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!("Finished '{}' ({} files) in {}ms", task, files, duration_ms);

        Ok(TaskReport {
            task,
            files,
            failed,
            duration_ms,
        })
    }

    /// Run tasks one after another, stopping at the first failure.
    pub fn run_series(&self, tasks: &[Task]) -> Result<Vec<TaskReport>, BuildError> {
        tasks.iter().map(|&task| self.run(task)).collect()
    }

    /// Clean the output and run every producing task.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let reports = self.run_series(&Task::build_sequence(self.config.webp))?;

        Ok(BuildResult {
            reports,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: self.config.output_dir.clone(),
        })
    }

    fn cleaner(&self) -> Cleaner {
        Cleaner::new(&self.config.output_dir, self.config.preserved_dirs())
    }

    fn renderer(&self) -> TemplateRenderer {
        TemplateRenderer::new(
            &self.config.templates_dir,
            &self.config.data_file,
            &self.config.output_dir,
        )
    }

    fn style_compiler(&self) -> StyleCompiler {
        StyleCompiler::new(&self.config.styles_dir, self.config.css_dir())
            .minify(self.config.minify)
            .source_maps(self.config.source_maps)
            .browsers(self.config.browsers)
    }

    fn image_optimizer(&self) -> ImageOptimizer {
        ImageOptimizer::new(&self.config.images_dir, self.config.img_dir())
            .jpeg_quality(self.config.jpeg_quality)
    }
}

impl TaskRunner for Pipeline {
    fn run_task(&self, task: Task) -> Result<TaskReport, BuildError> {
        self.run(task)
    }

    fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;
    use walkdir::WalkDir;

    fn scaffold(root: &Path) -> PipelineConfig {
        let src = root.join("src");
        for dir in ["templates", "data", "scss", "js", "img"] {
            fs::create_dir_all(src.join(dir)).unwrap();
        }
        fs::write(src.join("templates/_head.jinja"), "<title>{{ title }}</title>\n").unwrap();
        fs::write(
            src.join("templates/index.jinja"),
            "<html>{% include \"_head.jinja\" %}<body>{{ title }}</body></html>\n",
        )
        .unwrap();
        fs::write(src.join("data/data.json"), r#"{"title": "Home"}"#).unwrap();
        fs::write(src.join("scss/style.scss"), "$c: blue;\nbody { color: $c; }\n").unwrap();
        fs::write(src.join("js/app.js"), "console.log('hi');\n").unwrap();
        image::RgbImage::from_pixel(8, 8, image::Rgb([200, 10, 10]))
            .save(src.join("img/dot.png"))
            .unwrap();

        PipelineConfig {
            templates_dir: src.join("templates"),
            data_file: src.join("data/data.json"),
            styles_dir: src.join("scss"),
            scripts_dir: src.join("js"),
            images_dir: src.join("img"),
            output_dir: root.join("dest"),
            ..Default::default()
        }
    }

    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                (
                    e.path().strip_prefix(dir).unwrap().to_path_buf(),
                    fs::read(e.path()).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn builds_full_site() {
        let temp = tempdir().unwrap();
        let pipeline = Pipeline::new(scaffold(temp.path()));

        let result = pipeline.build().unwrap();

        assert_eq!(result.files(Task::RenderTemplates), Some(1));
        assert_eq!(result.files(Task::CompileStyles), Some(1));
        let out = temp.path().join("dest");
        assert!(out.join("index.html").exists());
        assert!(out.join("css/style.css").exists());
        assert!(out.join("css/maps/style.css.map").exists());
        assert!(out.join("js/app.js").exists());
        assert!(out.join("img/dot.png").exists());
        assert!(out.join("img/dot.webp").exists());
    }

    #[test]
    fn rebuild_from_scratch_reproduces_output() {
        let temp = tempdir().unwrap();
        let pipeline = Pipeline::new(scaffold(temp.path()));
        let out = temp.path().join("dest");

        pipeline.build().unwrap();
        let first = snapshot(&out);

        fs::remove_dir_all(&out).unwrap();
        pipeline.build().unwrap();

        assert_eq!(first, snapshot(&out));
    }

    #[test]
    fn style_errors_do_not_fail_the_task() {
        let temp = tempdir().unwrap();
        let config = scaffold(temp.path());
        fs::write(config.styles_dir.join("style.scss"), "body { color: $nope; }").unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = Pipeline::new(config).with_notifier(notifier.clone());

        let report = pipeline.run(Task::CompileStyles).unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(notifier.messages.lock().unwrap().len(), 1);
    }

    #[test]
    fn template_errors_fail_the_series() {
        let temp = tempdir().unwrap();
        let config = scaffold(temp.path());
        fs::write(config.templates_dir.join("index.jinja"), "{{ oops(").unwrap();

        let pipeline = Pipeline::new(config);
        let result = pipeline.run_series(&[Task::RenderTemplates, Task::CopyScripts]);

        assert!(matches!(result, Err(BuildError::TemplateError { .. })));
        assert!(!temp.path().join("dest/js/app.js").exists());
    }
}
