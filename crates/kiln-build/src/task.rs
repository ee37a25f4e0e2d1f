//! Named build tasks.

use std::fmt;
use std::str::FromStr;

use crate::pipeline::BuildError;

/// A named unit of work runnable on its own or in series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Remove generated output, keeping the css, js and img directories
    Clean,
    /// Remove generated HTML
    CleanHtml,
    /// Remove everything in the image output directory
    CleanImages,
    /// Render templates to HTML
    RenderTemplates,
    /// Compile SCSS to CSS with source maps
    CompileStyles,
    /// Copy scripts to the script output directory
    CopyScripts,
    /// Recompress images
    MinifyImages,
    /// Write WebP siblings of raster images
    WebpImages,
}

impl Task {
    /// Every task, in the order `--help` lists them.
    pub const ALL: [Task; 8] = [
        Task::Clean,
        Task::CleanHtml,
        Task::CleanImages,
        Task::RenderTemplates,
        Task::CompileStyles,
        Task::CopyScripts,
        Task::MinifyImages,
        Task::WebpImages,
    ];

    /// The name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Task::Clean => "clean",
            Task::CleanHtml => "clean-html",
            Task::CleanImages => "clean-images",
            Task::RenderTemplates => "render-templates",
            Task::CompileStyles => "compile-styles",
            Task::CopyScripts => "copy-scripts",
            Task::MinifyImages => "minify-images",
            Task::WebpImages => "webp-images",
        }
    }

    /// Tasks that produce output, in the order a full build runs them.
    pub fn producers(webp: bool) -> Vec<Task> {
        let mut tasks = vec![
            Task::RenderTemplates,
            Task::CompileStyles,
            Task::CopyScripts,
            Task::MinifyImages,
        ];
        if webp {
            tasks.push(Task::WebpImages);
        }
        tasks
    }

    /// A full one-shot build: clean, then every producer.
    pub fn build_sequence(webp: bool) -> Vec<Task> {
        let mut tasks = vec![Task::Clean];
        tasks.extend(Task::producers(webp));
        tasks
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Task {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Task::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| BuildError::UnknownTask(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_task_name() {
        for task in Task::ALL {
            assert_eq!(task.name().parse::<Task>().unwrap(), task);
        }
    }

    #[test]
    fn rejects_unknown_task() {
        let err = "bundle".parse::<Task>().unwrap_err();
        assert!(err.to_string().contains("bundle"));
    }

    #[test]
    fn build_starts_with_clean() {
        let tasks = Task::build_sequence(true);
        assert_eq!(tasks.first(), Some(&Task::Clean));
        assert_eq!(tasks.last(), Some(&Task::WebpImages));
        assert!(!Task::build_sequence(false).contains(&Task::WebpImages));
    }
}
