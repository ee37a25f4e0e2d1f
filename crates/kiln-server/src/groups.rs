//! The rebuild graph: which source changes run which tasks, and which output
//! changes reload the browser.

use std::fmt;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use kiln_build::{PipelineConfig, Task};

use crate::server::ServerError;

/// The five watched source groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKind {
    Templates,
    Data,
    Styles,
    Scripts,
    Images,
}

impl GroupKind {
    pub fn name(self) -> &'static str {
        match self {
            GroupKind::Templates => "templates",
            GroupKind::Data => "data",
            GroupKind::Styles => "styles",
            GroupKind::Scripts => "scripts",
            GroupKind::Images => "images",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Source patterns, the task sequence they trigger, and the output patterns
/// whose changes reload the browser.
#[derive(Clone)]
pub struct WatchGroup {
    kind: GroupKind,
    sources: GlobSet,
    outputs: GlobSet,
    tasks: Vec<Task>,
}

impl fmt::Debug for WatchGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchGroup")
            .field("kind", &self.kind)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl WatchGroup {
    /// Build a group from glob patterns relative to the project root.
    pub fn new(
        kind: GroupKind,
        sources: &[String],
        outputs: &[String],
        tasks: Vec<Task>,
    ) -> Result<Self, ServerError> {
        Ok(Self {
            kind,
            sources: build_globset(sources)?,
            outputs: build_globset(outputs)?,
            tasks,
        })
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    /// Tasks run, in order, when a source changes.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn matches_source(&self, rel_path: &str) -> bool {
        self.sources.is_match(rel_path)
    }

    pub fn matches_output(&self, rel_path: &str) -> bool {
        self.outputs.is_match(rel_path)
    }
}

/// Every watch group of a project.
#[derive(Debug, Clone)]
pub struct WatchGroups {
    groups: Vec<WatchGroup>,
}

impl WatchGroups {
    pub fn new(groups: Vec<WatchGroup>) -> Self {
        Self { groups }
    }

    /// The standard groups for a pipeline configuration.
    ///
    /// Templates and data regenerate all HTML, so their output is cleaned
    /// first; images likewise. Styles and scripts rebuild in place.
    pub fn from_config(config: &PipelineConfig, root: &Path) -> Result<Self, ServerError> {
        let base = |path: &Path| pattern_base(root, path);

        let templates = base(&config.templates_dir);
        let styles = base(&config.styles_dir);
        let scripts = base(&config.scripts_dir);
        let images = base(&config.images_dir);
        let output = base(&config.output_dir);
        let css = base(&config.css_dir());
        let js = base(&config.js_dir());
        let img = base(&config.img_dir());

        let data_dir = config.data_dir();
        let data_sources = if data_dir.as_os_str().is_empty() {
            vec![base(&config.data_file)]
        } else {
            vec![format!("{}/**/*.json", base(&data_dir))]
        };

        let html_outputs = vec![format!("{}/**/*.html", output)];

        let mut image_tasks = vec![Task::CleanImages, Task::MinifyImages];
        if config.webp {
            image_tasks.push(Task::WebpImages);
        }

        Ok(Self::new(vec![
            WatchGroup::new(
                GroupKind::Templates,
                &[format!("{}/**/*.{}", templates, kiln_build::templates::TEMPLATE_EXTENSION)],
                &html_outputs,
                vec![Task::CleanHtml, Task::RenderTemplates],
            )?,
            WatchGroup::new(
                GroupKind::Data,
                &data_sources,
                &html_outputs,
                vec![Task::CleanHtml, Task::RenderTemplates],
            )?,
            WatchGroup::new(
                GroupKind::Styles,
                &[format!("{}/**/*.scss", styles)],
                &[format!("{}/**/*.css", css)],
                vec![Task::CompileStyles],
            )?,
            WatchGroup::new(
                GroupKind::Scripts,
                &[format!("{}/**/*.{{js,mjs}}", scripts)],
                &[format!("{}/**/*.{{js,mjs}}", js)],
                vec![Task::CopyScripts],
            )?,
            WatchGroup::new(
                GroupKind::Images,
                &[format!("{}/**/*", images)],
                &[format!("{}/**/*", img)],
                image_tasks,
            )?,
        ]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchGroup> {
        self.groups.iter()
    }

    pub fn get(&self, kind: GroupKind) -> Option<&WatchGroup> {
        self.groups.iter().find(|g| g.kind == kind)
    }

    /// Groups whose sources include `rel_path`.
    pub fn route(&self, rel_path: &str) -> Vec<GroupKind> {
        self.groups
            .iter()
            .filter(|g| g.matches_source(rel_path))
            .map(|g| g.kind)
            .collect()
    }

    /// True if a change at `rel_path` should refresh the browser.
    pub fn triggers_reload(&self, rel_path: &str) -> bool {
        self.groups.iter().any(|g| g.matches_output(rel_path))
    }
}

/// Directories to watch for source changes.
pub fn source_dirs(config: &PipelineConfig) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = vec![
        config.templates_dir.clone(),
        config.data_dir(),
        config.styles_dir.clone(),
        config.scripts_dir.clone(),
        config.images_dir.clone(),
    ];
    dirs.retain(|d| !d.as_os_str().is_empty());
    dirs.sort();
    dirs.dedup();
    dirs
}

/// Directories watched without descending. A data document at the project
/// root needs the root itself, but not the whole tree beneath it.
pub fn shallow_source_dirs(config: &PipelineConfig) -> Vec<PathBuf> {
    if config.data_dir().as_os_str().is_empty() {
        vec![PathBuf::from(".")]
    } else {
        Vec::new()
    }
}

/// Path relative to `root` as a `/`-separated string, for glob matching.
///
/// Paths outside `root` are kept whole.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Escaped glob prefix for a configured path.
fn pattern_base(root: &Path, path: &Path) -> String {
    let rel = relative_path(root, path);
    let rel = rel.trim_start_matches("./").trim_end_matches('/');
    globset::escape(rel)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, ServerError> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)
            .map_err(|e| ServerError::PatternError(format!("{}: {}", pat, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ServerError::PatternError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> WatchGroups {
        WatchGroups::from_config(&PipelineConfig::default(), Path::new("/site")).unwrap()
    }

    #[test]
    fn style_change_runs_only_style_compile() {
        let groups = groups();

        let routed = groups.route("src/scss/components/_button.scss");
        assert_eq!(routed, vec![GroupKind::Styles]);

        let tasks = groups.get(GroupKind::Styles).unwrap().tasks();
        assert_eq!(tasks, &[Task::CompileStyles]);
        assert!(!tasks.contains(&Task::Clean));
    }

    #[test]
    fn routes_each_source_group() {
        let groups = groups();

        assert_eq!(groups.route("src/templates/index.jinja"), vec![GroupKind::Templates]);
        assert_eq!(groups.route("src/data/data.json"), vec![GroupKind::Data]);
        assert_eq!(groups.route("src/js/app.js"), vec![GroupKind::Scripts]);
        assert_eq!(groups.route("src/img/photos/a.jpg"), vec![GroupKind::Images]);
        assert!(groups.route("README.md").is_empty());
        assert!(groups.route("src/templates/notes.txt").is_empty());
    }

    #[test]
    fn regenerating_groups_clean_first() {
        let groups = groups();

        assert_eq!(
            groups.get(GroupKind::Templates).unwrap().tasks(),
            &[Task::CleanHtml, Task::RenderTemplates]
        );
        assert_eq!(
            groups.get(GroupKind::Images).unwrap().tasks(),
            &[Task::CleanImages, Task::MinifyImages, Task::WebpImages]
        );
    }

    #[test]
    fn output_changes_trigger_reload() {
        let groups = groups();

        assert!(groups.triggers_reload("dest/index.html"));
        assert!(groups.triggers_reload("dest/blog/post.html"));
        assert!(groups.triggers_reload("dest/css/style.css"));
        assert!(groups.triggers_reload("dest/img/a.webp"));
        assert!(!groups.triggers_reload("dest/css/maps/style.css.map"));
        assert!(!groups.triggers_reload("src/scss/style.scss"));
    }

    #[test]
    fn absolute_paths_are_made_relative() {
        let config = PipelineConfig {
            styles_dir: PathBuf::from("/site/assets/scss"),
            ..Default::default()
        };
        let groups = WatchGroups::from_config(&config, Path::new("/site")).unwrap();

        assert_eq!(groups.route("assets/scss/main.scss"), vec![GroupKind::Styles]);
        assert_eq!(
            relative_path(Path::new("/site"), Path::new("/site/assets/scss/main.scss")),
            "assets/scss/main.scss"
        );
    }

    #[test]
    fn source_dirs_are_deduplicated() {
        let config = PipelineConfig {
            data_file: PathBuf::from("src/templates/data.json"),
            ..Default::default()
        };

        let dirs = source_dirs(&config);

        assert_eq!(dirs.len(), 4);
        assert!(shallow_source_dirs(&config).is_empty());
    }

    #[test]
    fn root_data_file_watches_root() {
        let config = PipelineConfig {
            data_file: PathBuf::from("data.json"),
            ..Default::default()
        };
        let groups = WatchGroups::from_config(&config, Path::new("/site")).unwrap();

        assert_eq!(groups.route("data.json"), vec![GroupKind::Data]);
        assert_eq!(shallow_source_dirs(&config), vec![PathBuf::from(".")]);
        assert!(!source_dirs(&config).contains(&PathBuf::new()));
    }
}
