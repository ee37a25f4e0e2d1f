//! Build tasks for kiln.
//!
//! Each task turns one source file set into one output file set: templates into
//! HTML, SCSS into compressed CSS with source maps, scripts into copies, images
//! into recompressed images and WebP siblings. The [`Pipeline`] runs tasks by
//! name, individually or in series.

pub mod clean;
pub mod config;
mod fsutil;
pub mod images;
pub mod notify;
pub mod pipeline;
pub mod scripts;
pub mod styles;
pub mod task;
pub mod templates;

pub use config::{BrowserTargets, PipelineConfig};
pub use notify::{LogNotifier, Notifier};
pub use pipeline::{BuildError, BuildResult, Pipeline, TaskReport, TaskRunner};
pub use task::Task;
