//! Development server with file watching and live reload for kiln.
//!
//! The [`Coordinator`] maps source changes to rebuild tasks and output changes
//! to reloads; the [`DevServer`] serves the output and relays reloads to
//! browsers over a WebSocket.

pub mod coordinator;
pub mod groups;
pub mod livereload;
pub mod server;
pub mod watcher;

pub use coordinator::{Coordinator, CoordinatorHandle, InFlight};
pub use groups::{GroupKind, WatchGroup, WatchGroups};
pub use livereload::{reload, BrowserNotifier, ReloadHub, ReloadMessage};
pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchEvent};
