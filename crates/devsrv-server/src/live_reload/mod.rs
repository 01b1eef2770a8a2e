//! Live reload: change detection, debounced rebuilds and client notification.

mod debouncer;
pub(crate) mod filter;
pub(crate) mod registry;
mod trigger;
mod watcher;
mod websocket;

pub use filter::{ChangeEvent, ChangeFilter, ChangeKind};
pub use registry::{ChannelId, ReloadChannel, ReloadRegistry, ReloadSignal};
pub use trigger::RebuildTrigger;
pub(crate) use watcher::SourceWatcher;
pub(crate) use websocket::ws_handler;
