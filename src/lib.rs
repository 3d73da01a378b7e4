//! Loader and deferred-call proxy for the HEYO chat widget.
//!
//! The widget script is injected into the page at most once; [`HeyoProxy`]
//! accepts API calls right away and applies them once the widget has attached
//! itself to the page.

pub mod api;
pub mod config;
pub mod error;
pub mod handle;
pub mod loader;
pub mod page;
pub mod proxy;
pub mod snippet;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use api::{
    AgentStatus, Call, Dispatch, IdentifyMeta, Method, ShowOptions, SyncValue, WidgetSettings,
};
pub use config::{HeyoConfig, LogLevel};
pub use error::{DeferredError, InstallError, LoadError};
pub use handle::{HandleSlot, InertHandle, RemoteHandle};
pub use loader::{LoadPhase, Loader, PendingLoad};
pub use page::{HeadlessPage, PageEnvironment, ScriptElement, ScriptEvent};
pub use proxy::{Deferred, HeyoProxy, global, install};
