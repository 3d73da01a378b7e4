use crate::handle::RemoteHandle;
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// A `<script>` element as inserted into the document head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptElement {
    pub src: Url,
    /// Always set: the widget must never block page parsing.
    pub async_load: bool,
}

impl ScriptElement {
    pub fn new(src: Url) -> Self {
        Self {
            src,
            async_load: true,
        }
    }
}

/// Which event the inserted element fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEvent {
    Load,
    Error(String),
}

/// The DOM-like host the widget is embedded in.
#[async_trait]
pub trait PageEnvironment: Send + Sync {
    /// `false` outside a browser-like environment (server rendering).
    fn has_document(&self) -> bool;

    fn hostname(&self) -> Option<String>;

    /// Current value of the page-wide widget slot.
    fn current_handle(&self) -> Option<Arc<dyn RemoteHandle>>;

    /// Insert the element and wait for its `load` or `error` event.
    async fn append_script(&self, script: ScriptElement) -> ScriptEvent;
}

/// Environment with no document at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessPage;

#[async_trait]
impl PageEnvironment for HeadlessPage {
    fn has_document(&self) -> bool {
        false
    }

    fn hostname(&self) -> Option<String> {
        None
    }

    fn current_handle(&self) -> Option<Arc<dyn RemoteHandle>> {
        None
    }

    async fn append_script(&self, script: ScriptElement) -> ScriptEvent {
        tracing::warn!(src = %script.src, "no document to insert HEYO script into");
        ScriptEvent::Error("no document".to_string())
    }
}

pub fn is_dev_host(hostname: Option<&str>) -> bool {
    hostname == Some("localhost")
}
