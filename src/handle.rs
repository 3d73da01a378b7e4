use crate::api::{AgentStatus, Call, Method};
use std::fmt;
use std::sync::{Arc, RwLock};

/// The object the widget script attaches to the page once it has booted.
///
/// The script may attach a partially built object, so presence of each member
/// is reported individually. Reads return `None` when the member is missing.
pub trait RemoteHandle: Send + Sync {
    fn has_method(&self, method: Method) -> bool;

    fn available_methods(&self) -> Vec<Method> {
        Method::ALL
            .into_iter()
            .filter(|m| self.has_method(*m))
            .collect()
    }

    fn ready(&self) -> Option<bool>;

    /// Internal `_ready` flag.
    fn ready_flag(&self) -> Option<bool>;

    fn is_open(&self) -> Option<bool>;

    fn agent_status(&self) -> Option<AgentStatus>;

    fn invoke(&self, call: Call) -> anyhow::Result<()>;
}

impl fmt::Debug for dyn RemoteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteHandle")
            .field("available", &self.available_methods())
            .finish()
    }
}

/// Handle used where no page exists (server rendering, tests without a DOM).
/// Every member is present and every call is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct InertHandle;

impl RemoteHandle for InertHandle {
    fn has_method(&self, _method: Method) -> bool {
        true
    }

    fn ready(&self) -> Option<bool> {
        Some(false)
    }

    fn ready_flag(&self) -> Option<bool> {
        Some(false)
    }

    fn is_open(&self) -> Option<bool> {
        Some(false)
    }

    fn agent_status(&self) -> Option<AgentStatus> {
        Some(AgentStatus::Offline)
    }

    fn invoke(&self, call: Call) -> anyhow::Result<()> {
        tracing::trace!(method = %call.method(), "inert HEYO handle ignored call");
        Ok(())
    }
}

/// The page-wide `window.HEYO` slot. Written only by the widget script side;
/// the loader and proxy only read it.
#[derive(Default)]
pub struct HandleSlot {
    inner: RwLock<Option<Arc<dyn RemoteHandle>>>,
}

impl HandleSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<dyn RemoteHandle>> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn attach(&self, handle: Arc<dyn RemoteHandle>) {
        *self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
    }

    pub fn is_attached(&self) -> bool {
        self.current().is_some()
    }
}

impl fmt::Debug for HandleSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleSlot")
            .field("attached", &self.is_attached())
            .finish()
    }
}
