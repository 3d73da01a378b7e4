//! Call-before-ready facade over the HEYO widget.
//!
//! [`HeyoProxy`] is usable as soon as it is constructed. Reads of `ready`,
//! `_ready`, `isOpen` and `getAgentStatus` are answered synchronously from
//! whatever handle is attached right now. Every other member returns at once
//! and is applied in the background once the loader has resolved and the
//! member exists on the handle.

use crate::api::{
    AgentStatus, Call, Callback, Dispatch, IdentifyMeta, Method, ShowOptions, StatusCallback,
    SyncValue, WidgetSettings,
};
use crate::config::HeyoConfig;
use crate::error::{DeferredError, InstallError};
use crate::loader::{HandleRef, LoadOutcome, Loader, PendingLoad};
use crate::page::{HeadlessPage, PageEnvironment};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{Instrument, debug, error, warn};
use uuid::Uuid;

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const MAX_ATTEMPTS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyTiming {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for ProxyTiming {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

/// Polling state for one deferred call.
#[derive(Debug)]
pub struct PendingMethodWait {
    pub call_id: Uuid,
    pub method: Method,
    pub attempts: u32,
    pub max_attempts: u32,
    pub started: Instant,
}

impl PendingMethodWait {
    pub fn new(method: Method, max_attempts: u32) -> Self {
        Self {
            call_id: Uuid::new_v4(),
            method,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            started: Instant::now(),
        }
    }

    /// Wait until `method` exists on `handle`, checking every `interval`.
    pub async fn until_available(
        &mut self,
        handle: &HandleRef,
        interval: Duration,
    ) -> Result<(), DeferredError> {
        loop {
            self.attempts += 1;
            if handle.has_method(self.method) {
                debug!(
                    attempts = self.attempts,
                    waited_ms = self.started.elapsed().as_millis() as u64,
                    "HEYO method available"
                );
                return Ok(());
            }
            if self.attempts >= self.max_attempts {
                let available = handle.available_methods();
                error!(
                    method = %self.method,
                    attempts = self.attempts,
                    waited_ms = self.started.elapsed().as_millis() as u64,
                    available = ?available.iter().map(|m| m.name()).collect::<Vec<_>>(),
                    "HEYO method never became available; dropping call"
                );
                return Err(DeferredError::MethodUnavailable {
                    method: self.method,
                    attempts: self.attempts,
                    available,
                });
            }
            sleep(interval).await;
        }
    }
}

/// Background settlement of one deferred call.
///
/// Dropping it does not cancel the call.
#[derive(Debug)]
pub struct Deferred {
    method: Method,
    state: DeferredState,
}

#[derive(Debug)]
enum DeferredState {
    Settled(Result<(), DeferredError>),
    Scheduled(JoinHandle<Result<(), DeferredError>>),
}

impl Deferred {
    pub fn method(&self) -> Method {
        self.method
    }

    /// `false` when the call was applied (or rejected) without scheduling.
    pub fn is_scheduled(&self) -> bool {
        matches!(self.state, DeferredState::Scheduled(_))
    }

    pub async fn settled(self) -> Result<(), DeferredError> {
        match self.state {
            DeferredState::Settled(result) => result,
            DeferredState::Scheduled(task) => match task.await {
                Ok(result) => result,
                Err(err) => Err(DeferredError::Invocation {
                    method: self.method,
                    reason: err.to_string(),
                }),
            },
        }
    }
}

pub struct HeyoProxy {
    loader: Arc<Loader>,
    timing: ProxyTiming,
}

impl HeyoProxy {
    pub fn new(page: Arc<dyn PageEnvironment>) -> Self {
        Self::with_loader(Arc::new(Loader::new(page)), ProxyTiming::default())
    }

    pub fn with_loader(loader: Arc<Loader>, timing: ProxyTiming) -> Self {
        Self { loader, timing }
    }

    pub fn loader(&self) -> &Arc<Loader> {
        &self.loader
    }

    /// Load the widget with `config`. The load starts during this call, so
    /// `init` only decides the config if nothing was issued before it.
    pub fn init(
        &self,
        config: &HeyoConfig,
    ) -> impl Future<Output = LoadOutcome> + Send + 'static {
        self.loader.start(config).wait()
    }

    /// Answer a synchronously readable member from the handle attached right
    /// now. `None` for members that are not read synchronously.
    pub fn read(&self, method: Method) -> Option<SyncValue> {
        if method.dispatch() != Dispatch::SyncRead {
            return None;
        }
        let handle = self.loader.current_handle();
        let handle = handle.as_deref();
        let value = match method {
            Method::Ready => SyncValue::Flag(handle.and_then(|h| h.ready()).unwrap_or(false)),
            Method::ReadyFlag => {
                SyncValue::Flag(handle.and_then(|h| h.ready_flag()).unwrap_or(false))
            }
            Method::IsOpen => SyncValue::Flag(handle.and_then(|h| h.is_open()).unwrap_or(false)),
            Method::GetAgentStatus => {
                SyncValue::Status(handle.and_then(|h| h.agent_status()).unwrap_or_default())
            }
            _ => return None,
        };
        Some(value)
    }

    pub fn ready(&self) -> bool {
        self.read_flag(Method::Ready)
    }

    /// The widget's internal `_ready` flag.
    pub fn ready_flag(&self) -> bool {
        self.read_flag(Method::ReadyFlag)
    }

    pub fn is_open(&self) -> bool {
        self.read_flag(Method::IsOpen)
    }

    pub fn get_agent_status(&self) -> AgentStatus {
        match self.read(Method::GetAgentStatus) {
            Some(SyncValue::Status(status)) => status,
            _ => AgentStatus::default(),
        }
    }

    fn read_flag(&self, method: Method) -> bool {
        matches!(self.read(method), Some(SyncValue::Flag(true)))
    }

    pub fn show(&self, options: ShowOptions) {
        self.defer(Call::Show(options));
    }

    pub fn hide(&self) {
        self.defer(Call::Hide);
    }

    pub fn open(&self, options: ShowOptions) {
        self.defer(Call::Open(options));
    }

    pub fn close(&self) {
        self.defer(Call::Close);
    }

    pub fn toggle(&self) {
        self.defer(Call::Toggle);
    }

    pub fn identify(&self, meta: IdentifyMeta) {
        self.defer(Call::Identify(meta));
    }

    pub fn configure(&self, settings: WidgetSettings) {
        self.defer(Call::Configure(settings));
    }

    /// The widget calls `callback` with the current status on registration
    /// and again on every change.
    pub fn on_agent_status_change(&self, callback: impl Fn(AgentStatus) + Send + Sync + 'static) {
        self.defer(Call::OnAgentStatusChange(StatusCallback::new(callback)));
    }

    pub fn on_ready(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.defer(Call::OnReady(Callback::new(callback)));
    }

    pub fn on_open(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.defer(Call::OnOpen(Callback::new(callback)));
    }

    pub fn on_close(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.defer(Call::OnClose(Callback::new(callback)));
    }

    pub fn logout(&self) {
        self.defer(Call::Logout);
    }

    pub fn add_tag(&self, tag: impl Into<String>) {
        self.defer(Call::AddTag(tag.into()));
    }

    pub fn remove_tag(&self, tag: impl Into<String>) {
        self.defer(Call::RemoveTag(tag.into()));
    }

    pub fn set_tags<I, S>(&self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.defer(Call::SetTags(tags.into_iter().map(Into::into).collect()));
    }

    pub fn set_field(&self, key: impl Into<String>, value: serde_json::Value) {
        self.defer(Call::SetField {
            key: key.into(),
            value,
        });
    }

    pub fn remove_field(&self, key: impl Into<String>) {
        self.defer(Call::RemoveField(key.into()));
    }

    fn defer(&self, call: Call) {
        let _ = self.dispatch(call);
    }

    /// Awaitable form of the deferred members.
    ///
    /// A call whose member is already present on the attached handle is
    /// applied before this returns, so back-to-back calls to a present member
    /// keep their order. Anything else is settled on a background task.
    pub fn dispatch(&self, call: Call) -> Deferred {
        let method = call.method();
        if let Some(handle) = self.loader.current_handle()
            && handle.has_method(method)
        {
            return Deferred {
                method,
                state: DeferredState::Settled(apply(&handle, call)),
            };
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!(%method, "HEYO call issued outside a tokio runtime; dropping call");
            return Deferred {
                method,
                state: DeferredState::Settled(Err(DeferredError::NoRuntime { method })),
            };
        };

        let pending = self.loader.start(&HeyoConfig::default());
        let wait = PendingMethodWait::new(method, self.timing.max_attempts);
        let span = tracing::info_span!("heyo_deferred", call_id = %wait.call_id, %method);
        let task = runtime.spawn(
            run_deferred(pending, self.timing.poll_interval, wait, call).instrument(span),
        );
        Deferred {
            method,
            state: DeferredState::Scheduled(task),
        }
    }
}

impl std::fmt::Debug for HeyoProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeyoProxy")
            .field("loader", &self.loader)
            .field("timing", &self.timing)
            .finish()
    }
}

async fn run_deferred(
    pending: PendingLoad,
    interval: Duration,
    mut wait: PendingMethodWait,
    call: Call,
) -> Result<(), DeferredError> {
    let handle = match pending.wait().await {
        Ok(handle) => handle,
        Err(err) => {
            warn!(%err, "HEYO failed to load; dropping call");
            return Err(err.into());
        }
    };
    wait.until_available(&handle, interval).await?;
    apply(&handle, call)
}

fn apply(handle: &HandleRef, call: Call) -> Result<(), DeferredError> {
    let method = call.method();
    handle.invoke(call).map_err(|err| {
        error!(%method, ?err, "HEYO call failed");
        DeferredError::Invocation {
            method,
            reason: err.to_string(),
        }
    })
}

static GLOBAL: OnceLock<HeyoProxy> = OnceLock::new();

/// Install the process-wide proxy for `page`. Fails if [`install`] or
/// [`global`] already ran.
pub fn install(page: Arc<dyn PageEnvironment>) -> Result<&'static HeyoProxy, InstallError> {
    let mut installed = false;
    let proxy = GLOBAL.get_or_init(|| {
        installed = true;
        HeyoProxy::new(page)
    });
    if installed { Ok(proxy) } else { Err(InstallError) }
}

/// The process-wide proxy. Without a prior [`install`] it is bound to a
/// headless page, so every call is inert.
pub fn global() -> &'static HeyoProxy {
    GLOBAL.get_or_init(|| HeyoProxy::new(Arc::new(HeadlessPage)))
}
