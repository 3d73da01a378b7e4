use crate::config::HeyoConfig;
use crate::error::LoadError;
use crate::handle::{InertHandle, RemoteHandle};
use crate::page::{PageEnvironment, ScriptElement, ScriptEvent, is_dev_host};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub type HandleRef = Arc<dyn RemoteHandle>;
pub type LoadOutcome = Result<HandleRef, LoadError>;

pub const SETTLE_INTERVAL: Duration = Duration::from_millis(25);
pub const SETTLE_TIMEOUT: Duration = Duration::from_millis(500);

/// Grace period after the script's `load` event during which the widget may
/// still attach itself to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleTiming {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for SettleTiming {
    fn default() -> Self {
        Self {
            interval: SETTLE_INTERVAL,
            timeout: SETTLE_TIMEOUT,
        }
    }
}

enum LoadState {
    Unstarted,
    Loading(watch::Receiver<Option<LoadOutcome>>),
    Loaded(HandleRef),
    Failed(LoadError),
}

/// Public view of the loader state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPhase {
    Unstarted,
    Loading,
    Loaded,
    Failed(LoadError),
}

/// Outcome of a load started by [`Loader::start`].
pub struct PendingLoad {
    inner: PendingInner,
}

enum PendingInner {
    Settled(LoadOutcome),
    Waiting(watch::Receiver<Option<LoadOutcome>>),
}

impl PendingLoad {
    fn settled(outcome: LoadOutcome) -> Self {
        Self {
            inner: PendingInner::Settled(outcome),
        }
    }

    fn waiting(rx: watch::Receiver<Option<LoadOutcome>>) -> Self {
        Self {
            inner: PendingInner::Waiting(rx),
        }
    }

    pub async fn wait(self) -> LoadOutcome {
        let mut rx = match self.inner {
            PendingInner::Settled(outcome) => return outcome,
            PendingInner::Waiting(rx) => rx,
        };
        let outcome = match rx.wait_for(|outcome| outcome.is_some()).await {
            Ok(outcome) => (*outcome).clone(),
            Err(_) => None,
        };
        outcome.unwrap_or(Err(LoadError::Aborted))
    }
}

impl fmt::Debug for PendingLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settled = matches!(self.inner, PendingInner::Settled(_));
        f.debug_struct("PendingLoad")
            .field("settled", &settled)
            .finish()
    }
}

/// Injects the widget script at most once and shares the outcome with every
/// caller.
pub struct Loader {
    page: Arc<dyn PageEnvironment>,
    settle: SettleTiming,
    state: Arc<Mutex<LoadState>>,
}

impl Loader {
    pub fn new(page: Arc<dyn PageEnvironment>) -> Self {
        Self::with_settle_timing(page, SettleTiming::default())
    }

    pub fn with_settle_timing(page: Arc<dyn PageEnvironment>, settle: SettleTiming) -> Self {
        Self {
            page,
            settle,
            state: Arc::new(Mutex::new(LoadState::Unstarted)),
        }
    }

    pub fn current_handle(&self) -> Option<HandleRef> {
        self.page.current_handle()
    }

    pub fn phase(&self) -> LoadPhase {
        match &*self.lock_state() {
            LoadState::Unstarted => LoadPhase::Unstarted,
            LoadState::Loading(_) => LoadPhase::Loading,
            LoadState::Loaded(_) => LoadPhase::Loaded,
            LoadState::Failed(err) => LoadPhase::Failed(err.clone()),
        }
    }

    /// Resolve the widget handle, injecting the script on the first call.
    ///
    /// `config` is only consulted by the call that starts the load. A failed
    /// load stays failed for the lifetime of the loader.
    pub async fn load(&self, config: &HeyoConfig) -> LoadOutcome {
        self.start(config).wait().await
    }

    /// Begin loading during the current call and return a ticket for the
    /// outcome. Whichever call reaches here first decides the config.
    pub fn start(&self, config: &HeyoConfig) -> PendingLoad {
        if !self.page.has_document() {
            debug!("no document available; using inert HEYO handle");
            return PendingLoad::settled(Ok(Arc::new(InertHandle)));
        }
        if let Some(handle) = self.page.current_handle() {
            return PendingLoad::settled(Ok(handle));
        }

        let mut state = self.lock_state();
        match &*state {
            LoadState::Loaded(handle) => PendingLoad::settled(Ok(handle.clone())),
            LoadState::Failed(err) => PendingLoad::settled(Err(err.clone())),
            LoadState::Loading(rx) => PendingLoad::waiting(rx.clone()),
            LoadState::Unstarted => {
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    warn!("HEYO load requested outside a tokio runtime");
                    return PendingLoad::settled(Err(LoadError::NoRuntime));
                };
                let url = match config.script_url() {
                    Ok(url) => url,
                    Err(err) => return PendingLoad::settled(Err(err)),
                };
                if is_dev_host(self.page.hostname().as_deref()) {
                    info!(
                        target: "heyo_embed::dev",
                        ?config,
                        "💬 [HEYO DEV] Loading HEYO script with options"
                    );
                }
                let (tx, rx) = watch::channel(None);
                *state = LoadState::Loading(rx.clone());
                let completion = LoadCompletion {
                    state: self.state.clone(),
                    tx: Some(tx),
                };
                runtime.spawn(run_load(
                    self.page.clone(),
                    self.settle,
                    ScriptElement::new(url),
                    completion,
                ));
                PendingLoad::waiting(rx)
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LoadState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("phase", &self.phase())
            .field("settle", &self.settle)
            .finish()
    }
}

/// Publishes the load outcome exactly once. If the load task is dropped
/// before finishing (its runtime shut down), the load becomes `Aborted`.
struct LoadCompletion {
    state: Arc<Mutex<LoadState>>,
    tx: Option<watch::Sender<Option<LoadOutcome>>>,
}

impl LoadCompletion {
    fn finish(&mut self, outcome: LoadOutcome) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        {
            let mut state = self
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *state = match &outcome {
                Ok(handle) => LoadState::Loaded(handle.clone()),
                Err(err) => LoadState::Failed(err.clone()),
            };
        }
        tx.send_replace(Some(outcome));
    }
}

impl Drop for LoadCompletion {
    fn drop(&mut self) {
        if self.tx.is_some() {
            warn!("HEYO load task dropped before completing");
            self.finish(Err(LoadError::Aborted));
        }
    }
}

async fn run_load(
    page: Arc<dyn PageEnvironment>,
    settle: SettleTiming,
    script: ScriptElement,
    mut completion: LoadCompletion,
) {
    let url = script.src.to_string();
    info!(%url, "injecting HEYO script");
    let outcome = match page.append_script(script).await {
        ScriptEvent::Load => wait_for_attach(page.as_ref(), settle, &url).await,
        ScriptEvent::Error(reason) => Err(LoadError::ScriptFailed {
            url: url.clone(),
            reason,
        }),
    };

    match &outcome {
        Ok(_) => info!(%url, "HEYO attached"),
        Err(err) => warn!(%url, %err, "HEYO script load failed"),
    }
    completion.finish(outcome);
}

async fn wait_for_attach(
    page: &dyn PageEnvironment,
    settle: SettleTiming,
    url: &str,
) -> LoadOutcome {
    let started = tokio::time::Instant::now();
    loop {
        if let Some(handle) = page.current_handle() {
            return Ok(handle);
        }
        if started.elapsed() >= settle.timeout {
            return Err(LoadError::NotAttached {
                url: url.to_string(),
            });
        }
        sleep(settle.interval).await;
    }
}
