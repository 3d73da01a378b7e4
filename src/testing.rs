//! In-process stand-ins for the page and the widget script.

use crate::api::{AgentStatus, Call, Method};
use crate::handle::{HandleSlot, RemoteHandle};
use crate::page::{PageEnvironment, ScriptElement, ScriptEvent};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Time between inserting the element and its `load`/`error` event.
pub const SCRIPT_LATENCY: Duration = Duration::from_millis(10);

pub struct FakeHandle {
    methods: Mutex<HashSet<Method>>,
    calls: Mutex<Vec<Call>>,
    open: AtomicBool,
    ready: AtomicBool,
    status: Mutex<AgentStatus>,
}

impl FakeHandle {
    pub fn complete() -> Arc<Self> {
        let handle = Self::partial(&Method::ALL);
        handle.ready.store(true, Ordering::SeqCst);
        handle
    }

    /// A handle that attached before all of its members were assigned.
    pub fn partial(methods: &[Method]) -> Arc<Self> {
        Arc::new(Self {
            methods: Mutex::new(methods.iter().copied().collect()),
            calls: Mutex::new(Vec::new()),
            open: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            status: Mutex::new(AgentStatus::Offline),
        })
    }

    pub fn add_method(&self, method: Method) {
        self.methods.lock().unwrap().insert(method);
    }

    /// Assign `method` after `delay`, as a slow-booting widget would.
    pub fn add_method_after(self: &Arc<Self>, method: Method, delay: Duration) {
        let handle = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handle.add_method(method);
        });
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    pub fn set_status(&self, status: AgentStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn invoked(&self) -> Vec<Method> {
        self.calls.lock().unwrap().iter().map(Call::method).collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn read<T>(&self, method: Method, value: impl FnOnce() -> T) -> Option<T> {
        self.has_method(method).then(value)
    }
}

impl RemoteHandle for FakeHandle {
    fn has_method(&self, method: Method) -> bool {
        self.methods.lock().unwrap().contains(&method)
    }

    fn ready(&self) -> Option<bool> {
        self.read(Method::Ready, || self.ready.load(Ordering::SeqCst))
    }

    fn ready_flag(&self) -> Option<bool> {
        self.read(Method::ReadyFlag, || self.ready.load(Ordering::SeqCst))
    }

    fn is_open(&self) -> Option<bool> {
        self.read(Method::IsOpen, || self.open.load(Ordering::SeqCst))
    }

    fn agent_status(&self) -> Option<AgentStatus> {
        self.read(Method::GetAgentStatus, || *self.status.lock().unwrap())
    }

    fn invoke(&self, call: Call) -> anyhow::Result<()> {
        let method = call.method();
        anyhow::ensure!(self.has_method(method), "HEYO.{method} is not a function");
        match &call {
            Call::Open(_) => self.set_open(true),
            Call::Close => self.set_open(false),
            Call::Toggle => {
                self.open.fetch_xor(true, Ordering::SeqCst);
            }
            Call::OnReady(cb) => cb.call(),
            Call::OnAgentStatusChange(cb) => cb.call(*self.status.lock().unwrap()),
            _ => {}
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

pub enum ScriptBehavior {
    /// Fire `load`, then attach `handle` to the slot after `delay`.
    AttachAfter {
        delay: Duration,
        handle: Arc<FakeHandle>,
    },
    /// Fire `load` but never attach anything.
    NeverAttach,
    /// Fire `error` with the given reason.
    Error(String),
}

impl ScriptBehavior {
    pub fn attach_after(delay: Duration, handle: Arc<FakeHandle>) -> Self {
        ScriptBehavior::AttachAfter { delay, handle }
    }
}

pub struct FakePage {
    slot: Arc<HandleSlot>,
    behavior: ScriptBehavior,
    hostname: Option<String>,
    scripts: Mutex<Vec<ScriptElement>>,
}

impl FakePage {
    pub fn new(behavior: ScriptBehavior) -> Arc<Self> {
        Self::with_hostname(behavior, "example.com")
    }

    pub fn with_hostname(behavior: ScriptBehavior, hostname: &str) -> Arc<Self> {
        Arc::new(Self {
            slot: Arc::new(HandleSlot::new()),
            behavior,
            hostname: Some(hostname.to_string()),
            scripts: Mutex::new(Vec::new()),
        })
    }

    pub fn slot(&self) -> &HandleSlot {
        &self.slot
    }

    pub fn injections(&self) -> usize {
        self.scripts.lock().unwrap().len()
    }

    pub fn script_urls(&self) -> Vec<String> {
        self.scripts
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.src.to_string())
            .collect()
    }
}

#[async_trait]
impl PageEnvironment for FakePage {
    fn has_document(&self) -> bool {
        true
    }

    fn hostname(&self) -> Option<String> {
        self.hostname.clone()
    }

    fn current_handle(&self) -> Option<Arc<dyn RemoteHandle>> {
        self.slot.current()
    }

    async fn append_script(&self, script: ScriptElement) -> ScriptEvent {
        assert!(script.async_load, "HEYO script must load asynchronously");
        self.scripts.lock().unwrap().push(script);
        tokio::time::sleep(SCRIPT_LATENCY).await;
        match &self.behavior {
            ScriptBehavior::AttachAfter { delay, handle } => {
                if delay.is_zero() {
                    self.slot.attach(handle.clone());
                } else {
                    let slot = self.slot.clone();
                    let handle = handle.clone();
                    let delay = *delay;
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        slot.attach(handle);
                    });
                }
                ScriptEvent::Load
            }
            ScriptBehavior::NeverAttach => ScriptEvent::Load,
            ScriptBehavior::Error(reason) => ScriptEvent::Error(reason.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: tracing::Level,
    pub target: String,
    pub fields: BTreeMap<String, String>,
}

#[derive(Clone, Default)]
pub struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureLayer {
    pub fn snapshot(&self) -> Vec<CapturedEvent> {
        self.events.lock().expect("events mutex").clone()
    }

    /// Install as the thread default for the rest of the test.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        use tracing_subscriber::layer::SubscriberExt as _;

        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }
}

struct FieldVisitor<'a> {
    fields: &'a mut BTreeMap<String, String>,
}

impl tracing::field::Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.fields
            .insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.fields
            .insert(field.name().to_string(), format!("{value:?}"));
    }
}

impl<S> tracing_subscriber::Layer<S> for CaptureLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut fields = BTreeMap::new();
        let mut visitor = FieldVisitor {
            fields: &mut fields,
        };
        event.record(&mut visitor);
        self.events
            .lock()
            .expect("events mutex")
            .push(CapturedEvent {
                level: *event.metadata().level(),
                target: event.metadata().target().to_string(),
                fields,
            });
    }
}
