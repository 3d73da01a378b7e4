//! The HEYO widget API contract as seen from the host page.
//!
//! Every member of the remote API is named by [`Method`], and every member is
//! assigned one of three [`Dispatch`] strategies. Deferred members carry their
//! arguments in a [`Call`] so they can be applied later against the real handle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How the proxy handles an access to a given member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Forwarded straight to the loader.
    Immediate,
    /// Answered in the same turn from the current handle, or a safe default.
    SyncRead,
    /// Returns at once; applied once the member exists on the handle.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Init,
    Ready,
    ReadyFlag,
    IsOpen,
    GetAgentStatus,
    Show,
    Hide,
    Open,
    Close,
    Toggle,
    Identify,
    Configure,
    OnAgentStatusChange,
    OnReady,
    OnOpen,
    OnClose,
    Logout,
    AddTag,
    RemoveTag,
    SetTags,
    SetField,
    RemoveField,
}

impl Method {
    pub const ALL: [Method; 22] = [
        Method::Init,
        Method::Ready,
        Method::ReadyFlag,
        Method::IsOpen,
        Method::GetAgentStatus,
        Method::Show,
        Method::Hide,
        Method::Open,
        Method::Close,
        Method::Toggle,
        Method::Identify,
        Method::Configure,
        Method::OnAgentStatusChange,
        Method::OnReady,
        Method::OnOpen,
        Method::OnClose,
        Method::Logout,
        Method::AddTag,
        Method::RemoveTag,
        Method::SetTags,
        Method::SetField,
        Method::RemoveField,
    ];

    /// Property name on the remote `HEYO` object.
    pub fn name(self) -> &'static str {
        match self {
            Method::Init => "init",
            Method::Ready => "ready",
            Method::ReadyFlag => "_ready",
            Method::IsOpen => "isOpen",
            Method::GetAgentStatus => "getAgentStatus",
            Method::Show => "show",
            Method::Hide => "hide",
            Method::Open => "open",
            Method::Close => "close",
            Method::Toggle => "toggle",
            Method::Identify => "identify",
            Method::Configure => "configure",
            Method::OnAgentStatusChange => "onAgentStatusChange",
            Method::OnReady => "onReady",
            Method::OnOpen => "onOpen",
            Method::OnClose => "onClose",
            Method::Logout => "logout",
            Method::AddTag => "addTag",
            Method::RemoveTag => "removeTag",
            Method::SetTags => "setTags",
            Method::SetField => "setField",
            Method::RemoveField => "removeField",
        }
    }

    pub fn from_name(name: &str) -> Option<Method> {
        Method::ALL.into_iter().find(|m| m.name() == name)
    }

    pub fn dispatch(self) -> Dispatch {
        match self {
            Method::Init => Dispatch::Immediate,
            Method::Ready | Method::ReadyFlag | Method::IsOpen | Method::GetAgentStatus => {
                Dispatch::SyncRead
            }
            _ => Dispatch::Deferred,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of a [`Dispatch::SyncRead`] member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncValue {
    Flag(bool),
    Status(AgentStatus),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Online,
    Away,
    #[default]
    Offline,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Online => "online",
            AgentStatus::Away => "away",
            AgentStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for `show` and `open`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowOptions {
    /// Bypass `hideWhenOffline` when no agent is online.
    #[serde(default)]
    pub force: bool,
}

impl ShowOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Visitor identity passed to `identify`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetStyle {
    Bubble,
    AgentCard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetPosition {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetSize {
    Small,
    Medium,
    Large,
}

/// Runtime appearance settings for `configure`. Unset fields keep their
/// current value on the widget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_style: Option<WidgetStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_position: Option<WidgetPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_size: Option<WidgetSize>,
}

/// Callback with no arguments (`onReady`, `onOpen`, `onClose`).
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn() + Send + Sync>);

impl Callback {
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self) {
        (self.0)()
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// Callback receiving agent status updates.
#[derive(Clone)]
pub struct StatusCallback(Arc<dyn Fn(AgentStatus) + Send + Sync>);

impl StatusCallback {
    pub fn new(f: impl Fn(AgentStatus) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, status: AgentStatus) {
        (self.0)(status)
    }
}

impl fmt::Debug for StatusCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StatusCallback(..)")
    }
}

/// A deferred invocation: the target member plus its original arguments.
#[derive(Debug, Clone)]
pub enum Call {
    Show(ShowOptions),
    Hide,
    Open(ShowOptions),
    Close,
    Toggle,
    Identify(IdentifyMeta),
    Configure(WidgetSettings),
    OnAgentStatusChange(StatusCallback),
    OnReady(Callback),
    OnOpen(Callback),
    OnClose(Callback),
    Logout,
    AddTag(String),
    RemoveTag(String),
    SetTags(Vec<String>),
    SetField {
        key: String,
        value: serde_json::Value,
    },
    RemoveField(String),
}

impl Call {
    pub fn method(&self) -> Method {
        match self {
            Call::Show(_) => Method::Show,
            Call::Hide => Method::Hide,
            Call::Open(_) => Method::Open,
            Call::Close => Method::Close,
            Call::Toggle => Method::Toggle,
            Call::Identify(_) => Method::Identify,
            Call::Configure(_) => Method::Configure,
            Call::OnAgentStatusChange(_) => Method::OnAgentStatusChange,
            Call::OnReady(_) => Method::OnReady,
            Call::OnOpen(_) => Method::OnOpen,
            Call::OnClose(_) => Method::OnClose,
            Call::Logout => Method::Logout,
            Call::AddTag(_) => Method::AddTag,
            Call::RemoveTag(_) => Method::RemoveTag,
            Call::SetTags(_) => Method::SetTags,
            Call::SetField { .. } => Method::SetField,
            Call::RemoveField(_) => Method::RemoveField,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_table_classifies_members() {
        assert_eq!(Method::Init.dispatch(), Dispatch::Immediate);
        for m in [
            Method::Ready,
            Method::ReadyFlag,
            Method::IsOpen,
            Method::GetAgentStatus,
        ] {
            assert_eq!(m.dispatch(), Dispatch::SyncRead, "{m}");
        }
        let deferred = Method::ALL
            .iter()
            .filter(|m| m.dispatch() == Dispatch::Deferred)
            .count();
        assert_eq!(deferred, Method::ALL.len() - 5);
    }

    #[test]
    fn names_round_trip_through_lookup() {
        for m in Method::ALL {
            assert_eq!(Method::from_name(m.name()), Some(m));
        }
        assert_eq!(Method::from_name("foo"), None);
    }

    #[test]
    fn calls_map_to_deferred_members() {
        let calls = [
            Call::Show(ShowOptions::forced()),
            Call::Toggle,
            Call::SetField {
                key: "plan".into(),
                value: serde_json::json!("pro"),
            },
            Call::OnReady(Callback::new(|| {})),
        ];
        for call in calls {
            assert_eq!(call.method().dispatch(), Dispatch::Deferred);
        }
    }

    #[test]
    fn widget_settings_use_wire_names() {
        let settings = WidgetSettings {
            widget_style: Some(WidgetStyle::AgentCard),
            widget_color: Some("#10b981".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&settings).unwrap(),
            serde_json::json!({"widgetColor": "#10b981", "widgetStyle": "agent-card"})
        );
    }
}
