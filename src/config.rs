use crate::error::LoadError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

pub const DEFAULT_SCRIPT_SRC: &str = "https://heyo.so/embed/script";

/// Verbosity of the console output emitted by the widget script itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Minimal,
    None,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Minimal => "minimal",
            LogLevel::None => "none",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "minimal" => Ok(LogLevel::Minimal),
            "none" => Ok(LogLevel::None),
            other => anyhow::bail!("unknown log level {other:?} (expected debug, minimal or none)"),
        }
    }
}

/// Load parameters for the widget script. Only the config passed to the
/// first load of a process is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeyoConfig {
    /// Required for localhost development, where the project cannot be
    /// inferred from the page origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Keep the widget hidden until `show()` is called.
    #[serde(default)]
    pub hidden: bool,
    /// Alternate script URL, for development only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<LogLevel>,
}

impl HeyoConfig {
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_script_src(mut self, src: impl Into<String>) -> Self {
        self.script_src = Some(src.into());
        self
    }

    pub fn with_logs(mut self, level: LogLevel) -> Self {
        self.logs = Some(level);
        self
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let project_id = std::env::var("HEYO_PROJECT_ID")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let hidden = std::env::var("HEYO_HIDDEN")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let script_src = std::env::var("HEYO_SCRIPT_SRC")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let logs = std::env::var("HEYO_LOGS")
            .ok()
            .map(|v| v.parse::<LogLevel>())
            .transpose()
            .context("failed to parse HEYO_LOGS")?;

        Ok(Self {
            project_id,
            hidden,
            script_src,
            logs,
        })
    }

    /// Script URL with the query parameters the embed endpoint understands.
    pub fn script_url(&self) -> Result<Url, LoadError> {
        let base = self.script_src.as_deref().unwrap_or(DEFAULT_SCRIPT_SRC);
        let mut url = Url::parse(base).map_err(|err| LoadError::InvalidUrl {
            url: base.to_string(),
            reason: err.to_string(),
        })?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(project_id) = self.project_id.as_deref().filter(|p| !p.is_empty()) {
                query.append_pair("projectId", project_id);
            }
            if self.hidden {
                query.append_pair("hidden", "true");
            }
            if let Some(level) = self.logs.filter(|l| *l != LogLevel::default()) {
                query.append_pair("logs", level.as_str());
            }
        }
        // `query_pairs_mut` leaves a dangling `?` when nothing was appended
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }
}
