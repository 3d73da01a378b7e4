use crate::config::HeyoConfig;
use crate::error::LoadError;

/// Markup for server-rendered pages that embed the widget directly instead of
/// going through the runtime loader.
pub fn script_tag(config: &HeyoConfig) -> Result<String, LoadError> {
    let url = config.script_url()?;
    Ok(format!(
        "<script async src=\"{}\"></script>",
        escape_attr(url.as_str())
    ))
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
