//! Single-page chat UI served at `/`.

use sqlchat_core::config::DatabaseConfig;

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// The chat page with the connection form prefilled from `defaults`.
/// The password is never written into the page.
pub fn render_index(defaults: &DatabaseConfig) -> String {
    INDEX_HTML
        .replace("{{HOST}}", &escape_html(&defaults.host))
        .replace("{{PORT}}", &defaults.port.to_string())
        .replace("{{USER}}", &escape_html(&defaults.user))
        .replace("{{DATABASE}}", &escape_html(&defaults.database))
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
