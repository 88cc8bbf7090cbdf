// src/utils/mod.rs

//! Utility functions and helpers.

pub mod http;
pub mod text;

use url::Url;

/// Join path segments onto a base URL, ignoring any trailing slash on the base.
pub fn join_url(base: &str, path: &str) -> crate::error::Result<Url> {
    let base = format!("{}/", base.trim_end_matches('/'));
    Ok(Url::parse(&base)?.join(path.trim_start_matches('/'))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://discord.com/api/v10", "channels/1/messages")
                .unwrap()
                .as_str(),
            "https://discord.com/api/v10/channels/1/messages"
        );
        assert_eq!(
            join_url("https://lms.example.com/", "/webapps/streamViewer/streamViewer")
                .unwrap()
                .as_str(),
            "https://lms.example.com/webapps/streamViewer/streamViewer"
        );
    }

    #[test]
    fn test_join_url_rejects_garbage() {
        assert!(join_url("not a url", "x").is_err());
    }
}
