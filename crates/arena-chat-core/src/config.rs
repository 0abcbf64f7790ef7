//! Chat configuration, loaded from environment variables at startup.

use std::path::PathBuf;

/// File name of the transcript database inside the data directory.
pub const DATABASE_FILE_NAME: &str = "ChatHistory.db";

/// Secure-store key under which the bearer token is kept.
pub const DEFAULT_CREDENTIAL_KEY: &str = "userToken";

/// Runtime configuration for the chat core and its front-ends.
///
/// Every field has a default so the client works without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// API base URL; the talk endpoint is `{base_url}ai/talk`
    /// (default: `"http://127.0.0.1:8080/"`).
    pub base_url: String,

    /// Location of the SQLite transcript database.
    pub database_path: PathBuf,

    /// Key looked up in the secure store by the auth gate.
    pub credential_key: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,sqlx=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// When set, logs are written to a file in this directory instead of stderr.
    pub log_dir: Option<PathBuf>,
}

impl ChatConfig {
    /// Build [`ChatConfig`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`ChatConfig`] from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            base_url: lookup("ARENA_BASE_URL").unwrap_or_else(|| "http://127.0.0.1:8080/".to_owned()),
            database_path: lookup("ARENA_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_database_path),
            credential_key: lookup("ARENA_CREDENTIAL_KEY")
                .unwrap_or_else(|| DEFAULT_CREDENTIAL_KEY.to_owned()),
            log_level: lookup("ARENA_LOG").unwrap_or_else(|| "info".to_owned()),
            log_json: lookup("ARENA_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            log_dir: lookup("ARENA_LOG_DIR")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Full URL of the inference endpoint.
    pub fn talk_url(&self) -> String {
        if self.base_url.ends_with('/') {
            format!("{}ai/talk", self.base_url)
        } else {
            format!("{}/ai/talk", self.base_url)
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn default_database_path() -> PathBuf {
    dirs_next::data_dir()
        .map(|dir| dir.join("arena-chat").join(DATABASE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_without_environment() {
        let cfg = ChatConfig::default();
        assert_eq!(cfg.base_url, "http://127.0.0.1:8080/");
        assert_eq!(cfg.credential_key, "userToken");
        assert_eq!(cfg.log_level, "info");
        assert!(!cfg.log_json);
        assert!(cfg.log_dir.is_none());
        assert!(cfg.database_path.ends_with(DATABASE_FILE_NAME));
    }

    #[test]
    fn lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("ARENA_BASE_URL", "https://api.example.com/v2"),
            ("ARENA_DATABASE_PATH", "/tmp/chat.db"),
            ("ARENA_LOG_JSON", "TRUE"),
            ("ARENA_LOG_DIR", ""),
        ]);
        let cfg = ChatConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_owned()));
        assert_eq!(cfg.database_path, PathBuf::from("/tmp/chat.db"));
        assert!(cfg.log_json);
        assert!(cfg.log_dir.is_none(), "empty log dir means stderr");
        assert_eq!(cfg.talk_url(), "https://api.example.com/v2/ai/talk");
    }

    #[test]
    fn talk_url_keeps_single_slash() {
        let cfg = ChatConfig::default();
        assert_eq!(cfg.talk_url(), "http://127.0.0.1:8080/ai/talk");
    }
}
