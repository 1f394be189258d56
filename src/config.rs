use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Upstream model used when the requested public name has no mapping.
    #[serde(default = "default_fallback_upstream_model")]
    pub fallback_upstream_model: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub auth: AuthConfig,
    pub upstream: UpstreamConfig,
    #[serde(default = "default_models")]
    pub models: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_master_key_env")]
    pub master_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_cookie_env")]
    pub cookie_env: String,
    pub space_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default = "default_client_version")]
    pub client_version: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            master_key_env: default_master_key_env(),
        }
    }
}

fn default_port() -> u16 {
    8004
}

fn default_model() -> String {
    "claude-sonnet-4.5".to_string()
}

fn default_fallback_upstream_model() -> String {
    "anthropic-sonnet-alt-thinking".to_string()
}

fn default_request_timeout_secs() -> u64 {
    180
}

fn default_master_key_env() -> String {
    "API_MASTER_KEY".to_string()
}

fn default_base_url() -> String {
    "https://www.notion.so".to_string()
}

fn default_cookie_env() -> String {
    "NOTION_COOKIE".to_string()
}

fn default_client_version() -> String {
    "23.13.20251011.2037".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Public model names and the upstream models they run on.
pub fn default_models() -> HashMap<String, String> {
    [
        ("claude-sonnet-4.5", "anthropic-sonnet-alt"),
        ("claude-opus-4.1", "anthropic-opus-4.1"),
        ("gpt-5", "openai-turbo"),
        ("gpt-4.1", "openai-gpt-4.1"),
        ("gemini-2.5-flash", "vertex-gemini-2.5-flash"),
        ("gemini-2.5-pro", "vertex-gemini-2.5-pro"),
    ]
    .into_iter()
    .map(|(public, upstream)| (public.to_string(), upstream.to_string()))
    .collect()
}

impl ProxyConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        let candidates = config_search_paths();
        for candidate in &candidates {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(candidate);
            }
        }

        Err(ProxyError::config(format!(
            "No config file found. Searched: {}. Create one from config.example.toml",
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    /// Check the identity fields the upstream rejects requests without.
    pub fn validate(&self) -> Result<()> {
        if self.upstream.space_id.trim().is_empty() || self.upstream.user_id.trim().is_empty() {
            return Err(ProxyError::config(
                "upstream.space_id and upstream.user_id must both be set",
            ));
        }
        Ok(())
    }

    /// Read the session cookie from the configured environment variable.
    /// A bare token is expanded to `token_v2=<token>`.
    pub fn resolve_cookie(&self) -> Result<String> {
        let raw = std::env::var(&self.upstream.cookie_env).map_err(|_| {
            ProxyError::config(format!(
                "Environment variable '{}' not set. Set it to your Notion session cookie.",
                self.upstream.cookie_env
            ))
        })?;
        let cookie = cookie_header(&raw);
        if cookie.is_empty() {
            return Err(ProxyError::config(format!(
                "Environment variable '{}' is empty",
                self.upstream.cookie_env
            )));
        }
        Ok(cookie)
    }

    /// The client API key, if one is configured. Unset, empty and `"1"` disable auth.
    pub fn resolve_master_key(&self) -> Option<String> {
        std::env::var(&self.auth.master_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != "1")
    }

    /// The public model name a request is answered under.
    pub fn public_model(&self, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.default_model)
            .to_string()
    }

    /// Map a public model name onto the upstream model identifier.
    pub fn upstream_model(&self, public: &str) -> String {
        self.models
            .get(public)
            .filter(|m| !m.is_empty())
            .cloned()
            .unwrap_or_else(|| self.fallback_upstream_model.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Public model names, sorted for stable listings.
    pub fn known_models(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

pub(crate) fn cookie_header(raw: &str) -> String {
    let cookie = raw.trim();
    if cookie.is_empty() || cookie.contains('=') {
        cookie.to_string()
    } else {
        format!("token_v2={cookie}")
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // CWD
    paths.push(PathBuf::from("notion-proxy.toml"));

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("notion-proxy").join("config.toml"));
    }
    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join("notion-proxy").join("config.toml"));
        paths.push(home.join(".notion-proxy.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn minimal_config() -> ProxyConfig {
        toml::from_str(
            r#"
[upstream]
space_id = "space-1"
user_id = "user-1"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_load_config() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
port = 5000
default_model = "gpt-5"
request_timeout_secs = 30

[auth]
master_key_env = "MY_PROXY_KEY"

[upstream]
space_id = "space-1"
user_id = "user-1"
user_name = "Ada"

[models]
"gpt-5" = "openai-turbo"
"#
        )
        .unwrap();

        let config = ProxyConfig::load(f.path()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.default_model, "gpt-5");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.auth.master_key_env, "MY_PROXY_KEY");
        assert_eq!(config.upstream.base_url, "https://www.notion.so");
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.upstream_model("gpt-5"), "openai-turbo");
    }

    #[test]
    fn test_defaults_carry_known_models() {
        let config = minimal_config();
        assert_eq!(config.port, 8004);
        assert_eq!(config.request_timeout_secs, 180);
        assert_eq!(
            config.known_models(),
            vec![
                "claude-opus-4.1",
                "claude-sonnet-4.5",
                "gemini-2.5-flash",
                "gemini-2.5-pro",
                "gpt-4.1",
                "gpt-5"
            ]
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_model_resolution() {
        let config = minimal_config();
        assert_eq!(config.public_model(None), "claude-sonnet-4.5");
        assert_eq!(config.public_model(Some("  ")), "claude-sonnet-4.5");
        assert_eq!(config.public_model(Some("gpt-5")), "gpt-5");
        assert_eq!(config.upstream_model("claude-sonnet-4.5"), "anthropic-sonnet-alt");
        assert_eq!(
            config.upstream_model("no-such-model"),
            "anthropic-sonnet-alt-thinking"
        );
    }

    #[test]
    fn test_validate_rejects_missing_identity() {
        let mut config = minimal_config();
        config.upstream.user_id = String::new();
        assert!(matches!(config.validate(), Err(ProxyError::Config { .. })));
    }

    #[test]
    fn test_cookie_header() {
        assert_eq!(cookie_header("abc123"), "token_v2=abc123");
        assert_eq!(cookie_header(" token_v2=abc; x=y "), "token_v2=abc; x=y");
        assert_eq!(cookie_header(""), "");
    }
}
