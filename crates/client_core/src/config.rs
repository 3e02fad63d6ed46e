use std::{collections::HashMap, fs};

/// Explicit client configuration. Passed into the controller at
/// construction; nothing in the core reads ambient globals.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".into(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
        }
    }
}

/// Resolves configuration with defaults < `client.toml` < environment
/// precedence.
pub fn load_config() -> ClientConfig {
    let mut config = ClientConfig::default();

    if let Ok(raw) = fs::read_to_string("client.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("base_url") {
                config.base_url = v.clone();
            }
        }
    }

    if let Ok(v) = std::env::var("CHAT_BASE_URL") {
        config.base_url = v;
    }
    if let Ok(v) = std::env::var("APP__BASE_URL") {
        config.base_url = v;
    }

    config.base_url = normalize_base_url(config.base_url);
    config
}

fn normalize_base_url(raw: String) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return ClientConfig::default().base_url;
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_local_backend() {
        assert_eq!(ClientConfig::default().base_url, "http://localhost:3000");
    }

    #[test]
    fn strips_trailing_slash() {
        let config = ClientConfig::new("https://chat.example.com/");
        assert_eq!(config.base_url, "https://chat.example.com");
    }

    #[test]
    fn empty_base_url_falls_back_to_default() {
        let config = ClientConfig::new("   ");
        assert_eq!(config.base_url, ClientConfig::default().base_url);
    }
}
