//! Client configuration from the environment

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// How turns are exchanged with the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolMode {
    /// `POST /chat/stream`, reply arrives as framed deltas
    #[default]
    Stream,
    /// `POST /chat`, reply arrives whole with the full history
    Sync,
}

impl ProtocolMode {
    pub fn endpoint(self) -> &'static str {
        match self {
            ProtocolMode::Stream => "/chat/stream",
            ProtocolMode::Sync => "/chat",
        }
    }
}

impl fmt::Display for ProtocolMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolMode::Stream => f.write_str("stream"),
            ProtocolMode::Sync => f.write_str("sync"),
        }
    }
}

impl FromStr for ProtocolMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stream" | "streaming" => Ok(ProtocolMode::Stream),
            "sync" | "synchronous" => Ok(ProtocolMode::Sync),
            other => Err(ConfigError::InvalidProtocol(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("HOMEBRAIN_PROTOCOL must be `stream` or `sync`, got `{0}`")]
    InvalidProtocol(String),
    #[error("HOMEBRAIN_API_URL must be an http(s) URL, got `{0}`")]
    InvalidApiUrl(String),
}

/// Configuration for the chat client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL including the `/api` prefix, without a trailing slash
    pub api_url: String,
    pub mode: ProtocolMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            mode: ProtocolMode::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("HOMEBRAIN_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidApiUrl(api_url));
        }

        let mode = match lookup("HOMEBRAIN_PROTOCOL") {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => ProtocolMode::default(),
        };

        Ok(Self { api_url, mode })
    }
}
