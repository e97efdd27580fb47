//! Server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the orchestration server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum concurrent sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Idle seconds after which a session is torn down.
    #[serde(default = "default_session_timeout")]
    pub session_timeout_secs: u64,
    /// Conversation token budget.
    #[serde(default = "default_max_tokens")]
    pub max_conversation_tokens: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_sessions() -> usize {
    100
}

fn default_session_timeout() -> u64 {
    3600
}

fn default_max_tokens() -> usize {
    32_000
}

impl ServerConfig {
    /// The bind address as `host:port`.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_sessions: default_max_sessions(),
            session_timeout_secs: default_session_timeout(),
            max_conversation_tokens: default_max_tokens(),
        }
    }
}
