//! Process-wide server state and the accept loop.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};

use gambiarra_llm::LlmProvider;
use gambiarra_tools::{ModeFilter, ToolCallExtractor, ToolRegistry};

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::ServerResult;
use crate::session::SessionManager;

/// Read-mostly state shared by every connection task.
pub struct ServerDeps {
    /// The closed tool set.
    pub registry: ToolRegistry,
    /// Compiled XML extraction patterns.
    pub extractor: ToolCallExtractor,
    /// Per-mode tool policy.
    pub mode_filter: ModeFilter,
    /// The LLM provider.
    pub provider: Box<dyn LlmProvider>,
    /// Live-session registry.
    pub sessions: SessionManager,
    /// Server configuration.
    pub config: ServerConfig,
}

impl ServerDeps {
    /// Assemble the shared state.
    #[must_use]
    pub fn new(config: ServerConfig, provider: Box<dyn LlmProvider>) -> Self {
        Self {
            registry: ToolRegistry::with_defaults(),
            extractor: ToolCallExtractor::new(),
            mode_filter: ModeFilter::new(),
            provider,
            sessions: SessionManager::new(config.max_sessions),
            config,
        }
    }
}

/// The orchestration server.
pub struct Server {
    deps: Arc<ServerDeps>,
}

impl Server {
    /// Create a server.
    #[must_use]
    pub fn new(config: ServerConfig, provider: Box<dyn LlmProvider>) -> Self {
        Self {
            deps: Arc::new(ServerDeps::new(config, provider)),
        }
    }

    /// Handle to the shared state (used by tests to drive in-memory
    /// connections).
    #[must_use]
    pub fn deps(&self) -> Arc<ServerDeps> {
        Arc::clone(&self.deps)
    }

    /// Accept TCP connections forever, one task per connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind.
    pub async fn run(&self) -> ServerResult<()> {
        let addr = self.deps.config.bind_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!(%addr, "server listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            info!(%peer, "connection accepted");
            let deps = Arc::clone(&self.deps);
            tokio::spawn(async move {
                if let Err(e) = Connection::new(stream, deps).serve().await {
                    error!(%peer, error = %e, "connection failed");
                }
            });
        }
    }
}
