//! ServerBuilder for fluent API to build HTTP servers

use super::exposure::RestExposure;
use super::host::ServerHost;
use crate::config::ServiceConfig;
use crate::core::auth::{AuthProvider, ConfigPolicyEvaluator, HeaderAuthProvider, PolicyEvaluator};
use crate::core::service::RecordService;
use crate::core::store::{AttachmentStore, RecordStore};
use crate::storage::{FsAttachmentStore, InMemoryRecordStore};
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builder for the record HTTP server
///
/// Only the configuration is required. Without explicit components the
/// builder falls back to an in-memory record store, a filesystem
/// attachment store rooted at `upload_dir`, header-based identification and
/// the policies declared in the configuration.
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_config(ServiceConfig::from_yaml_file("records.yaml")?)
///     .with_store(InMemoryRecordStore::new())
///     .build()?;
/// ```
pub struct ServerBuilder {
    config: Option<ServiceConfig>,
    store: Option<Arc<dyn RecordStore>>,
    attachments: Option<Arc<dyn AttachmentStore>>,
    policy: Option<Arc<dyn PolicyEvaluator>>,
    auth: Option<Arc<dyn AuthProvider>>,
    cors: Option<CorsLayer>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            config: None,
            store: None,
            attachments: None,
            policy: None,
            auth: None,
            cors: None,
            custom_routes: Vec::new(),
        }
    }

    /// Set the service configuration (required)
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_store(self, store: impl RecordStore + 'static) -> Self {
        self.with_shared_store(Arc::new(store))
    }

    /// Use a store the caller keeps a handle to
    pub fn with_shared_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_attachment_store(mut self, store: impl AttachmentStore + 'static) -> Self {
        self.attachments = Some(Arc::new(store));
        self
    }

    pub fn with_policy(mut self, policy: impl PolicyEvaluator + 'static) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    pub fn with_auth_provider(mut self, auth: impl AuthProvider + 'static) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    /// Apply a CORS layer to every route
    pub fn with_cors(mut self, cors: CorsLayer) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Add custom routes to the server
    ///
    /// Use this for endpoints outside the record API, such as
    /// authentication or webhooks.
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the transport-agnostic host
    pub fn build_host(&mut self) -> Result<ServerHost> {
        let config = self
            .config
            .take()
            .ok_or_else(|| anyhow::anyhow!("ServiceConfig is required. Call .with_config()"))?;
        config.check()?;

        let store = self
            .store
            .take()
            .unwrap_or_else(|| Arc::new(InMemoryRecordStore::new()));
        let attachments = self
            .attachments
            .take()
            .unwrap_or_else(|| Arc::new(FsAttachmentStore::new(&config.upload_dir)));
        let policy = self
            .policy
            .take()
            .unwrap_or_else(|| Arc::new(ConfigPolicyEvaluator::new()));
        let auth = self
            .auth
            .take()
            .unwrap_or_else(|| Arc::new(HeaderAuthProvider));

        let registry = Arc::new(config.registry());
        tracing::debug!(modules = ?registry.module_names(), "module registry built");

        let service = RecordService::new(store, registry, policy, attachments, Arc::new(config));
        Ok(ServerHost::new(service, auth))
    }

    /// Build the final REST router with request tracing
    pub fn build(mut self) -> Result<Router> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let cors = self.cors.take();
        let host = Arc::new(self.build_host()?);

        let app = RestExposure::build_router(host, custom_routes)?;
        let app = app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

        Ok(match cors {
            Some(cors) => app.layer(cors),
            None => app,
        })
    }

    /// Serve the application with graceful shutdown
    ///
    /// Handles SIGTERM and SIGINT (Ctrl+C).
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
