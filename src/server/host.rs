//! Server host for transport-agnostic API exposure
//!
//! The host holds everything an exposure needs to serve requests: the
//! record service and the provider turning request headers into an
//! [`AuthContext`](crate::core::auth::AuthContext).

use crate::config::ServiceConfig;
use crate::core::auth::AuthProvider;
use crate::core::service::RecordService;
use std::sync::Arc;

/// Host context containing all service state
pub struct ServerHost {
    /// Record workflows
    pub service: RecordService,

    /// Caller identification
    pub auth: Arc<dyn AuthProvider>,
}

impl ServerHost {
    pub fn new(service: RecordService, auth: Arc<dyn AuthProvider>) -> Self {
        Self { service, auth }
    }

    pub fn config(&self) -> &ServiceConfig {
        self.service.config()
    }

    /// Names of the modules the service can serve
    pub fn module_names(&self) -> Vec<&str> {
        let mut names = self.service.registry().module_names();
        names.sort_unstable();
        names
    }
}
