//! Network reachability probe backed by the cloud health endpoint.

use async_trait::async_trait;
use tracing::debug;

use curator_core::ConnectivityProbe;

use crate::client::CloudClient;

/// Reports the host online when the cloud endpoint answers at all.
///
/// An unhealthy answer still counts as online; the failed upload that
/// follows is handled by the cycle's own error path.
#[derive(Clone)]
pub struct HttpConnectivityProbe {
    client: CloudClient,
}

impl HttpConnectivityProbe {
    pub fn new(client: CloudClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConnectivityProbe for HttpConnectivityProbe {
    async fn is_online(&self) -> bool {
        match self.client.health().await {
            Ok(_) => true,
            Err(e) => {
                debug!(
                    subsystem = "cloud",
                    component = "connectivity",
                    error = %e,
                    "Cloud endpoint unreachable"
                );
                false
            }
        }
    }
}
