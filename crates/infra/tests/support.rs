use std::sync::Arc;

use footsteps_domain::{ApiResponse, RequestLayerConfig, TransportOutcome};
use footsteps_infra::testing::ScriptedTransport;
use footsteps_infra::{RequestLayer, Transport};

pub const AUTH_EXPIRED: u16 = 401;

/// Successful outcome with a text body
pub fn ok(body: &'static str) -> TransportOutcome {
    TransportOutcome::Success(ApiResponse::new(200, body))
}

/// Error response with `status`
pub fn rejected(status: u16, body: &'static str) -> TransportOutcome {
    TransportOutcome::HttpError(ApiResponse::new(status, body))
}

pub fn offline() -> TransportOutcome {
    TransportOutcome::NetworkFailure("connection reset by peer".into())
}

/// Layer over `transport` with `config`, default collaborators otherwise
pub fn layer_over(transport: &Arc<ScriptedTransport>, config: RequestLayerConfig) -> RequestLayer {
    RequestLayer::builder(Arc::clone(transport) as Arc<dyn Transport>)
        .config(config)
        .build()
        .expect("layer should build")
}
