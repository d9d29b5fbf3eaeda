//! Request pipeline: keying, caching, deduplication, retry and the
//! [`RequestLayer`] facade tying them together.

pub mod cache;
pub mod keyer;
pub mod layer;
pub mod pending;
pub mod retry;

pub use cache::{CachedResponse, ResponseCache, UrlPattern};
pub use keyer::{CacheKey, RequestKeyer};
pub use layer::{RequestLayer, RequestLayerBuilder};
pub use pending::{FlightTicket, PendingRegistry, SharedOutcome};
pub use retry::{last_error, retry_executor, NetworkFailuresOnly};
