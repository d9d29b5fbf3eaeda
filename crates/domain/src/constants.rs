//! Request layer constants
//!
//! Defaults shared by the configuration surface and its loaders.

// Cache defaults
pub const DEFAULT_TTL_MS: u64 = 300_000;
pub const DEFAULT_MAX_CACHE_SIZE: usize = 100;
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_MAX_SNAPSHOT_BYTES: usize = 5 * 1024 * 1024;

// Retry defaults
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_RETRY_DELAY_MS: u64 = 1_000;

// Auth
pub const DEFAULT_AUTH_EXPIRED_STATUS: u16 = 401;

// Headers
pub const LOCALE_HEADER: &str = "accept-language";
pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const REQUEST_ID_HEADER: &str = "x-request-id";
