//! Domain types and models

pub mod request;
pub mod response;

pub use request::{Method, RequestBody, RequestDescriptor};
pub use response::{ApiResponse, TransportOutcome};
