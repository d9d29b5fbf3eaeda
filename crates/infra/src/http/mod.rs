//! HTTP transport
//!
//! [`Transport`] is the seam between the request layer and the wire. The
//! layer never inspects how a request is sent, only the
//! [`TransportOutcome`](footsteps_domain::TransportOutcome) that comes back.

pub mod transport;

pub use transport::{HttpTransport, HttpTransportBuilder, Transport};
