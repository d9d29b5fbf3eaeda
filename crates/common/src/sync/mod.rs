//! Coordination primitives for concurrent callers
//!
//! - **`single_flight`**: collapses concurrent calls for one key into a
//!   single spawned computation and fans its result out to every waiter.

pub mod single_flight;

pub use single_flight::{Flight, FlightAborted, SingleFlight, ZeroWaiterPolicy};
