//! Time abstractions
//!
//! Everything that compares instants (cache expiry, elapsed-time logging)
//! goes through a [`Clock`] so tests can drive time by hand with
//! [`MockClock`] instead of sleeping.

mod clock;

pub use clock::{Clock, MockClock, SystemClock};
