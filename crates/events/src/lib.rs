//! Campus benchmark dispatch bus.
//!
//! - [`DispatchBus`]: replaying publish/subscribe hub. Every subscriber
//!   receives every item exactly once, including items published before it
//!   subscribed, through its own unbounded channel.

pub mod bus;

pub use bus::DispatchBus;
