pub mod fanout;
pub mod handlers;
pub mod session;

pub use fanout::{DeliveryFanout, DeliveryReport};
