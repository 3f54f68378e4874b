pub mod audit;
pub mod handlers;
pub mod manager;
pub mod sync;

pub use manager::MembershipManager;
pub use sync::RetryPolicy;
