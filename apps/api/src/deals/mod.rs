pub mod discount;
pub mod handlers;
