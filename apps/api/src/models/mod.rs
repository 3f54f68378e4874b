pub mod consumer;
pub mod deal;
pub mod favorite;
pub mod membership;
pub mod notification;
pub mod retailer;

pub use consumer::Consumer;
pub use deal::{DealItem, DealStatus};
pub use favorite::Favorite;
pub use membership::MembershipEntry;
pub use notification::Notification;
pub use retailer::Retailer;
