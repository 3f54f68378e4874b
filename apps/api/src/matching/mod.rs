pub mod matcher;
pub mod rules;

pub use matcher::NotificationMatcher;
