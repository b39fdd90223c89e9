pub mod messages;
pub mod presence;
pub mod store;
