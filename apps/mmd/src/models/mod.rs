pub mod chat;
pub mod profile;
pub mod session;
pub mod stats;
