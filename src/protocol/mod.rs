//! The request/reply vocabulary spoken over the lobby and developer listeners.

pub mod messages;

pub use messages::ClientMessage;
