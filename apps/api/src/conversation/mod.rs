//! Client-side conversation state: the message log, the streaming reconciler and
//! an HTTP client for the chat service.

pub mod client;
pub mod log;
pub mod message;
pub mod reconcile;
