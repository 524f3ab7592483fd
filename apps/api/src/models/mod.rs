pub mod analysis;
pub mod certificate;
pub mod chat;
