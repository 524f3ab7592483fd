//! Persistence façade: certificates, analyses and chat history in PostgreSQL.
//! Every endpoint answers 503 when no database is configured.

pub mod handlers;
pub mod queries;
