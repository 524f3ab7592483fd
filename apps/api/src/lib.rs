//! Diamond certificate explainer: PDF upload, LLM analysis, follow-up chat relay
//! and optional persistence.

pub mod certificate;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod db;
pub mod errors;
pub mod llm_client;
pub mod models;
pub mod records;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
