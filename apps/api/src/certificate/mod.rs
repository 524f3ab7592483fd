pub mod analysis;
pub mod extractor;
pub mod handlers;
pub mod ingest;
pub mod prompts;
pub mod specs;
