//! Cross-component tests for ingestion and retrieval.

pub(crate) mod http;
