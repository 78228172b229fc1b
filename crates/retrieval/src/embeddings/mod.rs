//! Embedding capability.
//!
//! The rest of the crate only sees [`EmbeddingProvider`]; concrete providers
//! are chosen by [`create_provider`] from configuration.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{HashingProvider, OpenAiProvider};
