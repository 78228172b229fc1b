//! Concrete embedding providers.

pub mod hashing;
pub mod openai;

pub use hashing::HashingProvider;
pub use openai::OpenAiProvider;
