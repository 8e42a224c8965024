//! Paper Digest — arXiv digest agent core.

pub mod config;
pub mod digest;
pub mod error;
pub mod feed;
pub mod llm;
pub mod model;
pub mod notify;
pub mod store;
pub mod translate;
