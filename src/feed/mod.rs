//! Paper feed clients.

pub mod arxiv;

pub use arxiv::ArxivClient;
