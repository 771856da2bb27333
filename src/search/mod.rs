mod client;
pub mod description;
mod types;

pub use client::{ExaClient, EXA_API_URL};
pub use description::generate_description;
pub use types::{SearchOptions, SearchResult};
