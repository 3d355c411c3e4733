//! Text-generation service clients.

pub mod http;
mod types;

pub use http::HttpGenerator;
