//! HTTP networking module
//!
//! Provides HTTP client functionality for making requests to sourcing providers.

mod client;
mod user_agent;

pub use client::{HttpClient, HttpMethod, ProviderRequest, ProviderResponse, RequestBody};
pub use user_agent::generate_user_agent;
