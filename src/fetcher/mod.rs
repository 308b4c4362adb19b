pub mod client;
pub mod envelope;
pub mod paginator;

pub use client::ApiClient;
pub use paginator::Paginator;
