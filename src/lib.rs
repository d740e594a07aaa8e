pub mod config;
pub mod pipeline; // extraction, reasoning, coverage
pub mod provider; // provider-agnostic AI invocation
pub mod server;
pub mod session;
pub mod store;
