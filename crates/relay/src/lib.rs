//! Outbound delivery: MX resolution, header normalization and the scripted
//! SMTP conversation with the recipient domain's exchanger.

pub mod client;
pub mod headers;
pub mod resolver;

pub use client::{Config, Relay, RelayError};
pub use headers::ensure_headers;
pub use resolver::{DnsResolver, MxLookup, MxRecord, ResolveError};
