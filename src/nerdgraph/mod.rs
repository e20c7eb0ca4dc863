//! NerdGraph (New Relic GraphQL API) integration
//!
//! This module provides:
//! - Query objects that render GraphQL documents for each operation we use
//! - A transport seam plus the reqwest-backed HTTP transport
//! - Typed response models and field extraction

pub mod client;
pub mod query;
mod template;
pub mod types;

pub use client::{HttpTransport, NerdGraphTransport, RawReply, TransportFailure, NERDGRAPH_ENDPOINT};
pub use query::NerdGraphQuery;
pub use types::*;
