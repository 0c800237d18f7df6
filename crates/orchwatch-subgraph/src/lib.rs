//! orchwatch-subgraph: read-only queries against the Livepeer subgraph.
//!
//! The subgraph is an indexed view of the same contracts the watcher follows.
//! It is only queried here; nothing is reconciled against it.

pub mod client;
pub mod error;
pub mod types;

pub use client::{parse_transcoders, LivepeerSubgraph, SubgraphClient};
pub use error::SubgraphError;
pub use types::{parse_big_int, Transcoder};
