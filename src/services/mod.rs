//! # Services Module
//!
//! External collaborators of the graph engine. The engine itself performs no
//! I/O; confirmation data is fetched here and fed back in as plain sets of
//! txids.

pub mod rpc_client;

pub use rpc_client::NodeClient;
