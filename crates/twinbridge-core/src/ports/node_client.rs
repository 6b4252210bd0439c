//! Node-protocol client port (driven/secondary port)
//!
//! This module defines the interface for talking to the server that exposes
//! physical devices as named nodes: reading and writing values, invoking
//! remote procedures and browsing the node tree.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific.
//! - Every call is a single request/response exchange; sessions hold no
//!   intermediate state between calls.
//! - A session is owned by exactly one device binding.

use std::sync::Arc;

use crate::domain::node::{NodeInfo, NodePath, NodeValue};

/// Port trait for opening node-protocol sessions
#[async_trait::async_trait]
pub trait INodeClient: Send + Sync {
    /// Connects to the server at `endpoint` (e.g. `opc.tcp://localhost:4840/`)
    async fn connect(&self, endpoint: &str) -> anyhow::Result<Arc<dyn INodeSession>>;
}

/// An open session with the node-protocol server
#[async_trait::async_trait]
pub trait INodeSession: Send + Sync {
    /// Reads the current value of a node
    async fn read_node(&self, path: &NodePath) -> anyhow::Result<NodeValue>;

    /// Writes a value onto a node
    async fn write_node(&self, path: &NodePath, value: NodeValue) -> anyhow::Result<()>;

    /// Invokes the remote procedure `method` on `object`
    ///
    /// # Returns
    /// The output arguments of the procedure
    async fn call_method(
        &self,
        object: &NodePath,
        method: &NodePath,
    ) -> anyhow::Result<Vec<NodeValue>>;

    /// Lists the direct children of `root`
    async fn browse_children(&self, root: &NodePath) -> anyhow::Result<Vec<NodeInfo>>;
}
