//! Session traits implemented by every remote backend.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::RemoteResult;

/// Opens sessions to individual nodes.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: RemoteSession;

    /// Dial and authenticate against `node`.
    async fn connect(&self, node: &str) -> RemoteResult<Self::Session>;
}

/// An open, authenticated session to one node.
#[async_trait]
pub trait RemoteSession: Send + Sync + 'static {
    /// The node this session is connected to.
    fn node(&self) -> &str;

    /// Run `command` to completion and return its combined output.
    ///
    /// A non-zero exit status is an error.
    async fn execute(&self, command: &str) -> RemoteResult<String>;

    /// Run `command`, forwarding each stdout line to `lines`, and return
    /// the exit status once the command ends.
    ///
    /// A dropped receiver does not stop the command; output is discarded.
    async fn stream(&self, command: &str, lines: mpsc::Sender<String>) -> RemoteResult<u32>;

    /// Write `contents` to `remote_path` on the node.
    async fn upload(&self, contents: Vec<u8>, remote_path: &str) -> RemoteResult<()>;

    /// Close the session. Errors are logged, never returned.
    async fn close(&self);
}
