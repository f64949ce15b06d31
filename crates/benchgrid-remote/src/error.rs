//! Remote session error types.

use std::time::Duration;

use thiserror::Error;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors raised while talking to a node.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to read private key {path}: {source}")]
    KeyRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode private key {path}: {source}")]
    KeyDecode {
        path: String,
        #[source]
        source: russh_keys::Error,
    },

    #[error("failed to read key passphrase: {0}")]
    Passphrase(#[source] std::io::Error),

    #[error("connecting to {address} timed out after {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },

    #[error("ssh: {0}")]
    Ssh(#[from] russh::Error),

    #[error("public key rejected for user {user}")]
    AuthRejected { user: String },

    #[error("`{command}` exited with status {status}: {output}")]
    ExitStatus {
        command: String,
        status: u32,
        output: String,
    },

    #[error("`{command}` ended without an exit status")]
    NoExitStatus { command: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
