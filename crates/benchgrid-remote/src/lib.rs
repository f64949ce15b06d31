//! benchgrid-remote: remote-shell sessions to fleet nodes.
//!
//! The executor talks to nodes through two traits:
//!
//! - **`Connector`**: opens an authenticated session to one node
//! - **`RemoteSession`**: runs commands, streams output, stages files
//!
//! `SshConnector` is the production implementation. It loads the private
//! key once (prompting for a passphrase if the key is encrypted) and
//! accepts any host key: nodes are expected to sit inside an already
//! trusted network.

pub mod address;
pub mod error;
pub mod lines;
pub mod session;
pub mod ssh;

pub use address::ensure_port;
pub use error::{RemoteError, RemoteResult};
pub use lines::LineBuffer;
pub use session::{Connector, RemoteSession};
pub use ssh::{
    PassphrasePrompt, SshConnector, SshSession, SshSettings, StdinPrompt, load_private_key,
};
