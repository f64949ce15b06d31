//! SSH backend built on russh.
//!
//! Host keys are accepted without verification. This leaves the fleet open
//! to impersonation on an untrusted network; operators are expected to run
//! benchmarks only inside a trusted boundary.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key::{KeyPair, PublicKey};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::address::ensure_port;
use crate::error::{RemoteError, RemoteResult};
use crate::lines::LineBuffer;
use crate::session::{Connector, RemoteSession};

/// Connection parameters shared by every session.
#[derive(Debug, Clone)]
pub struct SshSettings {
    pub user: String,
    pub key_file: PathBuf,
    /// Bound on dial plus handshake.
    pub connect_timeout: Duration,
}

/// Source of the passphrase for an encrypted private key.
pub trait PassphrasePrompt {
    fn passphrase(&self, key_file: &Path) -> std::io::Result<String>;
}

/// Asks on the terminal and reads one line from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

impl PassphrasePrompt for StdinPrompt {
    fn passphrase(&self, key_file: &Path) -> std::io::Result<String> {
        let mut stderr = std::io::stderr();
        writeln!(stderr, "Please enter passphrase for {}:", key_file.display())?;
        stderr.flush()?;

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }
}

/// Read and decode a private key, asking `prompt` if it is encrypted.
pub fn load_private_key(path: &Path, prompt: &dyn PassphrasePrompt) -> RemoteResult<KeyPair> {
    let display = path.display().to_string();
    let pem = std::fs::read_to_string(path).map_err(|source| RemoteError::KeyRead {
        path: display.clone(),
        source,
    })?;

    match russh_keys::decode_secret_key(&pem, None) {
        Ok(key) => Ok(key),
        Err(russh_keys::Error::KeyIsEncrypted) => {
            debug!(key = %path.display(), "private key is encrypted");
            let passphrase = prompt.passphrase(path).map_err(RemoteError::Passphrase)?;
            let passphrase = passphrase.trim_end_matches(['\r', '\n']);
            russh_keys::decode_secret_key(&pem, Some(passphrase))
                .map_err(|source| RemoteError::KeyDecode { path: display, source })
        }
        Err(source) => Err(RemoteError::KeyDecode { path: display, source }),
    }
}

/// russh client handler that trusts every host key.
struct AcceptAnyHost;

#[async_trait]
impl client::Handler for AcceptAnyHost {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Opens SSH sessions with one shared key.
pub struct SshConnector {
    user: String,
    key: Arc<KeyPair>,
    config: Arc<client::Config>,
    connect_timeout: Duration,
}

impl SshConnector {
    /// Load the key once; encrypted keys prompt a single time here rather
    /// than once per node.
    pub fn new(settings: SshSettings, prompt: &dyn PassphrasePrompt) -> RemoteResult<Self> {
        let key = load_private_key(&settings.key_file, prompt)?;
        info!(user = %settings.user, key = %settings.key_file.display(), "ssh key loaded");
        Ok(Self::with_key(settings.user, key, settings.connect_timeout))
    }

    pub fn with_key(user: String, key: KeyPair, connect_timeout: Duration) -> Self {
        Self {
            user,
            key: Arc::new(key),
            config: Arc::new(client::Config::default()),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Session = SshSession;

    async fn connect(&self, node: &str) -> RemoteResult<SshSession> {
        let address = ensure_port(node);

        let dial = async {
            let mut handle =
                client::connect(self.config.clone(), address.as_str(), AcceptAnyHost).await?;
            let accepted = handle
                .authenticate_publickey(self.user.clone(), self.key.clone())
                .await?;
            if !accepted {
                return Err(RemoteError::AuthRejected {
                    user: self.user.clone(),
                });
            }
            Ok::<_, RemoteError>(handle)
        };

        let handle = tokio::time::timeout(self.connect_timeout, dial)
            .await
            .map_err(|_| RemoteError::ConnectTimeout {
                address: address.clone(),
                timeout: self.connect_timeout,
            })??;

        debug!(%node, %address, "ssh session established");
        Ok(SshSession {
            node: node.to_string(),
            handle,
        })
    }
}

/// One authenticated SSH connection; each command gets its own channel.
pub struct SshSession {
    node: String,
    handle: Handle<AcceptAnyHost>,
}

#[async_trait]
impl RemoteSession for SshSession {
    fn node(&self) -> &str {
        &self.node
    }

    async fn execute(&self, command: &str) -> RemoteResult<String> {
        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut output = Vec::new();
        let mut status = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => output.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, .. } => output.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status } => status = Some(exit_status),
                _ => {}
            }
        }

        let output = String::from_utf8_lossy(&output).into_owned();
        match status {
            Some(0) => Ok(output),
            Some(status) => Err(RemoteError::ExitStatus {
                command: command.to_string(),
                status,
                output,
            }),
            None => Err(RemoteError::NoExitStatus {
                command: command.to_string(),
            }),
        }
    }

    async fn stream(&self, command: &str, lines: mpsc::Sender<String>) -> RemoteResult<u32> {
        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut buffer = LineBuffer::new();
        let mut status = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => {
                    for line in buffer.push(data) {
                        // Receiver gone means nobody is logging any more.
                        let _ = lines.send(line).await;
                    }
                }
                ChannelMsg::ExitStatus { exit_status } => status = Some(exit_status),
                _ => {}
            }
        }
        if let Some(rest) = buffer.finish() {
            let _ = lines.send(rest).await;
        }

        status.ok_or_else(|| RemoteError::NoExitStatus {
            command: command.to_string(),
        })
    }

    async fn upload(&self, contents: Vec<u8>, remote_path: &str) -> RemoteResult<()> {
        let quoted = shell_quote(remote_path);
        let command = format!("cat > {quoted} && chmod 0664 {quoted}");

        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command.as_str()).await?;
        channel.data(contents.as_slice()).await?;
        channel.eof().await?;

        let mut status = None;
        while let Some(msg) = channel.wait().await {
            if let ChannelMsg::ExitStatus { exit_status } = msg {
                status = Some(exit_status);
            }
        }

        match status {
            Some(0) => {
                debug!(
                    node = %self.node,
                    path = remote_path,
                    bytes = contents.len(),
                    "file staged"
                );
                Ok(())
            }
            Some(status) => Err(RemoteError::ExitStatus {
                command,
                status,
                output: String::new(),
            }),
            None => Err(RemoteError::NoExitStatus { command }),
        }
    }

    async fn close(&self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            warn!(node = %self.node, error = %e, "ssh disconnect failed");
        }
    }
}

/// Single-quote `s` for a POSIX shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
