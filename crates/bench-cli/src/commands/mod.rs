pub mod matching;
pub mod run;
pub mod verify;

use std::path::PathBuf;

use bench_core::BenchConfig;
use benchgrid_remote::{SshConnector, SshSettings, StdinPrompt};
use clap::ValueEnum;

/// Remote execution backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Ssh,
}

/// Build the SSH connector; prompts for the key passphrase if needed.
pub fn ssh_connector(config: &BenchConfig) -> anyhow::Result<SshConnector> {
    anyhow::ensure!(!config.ssh.user.is_empty(), "[ssh] user is not set");
    anyhow::ensure!(!config.ssh.key_file.is_empty(), "[ssh] key_file is not set");

    let settings = SshSettings {
        user: config.ssh.user.clone(),
        key_file: PathBuf::from(&config.ssh.key_file),
        connect_timeout: config.executor.connect_timeout()?,
    };
    Ok(SshConnector::new(settings, &StdinPrompt)?)
}
