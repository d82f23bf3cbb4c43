//! Configuration and CLI argument parsing for ssh-provision

use clap::Parser;
use std::path::PathBuf;
use zeroize::Zeroizing;

use crate::error::{ProvisionError, Result};
use crate::ssh::shell::quote;
use crate::ssh::{Elevation, Host, SshConfig};

/// Connection timeout in seconds
pub const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// Environment variable that carries the payload path to the command
pub const PAYLOAD_ENV: &str = "SSH_PROVISION_PAYLOAD";

/// ssh-provision CLI arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "ssh-provision")]
#[command(version)]
#[command(
    about = "Mirror a local directory to a remote host and run one command in it under sudo"
)]
pub struct Args {
    /// SSH host to connect to
    #[arg(long, env = "SSH_PROVISION_HOST")]
    pub host: String,

    /// SSH port
    #[arg(long, default_value_t = DEFAULT_PORT, env = "SSH_PROVISION_PORT")]
    pub port: u16,

    /// SSH username
    #[arg(long, env = "SSH_PROVISION_USER")]
    pub user: String,

    /// SSH password (alternative to key)
    #[arg(long, env = "SSH_PROVISION_PASSWORD")]
    pub password: Option<String>,

    /// Path to SSH private key file (alternative to password)
    #[arg(long, env = "SSH_PROVISION_KEY")]
    pub key: Option<PathBuf>,

    /// Password for `sudo` on the remote host
    #[arg(long, env = "SSH_PROVISION_SUDO_PASSWORD")]
    pub sudo_password: Option<String>,

    /// The remote user may sudo without a password
    #[arg(long, default_value = "false", env = "SSH_PROVISION_NOPASSWD_SUDO")]
    pub nopasswd_sudo: bool,

    /// Remote directory under which the workspace is created
    #[arg(long, env = "SSH_PROVISION_TMPDIR")]
    pub tmpdir: Option<String>,

    /// Extra ssh option for rsync, e.g. `-o Port=2222` (repeatable)
    #[arg(short = 'o', long = "ssh-option", value_name = "OPTION")]
    pub ssh_options: Vec<String>,

    /// Local directory to mirror
    #[arg(long, default_value = ".", env = "SSH_PROVISION_DIR")]
    pub dir: PathBuf,

    /// Remote directory to mirror into (default: a directory in the workspace)
    #[arg(long, env = "SSH_PROVISION_REMOTE_DIR")]
    pub remote_dir: Option<String>,

    /// Keep the mirrored files after the run (only with --remote-dir)
    #[arg(long, default_value = "false", env = "SSH_PROVISION_KEEP")]
    pub keep: bool,

    /// JSON file uploaded to the workspace for the command to read
    #[arg(long, env = "SSH_PROVISION_PAYLOAD")]
    pub payload: Option<PathBuf>,

    /// Command to run in the mirrored directory
    ///
    /// Like `ssh`, the words are joined with spaces and handed to the remote
    /// shell, so quoting inside a word is not preserved. Pass the whole
    /// command as one argument to keep pipes or quoted spaces intact.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Parsed and validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SSH host
    pub host: String,

    /// SSH port
    pub port: u16,

    /// SSH username
    pub user: String,

    /// SSH password
    pub password: Option<String>,

    /// Path to SSH private key
    pub key: Option<PathBuf>,

    /// Password for sudo
    pub sudo_password: Option<String>,

    /// Whether sudo works without a password
    pub nopasswd_sudo: bool,

    /// Remote temp root
    pub tmpdir: Option<String>,

    /// ssh option lines passed to rsync
    pub ssh_options: Vec<String>,

    /// Local directory to mirror
    pub dir: PathBuf,

    /// Remote directory override
    pub remote_dir: Option<String>,

    /// Keep the mirrored files
    pub keep: bool,

    /// Payload file
    pub payload: Option<PathBuf>,

    /// Command line, joined with spaces for the remote shell (as `ssh` does)
    pub command: String,
}

impl Config {
    /// Create Config from CLI Args
    pub fn from_args(args: Args) -> Result<Self> {
        validate_args(&args)?;

        Ok(Config {
            host: args.host,
            port: args.port,
            user: args.user,
            password: sanitize_password(args.password),
            key: args.key,
            sudo_password: sanitize_password(args.sudo_password),
            nopasswd_sudo: args.nopasswd_sudo,
            tmpdir: args.tmpdir.filter(|t| !t.is_empty()),
            ssh_options: args.ssh_options,
            dir: args.dir,
            remote_dir: args.remote_dir,
            keep: args.keep,
            payload: args.payload,
            command: args.command.join(" "),
        })
    }

    /// Connection settings, with the key file read from disk
    pub async fn ssh_config(&self) -> Result<SshConfig> {
        let mut ssh_config = SshConfig::new(&self.host, &self.user).with_port(self.port);

        if let Some(ref password) = self.password {
            ssh_config = ssh_config.with_password(password);
        }

        if let Some(ref key_path) = self.key {
            let key_content = tokio::fs::read_to_string(key_path).await?;
            ssh_config = ssh_config.with_private_key(key_content);
        }

        Ok(ssh_config)
    }

    /// Remote command line: `cd` into `dir`, then run the command under sudo
    ///
    /// The command runs through `sh -c` so that all of it is elevated. With
    /// a payload, its path is passed in `SSH_PROVISION_PAYLOAD`.
    pub fn remote_command(
        &self,
        sudo: &Elevation,
        dir: &str,
        payload_path: Option<&str>,
    ) -> Zeroizing<String> {
        let env = payload_path
            .map(|path| format!("env {}={} ", PAYLOAD_ENV, quote(path)))
            .unwrap_or_default();
        let elevated = sudo.command(&format!("{}sh -c {}", env, quote(&self.command)));
        Zeroizing::new(format!("cd {} && {}", quote(dir), elevated.as_str()))
    }

    /// Host descriptor for the driver
    pub fn host_descriptor(&self) -> Host {
        let mut host = Host::new(&self.host)
            .with_ssh_option(format!("User={}", self.user))
            .with_ssh_option(format!("Port={}", self.port))
            .with_nopasswd_sudo(self.nopasswd_sudo);

        for option in &self.ssh_options {
            host = host.with_ssh_option(option);
        }
        if let Some(ref key) = self.key {
            host = host.with_ssh_option(format!("IdentityFile={}", key.display()));
        }
        if let Some(ref password) = self.sudo_password {
            host = host.with_sudo_password(password);
        }
        if let Some(ref tmpdir) = self.tmpdir {
            host = host.with_tmpdir(tmpdir);
        }
        host
    }
}

/// Validate CLI arguments
fn validate_args(args: &Args) -> Result<()> {
    let mut errors = Vec::new();

    if args.host.is_empty() {
        errors.push("Missing required --host".to_string());
    }

    if args.user.is_empty() {
        errors.push("Missing required --user".to_string());
    }

    // Must have either password or key
    if args.password.is_none() && args.key.is_none() {
        errors.push("Must provide either --password or --key".to_string());
    }

    if let Some(ref key_path) = args.key {
        if !key_path.exists() {
            errors.push(format!("SSH key file not found: {}", key_path.display()));
        }
    }

    if !args.dir.is_dir() {
        errors.push(format!("Local directory not found: {}", args.dir.display()));
    }

    if let Some(ref payload) = args.payload {
        if !payload.exists() {
            errors.push(format!("Payload file not found: {}", payload.display()));
        }
    }

    if args.keep && args.remote_dir.is_none() {
        errors.push("--keep requires --remote-dir".to_string());
    }

    if args.command.iter().all(|word| word.is_empty()) {
        errors.push("Missing command to run".to_string());
    }

    if !errors.is_empty() {
        return Err(ProvisionError::Configuration(errors.join("\n")));
    }

    Ok(())
}

/// Sanitize password: return None if empty
fn sanitize_password(password: Option<String>) -> Option<String> {
    password.filter(|p| !p.is_empty())
}
