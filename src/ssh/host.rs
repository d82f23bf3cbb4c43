//! Host descriptor
//!
//! Read-only description of the machine the driver works against.

use secrecy::{ExposeSecret, SecretString};

/// Remote host as seen by the driver
pub struct Host {
    /// Display name used in logs and errors
    pub name: String,

    /// Hostname handed to rsync (`hostname:dir`)
    pub hostname: String,

    /// OpenSSH `Key=Value` option lines for the rsync transport wrapper
    pub ssh_options: Vec<String>,

    /// Password for `sudo`
    sudo_password: Option<SecretString>,

    /// `sudo` is configured with NOPASSWD for this user
    pub nopasswd_sudo: bool,

    /// Overrides `TMPDIR` for the remote workspace
    pub tmpdir: Option<String>,
}

impl Host {
    /// Create a host descriptor; the display name defaults to the hostname
    pub fn new(hostname: impl Into<String>) -> Self {
        let hostname = hostname.into();
        Self {
            name: hostname.clone(),
            hostname,
            ssh_options: Vec::new(),
            sudo_password: None,
            nopasswd_sudo: false,
            tmpdir: None,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add an OpenSSH option line, e.g. `Port=2222`
    pub fn with_ssh_option(mut self, option: impl Into<String>) -> Self {
        self.ssh_options.push(option.into());
        self
    }

    /// Set the sudo password
    pub fn with_sudo_password(mut self, password: impl Into<String>) -> Self {
        let password: String = password.into();
        self.sudo_password = Some(SecretString::new(password.into_boxed_str()));
        self
    }

    /// Mark sudo as passwordless
    pub fn with_nopasswd_sudo(mut self, nopasswd: bool) -> Self {
        self.nopasswd_sudo = nopasswd;
        self
    }

    /// Set the remote temp root
    pub fn with_tmpdir(mut self, tmpdir: impl Into<String>) -> Self {
        self.tmpdir = Some(tmpdir.into());
        self
    }

    /// The sudo password, if configured
    pub fn sudo_password(&self) -> Option<&str> {
        self.sudo_password.as_ref().map(|p| p.expose_secret())
    }

    /// `ssh -o "Opt=val" ...`, used as rsync's `--rsh`
    pub fn ssh_command(&self) -> String {
        ssh_command(&self.ssh_options)
    }
}

/// Build the `ssh` wrapper command line from option lines.
pub fn ssh_command(options: &[String]) -> String {
    std::iter::once("ssh".to_string())
        .chain(
            options
                .iter()
                .flat_map(|line| ["-o".to_string(), format!("\"{}\"", line)]),
        )
        .collect::<Vec<_>>()
        .join(" ")
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("name", &self.name)
            .field("hostname", &self.hostname)
            .field("ssh_options", &self.ssh_options)
            .field(
                "sudo_password",
                &self.sudo_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("nopasswd_sudo", &self.nopasswd_sudo)
            .field("tmpdir", &self.tmpdir)
            .finish()
    }
}
