//! Privilege elevation through a sudo askpass relay
//!
//! The sudo password never reaches the remote host in plaintext. Instead:
//! - the password is encrypted locally under a fresh random passphrase
//! - a tiny askpass helper holding only the ciphertext is written to a
//!   remote temp file (mode 0700)
//! - commands run as `NAME=<passphrase> SUDO_ASKPASS=<helper> sudo -A ...`,
//!   so sudo asks the helper, which decrypts with the passphrase from its
//!   environment
//! - the helper is shredded when the caller's continuation returns

use std::future::Future;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use tracing::debug;
use zeroize::Zeroizing;

use super::cipher;
use super::driver::RemoteDriver;
use super::guard::ensure;
use super::shell::quote;
use super::transport::StdinPayload;
use crate::error::{ProvisionError, Result};

/// Prefix of the environment variable carrying the passphrase
pub const PASSPHRASE_ENV_PREFIX: &str = "ASKPASS_KEY_";

/// Random bytes behind each passphrase
const PASSPHRASE_BYTES: usize = 129;

/// Elevated invocation of sudo, relying on `SUDO_ASKPASS`
const SUDO: &str = "sudo -A ";

/// sudo for NOPASSWD hosts; fails instead of prompting
const SUDO_NOPASSWD: &str = "sudo -n ";

/// Shell fragments handed to the continuation of
/// [`with_elevation`](RemoteDriver::with_elevation)
///
/// All three are empty when the host has passwordless sudo.
pub struct Elevation {
    prefix: Zeroizing<String>,
    exports: Zeroizing<String>,
    bare: String,
}

impl Elevation {
    fn passwordless() -> Self {
        Self {
            prefix: Zeroizing::new(String::new()),
            exports: Zeroizing::new(String::new()),
            bare: String::new(),
        }
    }

    /// Self-contained prefix: prepend to a command to run it under sudo
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `export` statements to source once per shell session
    pub fn exports(&self) -> &str {
        &self.exports
    }

    /// Just the sudo invocation; needs [`exports`](Self::exports) to have run
    pub fn bare(&self) -> &str {
        &self.bare
    }

    /// `command` run under sudo
    ///
    /// Prefixed with [`prefix`](Self::prefix), or with `sudo -n` when the
    /// fragments are empty because the host has passwordless sudo.
    pub fn command(&self, command: &str) -> Zeroizing<String> {
        let sudo = if self.is_passwordless() {
            SUDO_NOPASSWD
        } else {
            self.prefix.as_str()
        };
        Zeroizing::new(format!("{}{}", sudo, command))
    }

    /// Whether the fragments are empty (passwordless sudo)
    pub fn is_passwordless(&self) -> bool {
        self.prefix.is_empty()
    }
}

impl std::fmt::Debug for Elevation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Elevation")
            .field("passwordless", &self.is_passwordless())
            .field("bare", &self.bare)
            .finish_non_exhaustive()
    }
}

/// Ephemeral secrets for one relay invocation, bound to its remote helper
struct EscalationSession {
    passphrase: Zeroizing<String>,
    env_name: String,
    ciphertext: String,
    helper: String,
}

impl EscalationSession {
    fn new(password: &str, helper: String) -> Self {
        let mut raw = Zeroizing::new(vec![0u8; PASSPHRASE_BYTES]);
        rand::thread_rng().fill_bytes(raw.as_mut_slice());
        let passphrase = Zeroizing::new(STANDARD.encode(raw.as_slice()));

        let env_name = format!(
            "{}{}",
            PASSPHRASE_ENV_PREFIX,
            hex::encode_upper(rand::random::<[u8; 8]>())
        );
        let ciphertext = cipher::encrypt(password, &passphrase);

        Self {
            passphrase,
            env_name,
            ciphertext,
            helper,
        }
    }

    /// Askpass helper: decrypt the embedded ciphertext, print the password
    fn helper_script(&self) -> String {
        format!(
            "#!/bin/bash\nexec {} <<< {}\n",
            cipher::decrypt_command(&self.env_name),
            quote(&self.ciphertext)
        )
    }

    fn elevation(&self) -> Elevation {
        let passphrase = Zeroizing::new(quote(&self.passphrase));
        let helper = quote(&self.helper);

        Elevation {
            prefix: Zeroizing::new(format!(
                "{}={} SUDO_ASKPASS={} {}",
                self.env_name,
                passphrase.as_str(),
                helper,
                SUDO
            )),
            exports: Zeroizing::new(format!(
                "export {}={}\nexport SUDO_ASKPASS={}\n",
                self.env_name,
                passphrase.as_str(),
                helper
            )),
            bare: SUDO.to_string(),
        }
    }
}

impl RemoteDriver {
    /// Run `f` with sudo fragments for this host
    ///
    /// With passwordless sudo, `f` receives empty fragments and nothing is
    /// created remotely. Otherwise an askpass helper is set up first and
    /// shredded after `f` returns, whether it succeeded or not.
    ///
    /// # Errors
    /// * `ProvisionError::Configuration` - no sudo password and sudo is not passwordless
    /// * `ProvisionError::Workspace` - `mktemp` did not print an absolute path
    /// * `ProvisionError::ExecutionFailed` - setting up or shredding the helper failed
    /// * whatever `f` returns
    pub async fn with_elevation<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Elevation) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.host.nopasswd_sudo {
            debug!("Passwordless sudo on {}", self.host.name);
            return f(Elevation::passwordless()).await;
        }

        let password = self.host.sudo_password().ok_or_else(|| {
            ProvisionError::config(format!("sudo password not present for {}", self.host.name))
        })?;

        let output = self.conn.capture("mktemp").await?;
        let helper = output.trim_end().to_string();
        if !helper.starts_with('/') || helper.contains('\n') {
            return Err(ProvisionError::Workspace {
                command: "mktemp".to_string(),
                output,
            });
        }

        let session = EscalationSession::new(password, helper);

        let body = async {
            self.install_helper(&session).await?;
            f(session.elevation()).await
        };

        ensure(body, self.erase_helper(&session.helper)).await
    }

    async fn install_helper(&self, session: &EscalationSession) -> Result<()> {
        let path = quote(&session.helper);
        let command = format!(
            "chmod 0700 {path} && cat > {path} && chmod +x {path}",
            path = path
        );
        let mut script = StdinPayload::new(session.helper_script());
        self.execute(&command, true, Some(&mut script)).await?;
        Ok(())
    }

    async fn erase_helper(&self, helper: &str) -> Result<()> {
        self.execute(&format!("shred --remove {}", quote(helper)), true, None)
            .await?;
        Ok(())
    }
}
