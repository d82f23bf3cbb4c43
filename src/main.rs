//! ssh-provision - Entry point
//!
//! Parses CLI arguments, connects to the host, mirrors the local directory
//! into the remote workspace and runs the command there under sudo. The
//! command's exit status and signal are printed to stdout as JSON and the
//! process exits with the remote status.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ssh_provision::config::{Args, Config};
use ssh_provision::error::Result;
use ssh_provision::ssh::{ExecResult, RemoteDriver, SshConnection};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_args(args)?;

    info!("ssh-provision v{} starting...", env!("CARGO_PKG_VERSION"));

    let payload = match config.payload {
        Some(ref path) => {
            let text = tokio::fs::read_to_string(path).await?;
            Some(serde_json::from_str::<serde_json::Value>(&text)?)
        }
        None => None,
    };

    let conn = Arc::new(SshConnection::connect(&config.ssh_config().await?).await?);
    let driver = RemoteDriver::new(config.host_descriptor(), conn.clone())
        .with_base_dir(&config.dir)
        .with_keep_synced_files(config.keep);

    let outcome = driver
        .with_workspace(|| {
            driver.deploy(config.remote_dir.as_deref(), || async {
                match payload {
                    Some(ref payload) => {
                        driver
                            .with_payload(payload, |path| {
                                run_elevated(&driver, &config, Some(path))
                            })
                            .await
                    }
                    None => run_elevated(&driver, &config, None).await,
                }
            })
        })
        .await;

    conn.close().await;

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            error!("{}", e);
            return Err(e);
        }
    };

    println!("{}", serde_json::to_string(&result)?);

    let code = match (result.exit_status, &result.exit_signal) {
        (Some(status), None) => i32::try_from(status).unwrap_or(1),
        _ => 1,
    };
    if code != 0 {
        info!("Remote command did not succeed, exiting with {}", code);
    }
    std::process::exit(code);
}

/// Run the configured command in the deploy directory under sudo
async fn run_elevated(
    driver: &RemoteDriver,
    config: &Config,
    payload_path: Option<String>,
) -> Result<ExecResult> {
    let dir = driver.deploy_dir().await?;

    driver
        .with_elevation(|sudo| async move {
            let command = config.remote_command(&sudo, &dir, payload_path.as_deref());
            driver.execute(&command, false, None).await
        })
        .await
}
