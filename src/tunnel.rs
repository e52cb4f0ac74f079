//! SSH port-forward for the operational store.
//!
//! The MySQL operational store is only reachable through a bastion host. A
//! tunnel is a child `ssh -N -L` process forwarding a local port to the
//! database; it lives for one fetch and is killed afterwards (or when the
//! handle is dropped).

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::config::SshConfig;
use crate::error::SourceError;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct SshTunnel {
    child: Child,
    local_port: u16,
}

impl SshTunnel {
    /// Spawn `ssh` and wait until the forwarded local port accepts connections.
    pub async fn open(
        ssh: &SshConfig,
        remote_host: &str,
        remote_port: u16,
    ) -> Result<Self, SourceError> {
        if port_accepts(ssh.local_port).await {
            return Err(SourceError::Tunnel(format!(
                "local port {} is already in use",
                ssh.local_port
            )));
        }

        let forward = format!("{}:{}:{}", ssh.local_port, remote_host, remote_port);
        let destination = format!("{}@{}", ssh.user, ssh.host);
        let port = ssh.port.to_string();

        let mut child = Command::new("ssh")
            .args([
                "-N",
                "-o",
                "ExitOnForwardFailure=yes",
                "-o",
                "BatchMode=yes",
                "-o",
                "StrictHostKeyChecking=accept-new",
                "-p",
                port.as_str(),
                "-L",
                forward.as_str(),
                "-i",
            ])
            .arg(&ssh.key_path)
            .arg(&destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SourceError::Tunnel(format!("failed to run ssh: {}", e)))?;

        let deadline = Instant::now() + Duration::from_secs(ssh.ready_timeout_secs);
        loop {
            ensure_running(&mut child).await?;

            if port_accepts(ssh.local_port).await {
                // The listener must be ssh's own forward, not a process that
                // grabbed the port while ssh was failing to bind it.
                sleep(POLL_INTERVAL).await;
                ensure_running(&mut child).await?;
                break;
            }

            if Instant::now() >= deadline {
                let _ = child.kill().await;
                return Err(SourceError::Tunnel(format!(
                    "local port {} not ready after {}s",
                    ssh.local_port, ssh.ready_timeout_secs
                )));
            }
            sleep(POLL_INTERVAL).await;
        }

        debug!(
            bastion = %ssh.host,
            local_port = ssh.local_port,
            remote = %format!("{}:{}", remote_host, remote_port),
            "ssh tunnel ready"
        );

        Ok(Self {
            child,
            local_port: ssh.local_port,
        })
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Terminate the ssh process.
    pub async fn close(mut self) {
        if let Err(e) = self.child.kill().await {
            debug!(error = %e, "ssh tunnel already stopped");
        }
    }
}

async fn port_accepts(port: u16) -> bool {
    TcpStream::connect(("127.0.0.1", port)).await.is_ok()
}

/// Fail with the child's stderr if it has already exited.
async fn ensure_running(child: &mut Child) -> Result<(), SourceError> {
    let exited = child
        .try_wait()
        .map_err(|e| SourceError::Tunnel(format!("failed to poll ssh: {}", e)))?;
    let Some(status) = exited else {
        return Ok(());
    };

    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        let _ = pipe.read_to_string(&mut stderr).await;
    }
    Err(SourceError::Tunnel(format!(
        "ssh exited with {}: {}",
        status,
        stderr.trim()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ssh_config(local_port: u16) -> SshConfig {
        SshConfig {
            host: "bastion.invalid".to_string(),
            user: "ubuntu".to_string(),
            key_path: PathBuf::from("/nonexistent/key.pem"),
            port: 22,
            local_port,
            ready_timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn test_occupied_local_port_rejected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let err = SshTunnel::open(&ssh_config(port), "mysql.internal", 3306)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::Tunnel(ref m) if m.contains("already in use")));
    }

    #[tokio::test]
    async fn test_exited_child_reports_stderr() {
        let mut child = Command::new("sh")
            .args(["-c", "echo 'bind: Address already in use' >&2; exit 255"])
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        child.wait().await.unwrap();

        let err = ensure_running(&mut child).await.unwrap_err();
        assert!(matches!(err, SourceError::Tunnel(ref m) if m.contains("Address already in use")));
    }

    #[tokio::test]
    async fn test_running_child_passes() {
        let mut child = Command::new("sh")
            .args(["-c", "sleep 5"])
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        assert!(ensure_running(&mut child).await.is_ok());
    }
}
