//! # Container engine CLI runtime.
//!
//! [`DockerCli`] drives `docker` (or any CLI-compatible engine such as `podman`)
//! through `tokio::process`:
//!
//! | Operation            | Command                                               |
//! |----------------------|-------------------------------------------------------|
//! | launch               | `run -d --publish <port> -e K=V --label k=v <image> <cmd..>` |
//! | mapped port          | `port <id> <port>`                                    |
//! | logs                 | `logs <id>`                                           |
//! | state                | `inspect -f '{{.State.Status}} {{.State.ExitCode}}' <id>` |
//! | terminate            | `rm -f -v <id>`                                       |
//!
//! Every exposed port is published to an ephemeral host port. The reachable host
//! is taken from `DOCKER_HOST` when it names a TCP daemon, `localhost` otherwise.

use std::io;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{ReleaseError, ResolutionError, StartError};
use crate::resources::{
    ContainerPort, InstanceRef, InstanceState, ReadinessConfig, ResourceRuntime, RunningInstance, StartSpec, tail,
};

/// Label attached to every container started by this runtime.
pub const MANAGED_LABEL: &str = "depscope.managed";

/// Runtime backed by a container engine CLI.
#[derive(Clone, Debug)]
pub struct DockerCli {
    program: String,
    host: String,
    readiness: ReadinessConfig,
}

impl DockerCli {
    /// Uses `docker`, with the host from `DOCKER_HOST` and readiness settings from
    /// the environment.
    pub fn new() -> Self {
        Self {
            program: "docker".to_string(),
            host: docker_host(std::env::var("DOCKER_HOST").ok().as_deref()),
            readiness: ReadinessConfig::from_env(),
        }
    }

    /// Uses `podman` instead of `docker`.
    pub fn podman() -> Self {
        Self::new().with_program("podman")
    }

    /// Uses another CLI-compatible program.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Overrides the host clients use to reach published ports.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Replaces the readiness settings.
    pub fn with_readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }

    fn run_args(spec: &StartSpec) -> Vec<String> {
        let mut args = vec!["run".to_string(), "-d".to_string()];
        for port in &spec.ports {
            args.push("--publish".to_string());
            args.push(port.to_string());
        }
        for (key, value) in &spec.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push("--label".to_string());
        args.push(format!("{MANAGED_LABEL}=true"));
        for (key, value) in &spec.labels {
            args.push("--label".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(spec.image.clone());
        args.extend(spec.cmd.iter().cloned());
        args
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceRuntime for DockerCli {
    fn name(&self) -> &str {
        &self.program
    }

    fn readiness(&self) -> &ReadinessConfig {
        &self.readiness
    }

    async fn launch(&self, spec: &StartSpec) -> Result<InstanceRef, StartError> {
        let out = exec(&self.program, &Self::run_args(spec))
            .await
            .map_err(|e| StartError::Launch {
                error: format!("{}: {e}", self.program),
            })?;
        if !out.success {
            return Err(classify_run_error(&spec.image, &out.stderr));
        }

        let id = out.stdout.trim().to_string();
        tracing::debug!(image = %spec.image, %id, "container launched");
        Ok(Arc::new(DockerInstance {
            program: self.program.clone(),
            host: self.host.clone(),
            id,
            image: spec.image.clone(),
            ports: spec.ports.clone(),
        }))
    }
}

struct DockerInstance {
    program: String,
    host: String,
    id: String,
    image: String,
    ports: Vec<ContainerPort>,
}

#[async_trait]
impl RunningInstance for DockerInstance {
    fn id(&self) -> &str {
        &self.id
    }

    fn image(&self) -> &str {
        &self.image
    }

    async fn host(&self) -> Result<String, ResolutionError> {
        Ok(self.host.clone())
    }

    async fn mapped_port(&self, port: ContainerPort) -> Result<u16, ResolutionError> {
        if !self.ports.contains(&port) {
            return Err(ResolutionError::PortNotExposed { port: port.to_string() });
        }
        let not_mapped = |detail: String| ResolutionError::PortNotMapped {
            port: port.to_string(),
            detail,
        };

        let out = exec(&self.program, &["port".to_string(), self.id.clone(), port.to_string()])
            .await
            .map_err(|e| not_mapped(e.to_string()))?;
        if !out.success {
            return Err(not_mapped(tail(&out.stderr, 5)));
        }
        parse_port_output(&out.stdout).ok_or_else(|| not_mapped(out.stdout.trim().to_string()))
    }

    async fn logs(&self) -> io::Result<String> {
        let out = exec(&self.program, &["logs".to_string(), self.id.clone()]).await?;
        if !out.success {
            return Err(io::Error::other(tail(&out.stderr, 5)));
        }
        Ok(format!("{}{}", out.stdout, out.stderr))
    }

    async fn state(&self) -> InstanceState {
        let args = [
            "inspect".to_string(),
            "-f".to_string(),
            "{{.State.Status}} {{.State.ExitCode}}".to_string(),
            self.id.clone(),
        ];
        match exec(&self.program, &args).await {
            Ok(out) if out.success => parse_state(&out.stdout),
            _ => InstanceState::Unknown,
        }
    }

    async fn terminate(&self) -> Result<(), ReleaseError> {
        let terminate_err = |error: String| ReleaseError::Terminate {
            id: self.id.clone(),
            error,
        };
        let args = ["rm".to_string(), "-f".to_string(), "-v".to_string(), self.id.clone()];
        let out = exec(&self.program, &args)
            .await
            .map_err(|e| terminate_err(e.to_string()))?;
        if !out.success {
            return Err(terminate_err(tail(&out.stderr, 5)));
        }
        Ok(())
    }
}

struct CliOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

async fn exec(program: &str, args: &[String]) -> io::Result<CliOutput> {
    tracing::trace!(program, ?args, "exec");
    let out = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await?;
    Ok(CliOutput {
        success: out.status.success(),
        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
    })
}

/// Host for published ports: the address of a `tcp://` daemon, else `localhost`.
fn docker_host(docker_host: Option<&str>) -> String {
    docker_host
        .and_then(|v| v.strip_prefix("tcp://"))
        .and_then(|rest| rest.rsplit_once(':').map(|(host, _)| host).or(Some(rest)))
        .filter(|host| !host.is_empty())
        .unwrap_or("localhost")
        .to_string()
}

fn classify_run_error(image: &str, stderr: &str) -> StartError {
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("unable to find image")
        || lower.contains("pull access denied")
        || lower.contains("manifest unknown")
        || lower.contains("repository does not exist")
    {
        StartError::ImageNotFound {
            image: image.to_string(),
        }
    } else if lower.contains("port is already allocated") || lower.contains("address already in use") {
        StartError::PortConflict {
            detail: tail(stderr, 5),
        }
    } else {
        StartError::Launch { error: tail(stderr, 5) }
    }
}

/// First host port in `docker port` output (`0.0.0.0:49153`, `[::]:49153`).
fn parse_port_output(stdout: &str) -> Option<u16> {
    stdout
        .lines()
        .filter_map(|line| line.trim().rsplit_once(':'))
        .find_map(|(_, port)| port.parse().ok())
}

fn parse_state(stdout: &str) -> InstanceState {
    let mut parts = stdout.split_whitespace();
    match (parts.next(), parts.next().and_then(|c| c.parse::<i32>().ok())) {
        (Some("running" | "created" | "restarting" | "paused"), _) => InstanceState::Running,
        (Some("exited" | "dead"), code) => InstanceState::Exited(code),
        _ => InstanceState::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ReadinessWait;

    #[test]
    fn run_args_publish_ports_and_pass_env() {
        let spec = StartSpec::new("nats:2.10")
            .with_port(ContainerPort::tcp(4222))
            .with_env("A", "1")
            .with_label("suite", "it")
            .with_cmd(["--js"])
            .with_wait(ReadinessWait::Immediate);

        let args = DockerCli::run_args(&spec);
        assert_eq!(
            args,
            [
                "run",
                "-d",
                "--publish",
                "4222/tcp",
                "-e",
                "A=1",
                "--label",
                "depscope.managed=true",
                "--label",
                "suite=it",
                "nats:2.10",
                "--js",
            ]
        );
    }

    #[test]
    fn host_comes_from_tcp_docker_host() {
        assert_eq!(docker_host(None), "localhost");
        assert_eq!(docker_host(Some("unix:///var/run/docker.sock")), "localhost");
        assert_eq!(docker_host(Some("tcp://10.0.0.5:2375")), "10.0.0.5");
        assert_eq!(docker_host(Some("tcp://builder")), "builder");
    }

    #[test]
    fn run_errors_are_classified() {
        assert!(matches!(
            classify_run_error("nope:1", "Unable to find image 'nope:1' locally\npull access denied"),
            StartError::ImageNotFound { .. }
        ));
        assert!(matches!(
            classify_run_error("redis", "Bind for 0.0.0.0:6379 failed: port is already allocated"),
            StartError::PortConflict { .. }
        ));
        assert!(matches!(classify_run_error("redis", "daemon not running"), StartError::Launch { .. }));
    }

    #[test]
    fn parses_port_and_state_output() {
        assert_eq!(parse_port_output("0.0.0.0:49153\n[::]:49153\n"), Some(49153));
        assert_eq!(parse_port_output(""), None);
        assert_eq!(parse_state("running 0\n"), InstanceState::Running);
        assert_eq!(parse_state("exited 137\n"), InstanceState::Exited(Some(137)));
        assert_eq!(parse_state("weird"), InstanceState::Unknown);
    }
}
