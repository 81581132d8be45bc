//! # Local process runtime.
//!
//! [`ProcessRuntime`] treats `spec.image` as a program and `spec.cmd` as its
//! arguments. Output is captured (stdout and stderr interleaved line by line) so
//! log readiness waits work exactly as with containers. Exposed ports map to
//! themselves on `127.0.0.1`: the program is expected to listen on them.
//!
//! ```text
//! launch(spec) ─► Command(image).args(cmd).envs(env)   (kill_on_drop)
//!                   ├─ stdout ─► forwarder ─┐
//!                   └─ stderr ─► forwarder ─┴─► captured output (logs())
//! ```

use std::io;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::error::{ReleaseError, ResolutionError, StartError};
use crate::resources::{ContainerPort, InstanceRef, InstanceState, ReadinessConfig, ResourceRuntime, RunningInstance, StartSpec};

const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Runtime launching local programs.
#[derive(Clone, Debug)]
pub struct ProcessRuntime {
    readiness: ReadinessConfig,
}

impl ProcessRuntime {
    /// Creates a runtime with readiness settings from the environment.
    pub fn new() -> Self {
        Self {
            readiness: ReadinessConfig::from_env(),
        }
    }

    /// Replaces the readiness settings.
    pub fn with_readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }
}

impl Default for ProcessRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceRuntime for ProcessRuntime {
    fn name(&self) -> &str {
        "process"
    }

    fn readiness(&self) -> &ReadinessConfig {
        &self.readiness
    }

    async fn launch(&self, spec: &StartSpec) -> Result<InstanceRef, StartError> {
        let mut child = Command::new(&spec.image)
            .args(&spec.cmd)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => StartError::ImageNotFound {
                    image: spec.image.clone(),
                },
                _ => StartError::Launch { error: e.to_string() },
            })?;

        let id = child
            .id()
            .map(|pid| pid.to_string())
            .unwrap_or_else(|| "exited".to_string());
        tracing::debug!(program = %spec.image, %id, "process launched");

        let output = Arc::new(Mutex::new(String::new()));
        let mut forwarders = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(forward(stdout, Arc::clone(&output), id.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(forward(stderr, Arc::clone(&output), id.clone()));
        }

        Ok(Arc::new(ProcessInstance {
            id,
            image: spec.image.clone(),
            ports: spec.ports.clone(),
            child: tokio::sync::Mutex::new(child),
            output,
            forwarders: tokio::sync::Mutex::new(forwarders),
        }))
    }
}

/// Appends every line read from `stream` to `output` until EOF.
fn forward<R>(stream: R, output: Arc<Mutex<String>>, id: String) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::trace!(pid = %id, "{line}");
            let mut out = output.lock();
            out.push_str(&line);
            out.push('\n');
        }
    })
}

struct ProcessInstance {
    id: String,
    image: String,
    ports: Vec<ContainerPort>,
    child: tokio::sync::Mutex<Child>,
    output: Arc<Mutex<String>>,
    forwarders: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl ProcessInstance {
    /// Waits (bounded) for the output forwarders to hit EOF after the process exited.
    async fn flush_output(&self) {
        let handles: Vec<_> = self.forwarders.lock().await.drain(..).collect();
        for handle in handles {
            let _ = tokio::time::timeout(FLUSH_TIMEOUT, handle).await;
        }
    }
}

#[async_trait]
impl RunningInstance for ProcessInstance {
    fn id(&self) -> &str {
        &self.id
    }

    fn image(&self) -> &str {
        &self.image
    }

    async fn host(&self) -> Result<String, ResolutionError> {
        Ok("127.0.0.1".to_string())
    }

    async fn mapped_port(&self, port: ContainerPort) -> Result<u16, ResolutionError> {
        if self.ports.contains(&port) {
            Ok(port.number())
        } else {
            Err(ResolutionError::PortNotExposed { port: port.to_string() })
        }
    }

    async fn logs(&self) -> io::Result<String> {
        Ok(self.output.lock().clone())
    }

    async fn state(&self) -> InstanceState {
        let polled = self.child.lock().await.try_wait();
        match polled {
            Ok(Some(status)) => {
                self.flush_output().await;
                InstanceState::Exited(status.code())
            }
            Ok(None) => InstanceState::Running,
            Err(_) => InstanceState::Unknown,
        }
    }

    async fn terminate(&self) -> Result<(), ReleaseError> {
        let mut child = self.child.lock().await;
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }
        child.kill().await.map_err(|e| ReleaseError::Terminate {
            id: self.id.clone(),
            error: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::PollPolicy;
    use crate::resources::ReadinessWait;

    fn runtime(timeout: Duration) -> ProcessRuntime {
        ProcessRuntime::new().with_readiness(ReadinessConfig {
            timeout,
            poll: PollPolicy::constant(Duration::from_millis(10)),
            probe_timeout: Duration::from_millis(200),
        })
    }

    fn shell(script: &str) -> StartSpec {
        StartSpec::new("sh").with_cmd(["-c", script])
    }

    #[tokio::test]
    async fn waits_for_log_line_then_terminates() {
        let spec = shell("echo booting; echo 'Ready to accept connections'; exec sleep 30")
            .with_wait(ReadinessWait::log("Ready to accept connections"));

        let instance = runtime(Duration::from_secs(5)).start(&spec).await.expect("ready");
        assert_eq!(instance.state().await, InstanceState::Running);
        assert!(instance.logs().await.expect("logs").contains("booting"));

        instance.terminate().await.expect("killed");
        assert!(matches!(instance.state().await, InstanceState::Exited(_)));
    }

    #[tokio::test]
    async fn missing_program_is_image_not_found() {
        let spec = StartSpec::new("depscope-no-such-program");
        let err = runtime(Duration::from_secs(1)).start(&spec).await.err().expect("launch fails");
        assert!(matches!(err, StartError::ImageNotFound { ref image } if image == "depscope-no-such-program"));
    }

    #[tokio::test]
    async fn early_exit_is_reported_with_output() {
        let spec = shell("echo 'fatal: config missing' >&2; exit 7").with_wait(ReadinessWait::log("never"));
        let err = runtime(Duration::from_secs(5)).start(&spec).await.err().expect("exits");
        match err {
            StartError::Exited { status, detail } => {
                assert_eq!(status, Some(7));
                assert!(detail.contains("config missing"), "{detail}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn ports_map_to_themselves() {
        let spec = shell("exec sleep 30").with_port(18080u16);
        let instance = runtime(Duration::from_secs(1)).launch(&spec).await.expect("launched");

        assert_eq!(instance.mapped_port(ContainerPort::tcp(18080)).await.ok(), Some(18080));
        assert!(matches!(
            instance.mapped_port(ContainerPort::tcp(1)).await,
            Err(ResolutionError::PortNotExposed { .. })
        ));
        instance.terminate().await.expect("killed");
    }
}
