//! Process runner
//!
//! Runs one client invocation with stdout and stderr merged into a single
//! line stream. On unix both are the write end of one OS pipe, so lines keep
//! the order the child wrote them in. A reader task forwards lines into a
//! channel; one drain task echoes them to the console and appends them to the
//! transcript while the caller waits for exit under a timeout. The drain is
//! joined with its own bound, so a grandchild holding the pipe open cannot
//! hang the run.

use std::collections::BTreeMap;
#[cfg(unix)]
use std::os::fd::OwnedFd;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
#[cfg(unix)]
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::common::config::Config;
use crate::common::Error;

use super::step::{Exit, Step, StepResult};

/// Anything that can execute a step
///
/// The sequencer only talks to this trait, so plans can be exercised with a
/// scripted runner instead of real subprocesses.
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn run(&self, step: &Step) -> StepResult;
}

/// How the client binary is invoked: `<program> <args...> <step command...>`
#[derive(Debug, Clone)]
pub struct ClientCommand {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
    /// Applied over the ambient environment, below each step's overlay
    pub env: BTreeMap<String, String>,
}

impl ClientCommand {
    /// Invoke `program` directly with no prefix arguments or base environment
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
            env: BTreeMap::new(),
        }
    }

    /// Add prefix arguments placed before every step command
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Runs steps as real child processes
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    client: ClientCommand,
    step_timeout: Duration,
    drain_join: Duration,
    echo: bool,
}

impl ProcessRunner {
    pub fn new(client: ClientCommand, step_timeout: Duration) -> Self {
        Self {
            client,
            step_timeout,
            drain_join: Duration::from_secs(2),
            echo: true,
        }
    }

    /// Build a runner from the `[client]` and `[timeouts]` sections
    pub fn from_config(config: &Config) -> Self {
        let client = ClientCommand {
            program: config.client.program.clone(),
            args: config.client.args.clone(),
            workdir: config.client.workdir.clone(),
            env: config.client.env.clone(),
        };
        Self::new(client, Duration::from_secs(config.timeouts.step_secs))
            .with_drain_join(Duration::from_secs(config.timeouts.drain_join_secs))
    }

    /// Bound on joining the output drain after exit or kill
    pub fn with_drain_join(mut self, drain_join: Duration) -> Self {
        self.drain_join = drain_join;
        self
    }

    /// Disable echoing child output to stdout (it is still captured)
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Run the client with the given subcommand tokens and environment overlay
    pub async fn run_command(&self, command: &[String], env: &BTreeMap<String, String>) -> StepResult {
        let started = Instant::now();
        let program = &self.client.program;

        let mut cmd = Command::new(program);
        cmd.args(&self.client.args)
            .args(command)
            .envs(&self.client.env)
            .envs(env)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(dir) = &self.client.workdir {
            cmd.current_dir(dir);
        }
        // Own process group so a timeout can take down grandchildren too
        #[cfg(unix)]
        cmd.process_group(0);

        tracing::debug!(
            program = %program,
            args = ?self.client.args,
            command = ?command,
            env_keys = ?env.keys().collect::<Vec<_>>(),
            "spawning client"
        );

        #[cfg(unix)]
        let merged = match merged_output(&mut cmd) {
            Ok(receiver) => receiver,
            Err(e) => return launch_failed(program, e, started),
        };
        #[cfg(not(unix))]
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let spawned = cmd.spawn();
        // The builder still holds the pipe's write ends; EOF needs them closed
        drop(cmd);
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => return launch_failed(program, e, started),
        };

        let transcript = Transcript::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        #[cfg(unix)]
        readers.push(tokio::spawn(forward_lines(merged, tx.clone())));
        #[cfg(not(unix))]
        {
            if let Some(stdout) = child.stdout.take() {
                readers.push(tokio::spawn(forward_lines(stdout, tx.clone())));
            }
            if let Some(stderr) = child.stderr.take() {
                readers.push(tokio::spawn(forward_lines(stderr, tx.clone())));
            }
        }
        drop(tx);
        let drain = tokio::spawn(drain_lines(rx, transcript.clone(), self.echo));

        let waited = timeout(self.step_timeout, child.wait()).await;
        let exit = match waited {
            Ok(Ok(status)) => Exit::from_status(status),
            Ok(Err(e)) => {
                tracing::warn!("failed to wait for '{}': {}", program, e);
                kill_process_tree(&mut child).await;
                Exit::Signaled { signal: None }
            }
            Err(_) => {
                let secs = self.step_timeout.as_secs();
                tracing::warn!("{}; killing '{}'", Error::Timeout(secs), program);
                kill_process_tree(&mut child).await;
                Exit::TimedOut { secs }
            }
        };

        self.join_drain(drain, readers).await;

        let mut output = transcript.take();
        if let Exit::TimedOut { secs } = exit {
            output.push_str(&format!("\ncommand timed out ({}s)", secs));
        }

        let elapsed = started.elapsed();
        tracing::debug!(code = exit.code(), elapsed = ?elapsed, "client finished");

        StepResult {
            exit,
            output,
            elapsed,
        }
    }

    /// Wait for the drain to finish, abandoning it (and the readers) past the bound
    async fn join_drain(&self, mut drain: JoinHandle<()>, readers: Vec<JoinHandle<()>>) {
        match timeout(self.drain_join, &mut drain).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("output drain task failed: {}", e),
            Err(_) => {
                tracing::warn!(
                    "output still open {:?} after exit; abandoning drain",
                    self.drain_join
                );
                drain.abort();
            }
        }
        for reader in readers {
            reader.abort();
        }
    }
}

#[async_trait]
impl StepRunner for ProcessRunner {
    async fn run(&self, step: &Step) -> StepResult {
        self.run_command(&step.command, &step.env).await
    }
}

fn launch_failed(program: &str, error: std::io::Error, started: Instant) -> StepResult {
    let message = Error::launch(program, error).to_string();
    tracing::warn!("{}", message);
    StepResult {
        output: format!("{}\n", message),
        exit: Exit::LaunchFailed { message },
        elapsed: started.elapsed(),
    }
}

/// Point the child's stdout and stderr at one pipe and return its read end
#[cfg(unix)]
fn merged_output(cmd: &mut Command) -> std::io::Result<pipe::Receiver> {
    let (reader, writer) = std::io::pipe()?;
    cmd.stdout(writer.try_clone()?).stderr(writer);
    pipe::Receiver::from_owned_fd(OwnedFd::from(reader))
}

/// Captured output shared between the drain task and the caller
///
/// The drain task is the only writer. The caller reads it after the drain
/// has been joined or abandoned, so text captured before an abandonment is
/// still returned.
#[derive(Debug, Clone, Default)]
struct Transcript(Arc<Mutex<String>>);

impl Transcript {
    fn push_line(&self, line: &str) {
        let mut text = self.0.lock().unwrap_or_else(|e| e.into_inner());
        text.push_str(line);
        text.push('\n');
    }

    fn take(&self) -> String {
        let mut text = self.0.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *text)
    }
}

/// Forward each line of `reader` into the channel until EOF
async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                if tx.send(line).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!("client output stream closed: {}", e);
                break;
            }
        }
    }
}

/// Echo and record lines in arrival order until every sender is gone
async fn drain_lines(mut rx: mpsc::UnboundedReceiver<String>, transcript: Transcript, echo: bool) {
    while let Some(line) = rx.recv().await {
        if echo {
            println!("{}", line);
        }
        transcript.push_line(&line);
    }
}

/// Kill the child and everything in its process group, then reap it
async fn kill_process_tree(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // Negative pid addresses the whole group created by process_group(0)
        let rc = unsafe { libc::kill(-(pid as i32), libc::SIGKILL) };
        if rc != 0 {
            tracing::debug!(
                "killpg({}) failed: {}",
                pid,
                std::io::Error::last_os_error()
            );
        }
    }

    if let Err(e) = child.kill().await {
        tracing::warn!("failed to kill client: {}", e);
    }
}
