use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tankd_control::{Params, State, StatusEvent, StatusMessage, StatusReader};
use tracing::{info, warn};

use crate::error::SupervisorError;

/// Why the instance is in its current running/stopped condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunReason {
    NeverStarted,
    Started,
    Stopped,
    Crashed,
}

/// Condition report for the supervised instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    /// Unix seconds of the last condition change, `None` before the first
    /// start.
    pub since: Option<u64>,
    pub reason: RunReason,
    /// Diagnostic text; non-empty after a crash.
    pub info: Option<String>,
}

impl RunInfo {
    fn never_started() -> Self {
        Self {
            since: None,
            reason: RunReason::NeverStarted,
            info: None,
        }
    }
}

/// Live mirror of the child's `(Params, State)`, fed by the side-channel.
/// Both are `None` while no child runs or before it has reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mirror {
    pub params: Option<Params>,
    pub state: Option<State>,
}

/// How to launch the control-loop child. The four param values are appended
/// as trailing arguments, so tests can substitute a shell script for the
/// real binary.
#[derive(Debug, Clone)]
pub struct ChildCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ChildCommand {
    /// The production child: this executable's own `core` subcommand.
    pub fn current_exe_core() -> std::io::Result<Self> {
        Ok(Self {
            program: std::env::current_exe()?,
            args: vec!["core".to_string()],
        })
    }

    fn build(&self, params: &Params) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(params.low.to_string())
            .arg(params.high.to_string())
            .arg(params.fan_retain.to_string())
            .arg(params.tick_time.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group, so a ctrl-c aimed at the supervisor does
            // not also reach the child.
            command.process_group(0);
        }
        command
    }
}

struct Workers {
    stdout: JoinHandle<()>,
    status: JoinHandle<()>,
}

struct Inner {
    running: bool,
    stopping: bool,
    run_info: RunInfo,
    child_pid: Option<u32>,
    workers: Option<Workers>,
    watchdog: Option<JoinHandle<()>>,
}

/// One supervised control-loop instance.
///
/// Created once at supervisor start. `start` spawns the child plus three
/// workers; `stop` and crash detection tear them down and clear the mirror.
pub struct Instance {
    command: ChildCommand,
    inner: Arc<Mutex<Inner>>,
    mirror: Arc<Mutex<Mirror>>,
    /// Side-channel text that was not a well-formed status message. A
    /// crashing child's panic output lands here and becomes `RunInfo.info`.
    reject: Arc<Mutex<String>>,
}

impl Instance {
    pub fn new(command: ChildCommand) -> Self {
        Self {
            command,
            inner: Arc::new(Mutex::new(Inner {
                running: false,
                stopping: false,
                run_info: RunInfo::never_started(),
                child_pid: None,
                workers: None,
                watchdog: None,
            })),
            mirror: Arc::new(Mutex::new(Mirror::default())),
            reject: Arc::new(Mutex::new(String::new())),
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner).running
    }

    /// `(running, run_info)` as one consistent pair.
    pub fn status(&self) -> (bool, RunInfo) {
        let inner = lock(&self.inner);
        (inner.running, inner.run_info.clone())
    }

    /// A deep copy of the live mirror; the lock is never held during reply
    /// serialization.
    pub fn live_mirror(&self) -> Mirror {
        lock(&self.mirror).clone()
    }

    /// Spawn the child with the given params and start the three workers.
    pub fn start(&self, params: &Params) -> Result<(), SupervisorError> {
        let mut inner = lock(&self.inner);
        if inner.running {
            return Err(SupervisorError::AlreadyRunning);
        }

        let mut child = self
            .command
            .build(params)
            .spawn()
            .map_err(SupervisorError::Spawn)?;
        let pid = child.id();

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                return Err(SupervisorError::Spawn(std::io::Error::other(
                    "child stdout was not captured",
                )));
            }
        };
        let stderr = match child.stderr.take() {
            Some(stderr) => stderr,
            None => {
                let _ = child.kill();
                return Err(SupervisorError::Spawn(std::io::Error::other(
                    "child stderr was not captured",
                )));
            }
        };

        *lock(&self.mirror) = Mirror::default();
        lock(&self.reject).clear();

        let stdout_worker = std::thread::spawn(move || relay_stdout(stdout));
        let status_worker = {
            let mirror = Arc::clone(&self.mirror);
            let reject = Arc::clone(&self.reject);
            std::thread::spawn(move || follow_status(stderr, &mirror, &reject))
        };
        let watchdog = {
            let inner = Arc::clone(&self.inner);
            let mirror = Arc::clone(&self.mirror);
            let reject = Arc::clone(&self.reject);
            std::thread::spawn(move || watchdog(child, &inner, &mirror, &reject))
        };

        inner.running = true;
        inner.stopping = false;
        inner.child_pid = Some(pid);
        inner.workers = Some(Workers {
            stdout: stdout_worker,
            status: status_worker,
        });
        inner.watchdog = Some(watchdog);
        inner.run_info = RunInfo {
            since: Some(unix_time_now()),
            reason: RunReason::Started,
            info: None,
        };

        info!(pid, "control loop child started");
        Ok(())
    }

    /// Send the child a graceful-termination signal, wait for it to exit,
    /// join all three workers and clear the mirror. Blocks unboundedly on a
    /// child that refuses to die — the same stall a hung peripheral service
    /// causes inside the child itself.
    pub fn stop(&self) -> Result<(), SupervisorError> {
        let (pid, watchdog, workers) = {
            let mut inner = lock(&self.inner);
            if !inner.running {
                return Err(SupervisorError::NotRunning);
            }
            inner.stopping = true;
            (
                inner.child_pid,
                inner.watchdog.take(),
                inner.workers.take(),
            )
        };

        if let Some(pid) = pid {
            info!(pid, "stopping control loop child");
            if let Err(err) = send_sigterm(pid) {
                // Already gone is fine; the watchdog observed its exit.
                warn!(pid, %err, "termination signal failed");
            }
        }

        if let Some(watchdog) = watchdog {
            let _ = watchdog.join();
        }
        if let Some(workers) = workers {
            let _ = workers.stdout.join();
            let _ = workers.status.join();
        }

        *lock(&self.mirror) = Mirror::default();

        let mut inner = lock(&self.inner);
        inner.running = false;
        inner.stopping = false;
        inner.child_pid = None;
        inner.run_info = RunInfo {
            since: Some(unix_time_now()),
            reason: RunReason::Stopped,
            info: None,
        };

        info!("control loop child stopped");
        Ok(())
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}

/// Relay the child's stdout line-by-line into the supervisor log.
fn relay_stdout(stdout: std::process::ChildStdout) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        match line {
            Ok(line) => info!("core: {line}"),
            Err(err) => {
                warn!(%err, "stdout relay failed");
                break;
            }
        }
    }
}

/// Follow the side-channel: update the mirror on status messages, accumulate
/// everything else as diagnostics. Ends when the pipe closes.
fn follow_status(
    stderr: std::process::ChildStderr,
    mirror: &Arc<Mutex<Mirror>>,
    reject: &Arc<Mutex<String>>,
) {
    let mut reader = StatusReader::new(BufReader::new(stderr));
    loop {
        match reader.next_event() {
            Ok(Some(StatusEvent::Message(message))) => match message {
                StatusMessage::Params(params) => lock(mirror).params = Some(params),
                StatusMessage::State(state) => lock(mirror).state = Some(state),
                StatusMessage::PeltierFail(text) => warn!("core peltier tick failed: {text}"),
                StatusMessage::FanFail(text) => warn!("core fan tick failed: {text}"),
                StatusMessage::Running | StatusMessage::Done => {}
            },
            Ok(Some(StatusEvent::Malformed(text))) => {
                lock(reject).push_str(&text);
            }
            Ok(None) => break,
            Err(err) => {
                warn!(%err, "side-channel read failed");
                break;
            }
        }
    }
}

/// Block on child exit; any non-zero (or signalled) exit outside a stop()
/// is a crash: mark not-running, clear the mirror, join the stream workers
/// and record the diagnostics.
fn watchdog(
    mut child: Child,
    inner: &Arc<Mutex<Inner>>,
    mirror: &Arc<Mutex<Mirror>>,
    reject: &Arc<Mutex<String>>,
) {
    let status = child.wait();

    let crashed = match &status {
        Ok(status) => !status.success(),
        Err(_) => true,
    };

    let workers = {
        let mut guard = lock(inner);
        if guard.stopping || !crashed {
            // A graceful stop is in charge of cleanup; a clean self-exit
            // is only ever induced by stop().
            return;
        }
        guard.running = false;
        guard.child_pid = None;
        guard.watchdog = None;
        guard.workers.take()
    };

    let describe = match &status {
        Ok(status) => status.to_string(),
        Err(err) => format!("wait failed: {err}"),
    };
    warn!("control loop child crashed ({describe})");

    if let Some(workers) = workers {
        let _ = workers.stdout.join();
        let _ = workers.status.join();
    }

    *lock(mirror) = Mirror::default();

    let mut diagnostic = format!("child exited with {describe}");
    let rejected = lock(reject);
    if !rejected.is_empty() {
        diagnostic.push('\n');
        diagnostic.push_str(&rejected);
    }
    drop(rejected);

    let mut guard = lock(inner);
    guard.run_info = RunInfo {
        since: Some(unix_time_now()),
        reason: RunReason::Crashed,
        info: Some(diagnostic),
    };
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> std::io::Result<()> {
    // SAFETY: plain syscall on a pid we spawned; failure comes back via
    // errno, no pointers involved.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "graceful child termination requires unix signals",
    ))
}

fn unix_time_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

fn lock<T>(mutex: &Arc<Mutex<T>>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
