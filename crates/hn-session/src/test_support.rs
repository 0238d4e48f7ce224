//! Scripted stand-ins for the cluster, the tunnel and the browser

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use hn_core::config::ClusterConfig;
use hn_core::error::{BrowserError, ExecError, TunnelError};
use hn_core::exec::{CommandExecutor, RemoteCommandResult};

use crate::browser::Browser;
use crate::tunnel::{TunnelExit, TunnelHandle, TunnelManager, TunnelSpec};

pub fn cluster() -> ClusterConfig {
    ClusterConfig {
        cluster_host: "hpc1".to_string(),
        venv_path: "/home/u/venv".to_string(),
        workdir: "~".to_string(),
        partition: "cpu".to_string(),
        time_limit: "3:00:00".to_string(),
    }
}

/// One recorded executor call
#[derive(Debug, Clone)]
pub struct Call {
    pub argv: Vec<String>,
    pub local: bool,
}

#[derive(Debug, Clone)]
enum Scripted {
    Result(RemoteCommandResult),
    SpawnError,
}

#[derive(Default)]
struct ExecState {
    responses: HashMap<String, VecDeque<Scripted>>,
    cancel_on: HashMap<String, CancellationToken>,
    calls: Vec<Call>,
}

/// Executor answering from per-program queues.
///
/// Responses queued for a program are handed out in order and the last one
/// repeats. Programs without responses succeed with empty output.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    state: Arc<Mutex<ExecState>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, program: &str, exit_code: i32, stdout: &str, stderr: &str) {
        self.push(program, Scripted::Result(RemoteCommandResult::new(exit_code, stdout, stderr)));
    }

    /// Make `program` fail to start
    pub fn fail_spawn(&self, program: &str) {
        self.push(program, Scripted::SpawnError);
    }

    /// Cancel `token` as soon as `program` runs, as a Ctrl-C would
    pub fn cancel_on(&self, program: &str, token: CancellationToken) {
        self.state
            .lock()
            .unwrap()
            .cancel_on
            .insert(program.to_string(), token);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, program: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.argv.first().map(String::as_str) == Some(program))
            .count()
    }

    fn push(&self, program: &str, scripted: Scripted) {
        self.state
            .lock()
            .unwrap()
            .responses
            .entry(program.to_string())
            .or_default()
            .push_back(scripted);
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn execute(&self, argv: &[String], local: bool) -> Result<RemoteCommandResult, ExecError> {
        let scripted = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call {
                argv: argv.to_vec(),
                local,
            });
            let program = argv.first().cloned().unwrap_or_default();
            if let Some(token) = state.cancel_on.get(&program) {
                token.cancel();
            }
            match state.responses.get_mut(&program) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match scripted {
            Some(Scripted::Result(result)) => Ok(result),
            Some(Scripted::SpawnError) => Err(ExecError::Spawn {
                program: argv[0].clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
            None => Ok(RemoteCommandResult::new(0, "", "")),
        }
    }
}

#[derive(Default)]
struct TunnelLog {
    opened: Vec<TunnelSpec>,
    closes: usize,
}

/// Tunnel manager that records what it was asked to do
#[derive(Clone, Default)]
pub struct FakeTunnelManager {
    log: Arc<Mutex<TunnelLog>>,
    exit: Option<TunnelExit>,
    refuse: bool,
    broken_close: bool,
    interrupt: Option<CancellationToken>,
}

impl FakeTunnelManager {
    /// Tunnels stay up until closed
    pub fn new() -> Self {
        Self::default()
    }

    /// Tunnels exit on their own right away with `code`
    pub fn exiting(code: i32) -> Self {
        Self {
            exit: Some(TunnelExit { code: Some(code) }),
            ..Self::default()
        }
    }

    /// Opening a tunnel fails
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Tunnels stay up, and closing them reports an error
    pub fn unkillable() -> Self {
        Self {
            broken_close: true,
            ..Self::default()
        }
    }

    /// Tunnels die from the same interrupt that cancels `token`: `wait`
    /// cancels it and returns a signal exit
    pub fn interrupted(token: CancellationToken) -> Self {
        Self {
            interrupt: Some(token),
            ..Self::default()
        }
    }

    pub fn opened(&self) -> Vec<TunnelSpec> {
        self.log.lock().unwrap().opened.clone()
    }

    pub fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }
}

impl TunnelManager for FakeTunnelManager {
    type Handle = FakeTunnel;

    fn open(&self, spec: TunnelSpec) -> Result<FakeTunnel, TunnelError> {
        if self.refuse {
            return Err(TunnelError::Spawn {
                program: "ssh".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            });
        }
        self.log.lock().unwrap().opened.push(spec.clone());
        Ok(FakeTunnel {
            spec,
            log: Arc::clone(&self.log),
            exit: self.exit,
            broken_close: self.broken_close,
            interrupt: self.interrupt.clone(),
        })
    }
}

pub struct FakeTunnel {
    spec: TunnelSpec,
    log: Arc<Mutex<TunnelLog>>,
    exit: Option<TunnelExit>,
    broken_close: bool,
    interrupt: Option<CancellationToken>,
}

#[async_trait]
impl TunnelHandle for FakeTunnel {
    fn spec(&self) -> &TunnelSpec {
        &self.spec
    }

    async fn wait(&mut self) -> Result<TunnelExit, TunnelError> {
        if let Some(token) = &self.interrupt {
            token.cancel();
            return Ok(TunnelExit { code: None });
        }
        match self.exit {
            Some(exit) => Ok(exit),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), TunnelError> {
        self.log.lock().unwrap().closes += 1;
        if self.broken_close {
            return Err(TunnelError::Kill(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "operation not permitted",
            )));
        }
        self.exit = Some(TunnelExit { code: None });
        Ok(())
    }
}

/// Browser that remembers every URL it was asked to open
#[derive(Clone, Default)]
pub struct RecordingBrowser {
    urls: Arc<Mutex<Vec<String>>>,
    broken: bool,
}

impl RecordingBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the URL, then reports a launch failure
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl Browser for RecordingBrowser {
    fn open(&self, url: &str) -> Result<(), BrowserError> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.broken {
            return Err(BrowserError::Launch {
                program: "xdg-open".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            });
        }
        Ok(())
    }
}
