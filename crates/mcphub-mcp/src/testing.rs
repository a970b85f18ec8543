//! In-process fake of the tool-server connector.
//!
//! Sessions are keyed by the spawn command, so a test configures behavior
//! per command and then drives the manager or service through it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Notify, oneshot};

use mcphub_core::{
    McpClientError, McpConnection, McpConnector, McpSession, McpTool, ProcessExit, SpawnSpec,
};

#[derive(Default)]
struct FakeState {
    connects: usize,
    disconnects: usize,
    next_session: u64,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    gates: HashMap<String, Arc<Notify>>,
    tools: HashMap<String, Vec<McpTool>>,
    /// Exit senders of live sessions: session number -> (command, sender)
    live: HashMap<u64, (String, oneshot::Sender<ProcessExit>)>,
    specs: Vec<SpawnSpec>,
}

/// Connector that never spawns anything.
#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<Mutex<FakeState>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make connects for `command` fail as if the executable were missing.
    pub fn fail_command(&self, command: &str) {
        self.state().failing.insert(command.to_string());
    }

    /// Make connects for `command` never complete the handshake.
    pub fn hang_command(&self, command: &str) {
        self.state().hanging.insert(command.to_string());
    }

    /// Hold connects for `command` until the returned gate is notified.
    pub fn gate_command(&self, command: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state()
            .gates
            .insert(command.to_string(), Arc::clone(&gate));
        gate
    }

    /// Tools reported by sessions for `command`.
    pub fn set_tools(&self, command: &str, tools: Vec<McpTool>) {
        self.state().tools.insert(command.to_string(), tools);
    }

    /// Simulate every live session for `command` exiting on its own.
    ///
    /// Returns whether any session was live.
    pub fn crash(&self, command: &str, code: Option<i32>) -> bool {
        let senders: Vec<oneshot::Sender<ProcessExit>> = {
            let mut state = self.state();
            let ids: Vec<u64> = state
                .live
                .iter()
                .filter(|(_, (cmd, _))| cmd == command)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| state.live.remove(&id).map(|(_, tx)| tx))
                .collect()
        };

        let crashed = !senders.is_empty();
        for tx in senders {
            let _ = tx.send(ProcessExit {
                code,
                description: code.map_or_else(
                    || "signal: 9 (SIGKILL)".to_string(),
                    |c| format!("exit status: {c}"),
                ),
            });
        }
        crashed
    }

    /// Number of successful and failed connect attempts.
    pub fn connect_count(&self) -> usize {
        self.state().connects
    }

    /// Number of sessions disconnected.
    pub fn disconnect_count(&self) -> usize {
        self.state().disconnects
    }

    /// Number of sessions currently live.
    pub fn live_count(&self) -> usize {
        self.state().live.len()
    }

    /// Every spec passed to `connect`, in order.
    pub fn specs(&self) -> Vec<SpawnSpec> {
        self.state().specs.clone()
    }
}

#[async_trait]
impl McpConnector for FakeConnector {
    async fn connect(&self, spec: &SpawnSpec) -> Result<McpConnection, McpClientError> {
        let (hang, gate, session_id, exited) = {
            let mut state = self.state();
            state.connects += 1;
            state.specs.push(spec.clone());

            if state.failing.contains(&spec.command) {
                return Err(McpClientError::SpawnFailed(format!(
                    "Failed to spawn '{}': No such file or directory",
                    spec.command
                )));
            }

            let hang = state.hanging.contains(&spec.command);
            let gate = state.gates.get(&spec.command).cloned();
            state.next_session += 1;
            let session_id = state.next_session;
            let (tx, rx) = oneshot::channel();
            if !hang {
                state.live.insert(session_id, (spec.command.clone(), tx));
            }
            (hang, gate, session_id, rx)
        };

        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(gate) = gate {
            gate.notified().await;
        }

        Ok(McpConnection {
            session: Arc::new(FakeSession {
                id: session_id,
                command: spec.command.clone(),
                state: Arc::clone(&self.state),
                connected: AtomicBool::new(true),
            }),
            exited,
        })
    }
}

struct FakeSession {
    id: u64,
    command: String,
    state: Arc<Mutex<FakeState>>,
    connected: AtomicBool,
}

#[async_trait]
impl McpSession for FakeSession {
    async fn list_tools(&self) -> Result<Vec<McpTool>, McpClientError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(McpClientError::NotConnected);
        }
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state.tools.get(&self.command).cloned().unwrap_or_default())
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.disconnects += 1;
            // Dropping the sender reports a deliberate shutdown
            state.live.remove(&self.id);
        }
    }
}
