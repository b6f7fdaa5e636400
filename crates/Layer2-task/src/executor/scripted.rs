//! In-memory spawner for tests: no OS processes, exits driven by the test

use crate::executor::{ExitOutcome, OutputStream, ProcessSpawner, Signal, SpawnRequest, SpawnedProcess};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io;
use tokio::io::DuplexStream;
use tokio::sync::oneshot;

#[derive(Default)]
struct ScriptedInner {
    next_pid: u32,
    spawned: Vec<(u32, SpawnRequest)>,
    exits: HashMap<u32, oneshot::Sender<ExitOutcome>>,
    signals: Vec<(u32, Signal)>,
    outputs: HashMap<String, (Vec<u8>, Vec<u8>)>,
    failing: HashSet<String>,
    ignored: HashSet<Signal>,
    holding: HashSet<String>,
    held: HashMap<u32, DuplexStream>,
    pidless: HashSet<String>,
}

/// Records spawns and signals; a process stays alive until [`exit`] is
/// called or it receives a signal it does not ignore.
///
/// [`exit`]: ScriptedSpawner::exit
#[derive(Default)]
pub struct ScriptedSpawner {
    inner: Mutex<ScriptedInner>,
}

impl ScriptedSpawner {
    pub fn new() -> Self {
        let spawner = Self::default();
        spawner.inner.lock().next_pid = 1000;
        spawner
    }

    /// Canned stdout/stderr for every spawn of `command`
    pub fn with_output(self, command: &str, stdout: &str, stderr: &str) -> Self {
        self.inner.lock().outputs.insert(
            command.to_string(),
            (stdout.as_bytes().to_vec(), stderr.as_bytes().to_vec()),
        );
        self
    }

    /// Make spawning `command` fail like a missing binary
    pub fn failing(self, command: &str) -> Self {
        self.inner.lock().failing.insert(command.to_string());
        self
    }

    /// Spawns of `command` leave stdout open after exit, like a grandchild
    /// that inherited the pipe, until [`release_pipes`] is called
    ///
    /// [`release_pipes`]: ScriptedSpawner::release_pipes
    pub fn holding_pipes(self, command: &str) -> Self {
        self.inner.lock().holding.insert(command.to_string());
        self
    }

    /// Spawns of `command` report no pid; [`last_pid`] still reaches them
    ///
    /// [`last_pid`]: ScriptedSpawner::last_pid
    pub fn without_pid(self, command: &str) -> Self {
        self.inner.lock().pidless.insert(command.to_string());
        self
    }

    /// Processes survive this signal
    pub fn ignoring(self, signal: Signal) -> Self {
        self.inner.lock().ignored.insert(signal);
        self
    }

    /// Commands in spawn order
    pub fn spawned_commands(&self) -> Vec<String> {
        self.inner
            .lock()
            .spawned
            .iter()
            .map(|(_, req)| req.command.clone())
            .collect()
    }

    pub fn spawned_requests(&self) -> Vec<SpawnRequest> {
        self.inner
            .lock()
            .spawned
            .iter()
            .map(|(_, req)| req.clone())
            .collect()
    }

    pub fn signals(&self) -> Vec<(u32, Signal)> {
        self.inner.lock().signals.clone()
    }

    pub fn alive(&self) -> usize {
        self.inner.lock().exits.len()
    }

    /// Key of the most recent spawn, reported or not
    pub fn last_pid(&self) -> Option<u32> {
        self.inner.lock().spawned.last().map(|(pid, _)| *pid)
    }

    /// Close the held stdout of a process
    pub fn release_pipes(&self, pid: u32) -> bool {
        self.inner.lock().held.remove(&pid).is_some()
    }

    /// End a process with an exit code
    pub fn exit(&self, pid: u32, code: i32) -> bool {
        match self.inner.lock().exits.remove(&pid) {
            Some(tx) => tx.send(ExitOutcome::code(code)).is_ok(),
            None => false,
        }
    }
}

impl ProcessSpawner for ScriptedSpawner {
    fn spawn(&self, request: &SpawnRequest) -> io::Result<SpawnedProcess> {
        let mut inner = self.inner.lock();
        if inner.failing.contains(&request.command) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("spawn {} ENOENT", request.command),
            ));
        }

        inner.next_pid += 1;
        let pid = inner.next_pid;
        inner.spawned.push((pid, request.clone()));

        let (stdout, stderr) = inner
            .outputs
            .get(&request.command)
            .cloned()
            .unwrap_or_default();

        let (tx, rx) = oneshot::channel();
        inner.exits.insert(pid, tx);

        let stdout = if inner.holding.contains(&request.command) {
            let (reader, writer) = tokio::io::duplex(64);
            inner.held.insert(pid, writer);
            Box::pin(reader) as OutputStream
        } else {
            Box::pin(io::Cursor::new(stdout)) as OutputStream
        };
        let reported = (!inner.pidless.contains(&request.command)).then_some(pid);

        Ok(SpawnedProcess {
            pid: reported,
            stdout: Some(stdout),
            stderr: Some(Box::pin(io::Cursor::new(stderr)) as OutputStream),
            exit: async move { Ok(rx.await.unwrap_or_default()) }.boxed(),
        })
    }

    fn signal(&self, pid: u32, signal: Signal) -> io::Result<()> {
        let mut inner = self.inner.lock();
        if !inner.exits.contains_key(&pid) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such process"));
        }
        inner.signals.push((pid, signal));
        if !inner.ignored.contains(&signal) {
            if let Some(tx) = inner.exits.remove(&pid) {
                let _ = tx.send(ExitOutcome::signaled(signal.name()));
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
