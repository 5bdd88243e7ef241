use jsbridge_common::{BridgeError, PageRequest, Result, Transport, TransportEvents};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use crate::engine::{self, Command};
use crate::storage::DataStore;

/// Transport backed by a Boa context on a dedicated thread.
///
/// Scripts are evaluated in the order they are queued. Dropping the
/// transport stops the thread.
#[derive(Debug)]
pub struct BoaTransport {
    commands: mpsc::UnboundedSender<Command>,
    closed: AtomicBool,
}

impl BoaTransport {
    /// Starts an engine with its own, empty page storage.
    pub fn spawn() -> Result<(Self, TransportEvents)> {
        Self::spawn_with_store(DataStore::new())
    }

    /// Starts an engine whose non-incognito pages persist to `store`.
    pub fn spawn_with_store(store: DataStore) -> Result<(Self, TransportEvents)> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let commands = engine::spawn(store, events_tx)?;
        let transport = Self {
            commands,
            closed: AtomicBool::new(false),
        };
        Ok((transport, events_rx))
    }

    fn send(&self, command: Command) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::Closed);
        }
        self.commands
            .send(command)
            .map_err(|_| BridgeError::Terminated("engine thread exited".into()))
    }
}

impl Transport for BoaTransport {
    fn load(&self, page: &PageRequest) -> Result<()> {
        self.send(Command::Load(page.clone()))
    }

    fn evaluate(&self, script: String) -> Result<()> {
        self.send(Command::Evaluate(script))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.commands.send(Command::Close);
        }
    }
}

impl Drop for BoaTransport {
    fn drop(&mut self) {
        self.close();
    }
}
