//! In-memory guest used by the host integration tests.
//!
//! `RecordingTransport` hands every evaluated script to the paired `Guest`,
//! and the `Guest` plays the page: it reports the load, posts responses and
//! starts guest → host calls.

#![allow(dead_code)]

use jsbridge_common::{BridgeError, PageRequest, Result, Transport, TransportEvent, TransportEvents};
use jsbridge_host::{Bridge, BridgeConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const SCRIPT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Shared {
    pages: Mutex<Vec<PageRequest>>,
    closed: AtomicBool,
    refuse_load: AtomicBool,
    refuse_scripts: AtomicBool,
}

pub struct RecordingTransport {
    shared: Arc<Shared>,
    scripts: mpsc::UnboundedSender<String>,
}

impl Transport for RecordingTransport {
    fn load(&self, page: &PageRequest) -> Result<()> {
        if self.shared.refuse_load.load(Ordering::SeqCst) {
            return Err(BridgeError::Transport("no page".into()));
        }
        self.shared.pages.lock().unwrap().push(page.clone());
        Ok(())
    }

    fn evaluate(&self, script: String) -> Result<()> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::Closed);
        }
        if self.shared.refuse_scripts.load(Ordering::SeqCst) {
            return Err(BridgeError::Transport("evaluation refused".into()));
        }
        let _ = self.scripts.send(script);
        Ok(())
    }

    fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
    }
}

pub struct Guest {
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<TransportEvent>,
    scripts: mpsc::UnboundedReceiver<String>,
}

impl Guest {
    pub fn loaded(&self) {
        self.send(TransportEvent::Loaded);
    }

    pub fn load_failed(&self, reason: &str) {
        self.send(TransportEvent::LoadFailed(reason.to_string()));
    }

    pub fn terminate(&self, reason: &str) {
        self.send(TransportEvent::Terminated(reason.to_string()));
    }

    /// Posts raw message text as if the page called `jsbridgeHost.postMessage`.
    pub fn post(&self, text: impl Into<String>) {
        self.send(TransportEvent::Message(text.into()));
    }

    pub fn boot_succeeded(&self) {
        self.post(r#"{"id":0,"result":"null"}"#);
    }

    pub fn resolve(&self, id: u64, result: &str) {
        self.post(serde_json::json!({ "id": id, "result": result }).to_string());
    }

    pub fn reject(&self, id: u64, error: serde_json::Value) {
        self.post(serde_json::json!({ "id": id, "error": error }).to_string());
    }

    pub fn invoke(&self, id: u64, method: &str, params: &[&str]) {
        self.post(serde_json::json!({ "id": id, "method": method, "params": params }).to_string());
    }

    pub fn refuse_scripts(&self) {
        self.shared.refuse_scripts.store(true, Ordering::SeqCst);
    }

    pub fn pages(&self) -> Vec<PageRequest> {
        self.shared.pages.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Next script the host evaluated.
    pub async fn next_script(&mut self) -> String {
        tokio::time::timeout(SCRIPT_TIMEOUT, self.scripts.recv())
            .await
            .expect("timed out waiting for a script")
            .expect("transport dropped")
    }

    /// Skips ahead to the next script starting with `prefix`.
    pub async fn expect_script(&mut self, prefix: &str) -> String {
        loop {
            let script = self.next_script().await;
            if script.starts_with(prefix) {
                return script;
            }
        }
    }

    /// Waits for the next host → guest call and returns its id and script.
    pub async fn next_invoke(&mut self) -> (u64, String) {
        let script = self.expect_script("__jsbridge.invoke(").await;
        let id = script["__jsbridge.invoke(".len()..]
            .split(',')
            .next()
            .and_then(|id| id.trim().parse().ok())
            .expect("invoke script carries an id");
        (id, script)
    }

    /// Drains the scripts evaluated so far.
    pub fn drain_scripts(&mut self) -> Vec<String> {
        let mut scripts = Vec::new();
        while let Ok(script) = self.scripts.try_recv() {
            scripts.push(script);
        }
        scripts
    }

    fn send(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}

pub fn transport() -> (RecordingTransport, TransportEvents, Guest) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (scripts_tx, scripts_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared::default());

    let transport = RecordingTransport {
        shared: Arc::clone(&shared),
        scripts: scripts_tx,
    };
    let guest = Guest {
        shared,
        events: events_tx,
        scripts: scripts_rx,
    };
    (transport, events_rx, guest)
}

/// A transport whose `load` fails synchronously.
pub fn refusing_transport() -> (RecordingTransport, TransportEvents, Guest) {
    let (transport, events, guest) = transport();
    transport.shared.refuse_load.store(true, Ordering::SeqCst);
    (transport, events, guest)
}

/// A bridge whose page loaded and whose library booted.
pub async fn ready_bridge(config: BridgeConfig) -> (Bridge, Guest) {
    init_tracing();
    let (transport, events, mut guest) = transport();
    let bridge = Bridge::new(transport, events, "var loaded = true;", config);
    guest.loaded();
    guest.boot_succeeded();
    bridge.ready().await.expect("bridge becomes ready");
    guest.drain_scripts();
    (bridge, guest)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
