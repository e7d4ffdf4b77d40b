use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
    /// Message déjà formaté pour l'affichage ("Error: ...", "Connection failed (...)")
    Error(String),
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => f.write_str("Disconnected"),
            ConnectionStatus::Connected => f.write_str("Connected"),
            ConnectionStatus::Error(message) => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub last_message_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub messages_received: u64,
    pub decode_failures: u64,
    pub ignored_messages: u64,
    pub reconnects: u64,
}

/// Singleton de connexion, écrit par l'ingestion et lu par le dispatcher.
#[derive(Clone)]
pub struct ConnectionTracker {
    state: Arc<Mutex<ConnectionState>>,
    received: Arc<AtomicU64>,
    decode_failures: Arc<AtomicU64>,
    ignored: Arc<AtomicU64>,
    reconnects: Arc<AtomicU64>,
    connected_once: Arc<AtomicBool>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectionState {
                status: ConnectionStatus::Disconnected,
                last_message_at: None,
            })),
            received: Arc::new(AtomicU64::new(0)),
            decode_failures: Arc::new(AtomicU64::new(0)),
            ignored: Arc::new(AtomicU64::new(0)),
            reconnects: Arc::new(AtomicU64::new(0)),
            connected_once: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Tout CONNACK après le premier compte comme une reconnexion.
    pub fn mark_connected(&self) {
        if self.connected_once.swap(true, Ordering::Relaxed) {
            self.reconnects.fetch_add(1, Ordering::Relaxed);
        }
        self.state.lock().status = ConnectionStatus::Connected;
    }

    pub fn mark_disconnected(&self) {
        self.state.lock().status = ConnectionStatus::Disconnected;
    }

    pub fn mark_refused(&self, code: &str) {
        self.state.lock().status = ConnectionStatus::Error(format!("Connection failed ({code})"));
    }

    pub fn mark_error(&self, message: &str) {
        self.state.lock().status = ConnectionStatus::Error(format!("Error: {message}"));
    }

    /// Horodatage mis à jour avant décodage, même si le payload est invalide.
    pub fn record_message(&self, at: OffsetDateTime) {
        self.received.fetch_add(1, Ordering::Relaxed);
        self.state.lock().last_message_at = Some(at);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ConnectionState {
        self.state.lock().clone()
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            messages_received: self.received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            ignored_messages: self.ignored.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}
