/**
 * INGESTION - Chemin d'un publish MQTT jusqu'au store
 *
 * Pour chaque événement du transport :
 * - statut de connexion => ConnectionTracker
 * - message => horodatage, décodage, classification, fusion dans la source
 *
 * Un payload invalide est loggé et abandonné ; la tâche continue.
 */

use crate::classify::{classify, Route};
use crate::connection::ConnectionTracker;
use crate::decoder::decode;
use crate::models::SourceId;
use crate::state::SourceStore;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Ce que le transport remonte, indépendamment de rumqttc.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    ConnectionRefused(String),
    Disconnected,
    Failed(String),
    Message {
        topic: String,
        payload: Vec<u8>,
        received_at: OffsetDateTime,
    },
}

#[derive(Clone)]
pub struct Ingestor {
    store: Arc<SourceStore>,
    connection: ConnectionTracker,
}

impl Ingestor {
    pub fn new(store: Arc<SourceStore>, connection: ConnectionTracker) -> Self {
        Self { store, connection }
    }

    pub fn handle(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                info!("MQTT connected");
                self.connection.mark_connected();
            }
            TransportEvent::ConnectionRefused(code) => {
                warn!("MQTT connection refused: {code}");
                self.connection.mark_refused(&code);
            }
            TransportEvent::Disconnected => {
                info!("MQTT disconnected");
                self.connection.mark_disconnected();
            }
            TransportEvent::Failed(message) => {
                error!("MQTT error: {message}");
                self.connection.mark_error(&message);
            }
            TransportEvent::Message { topic, payload, received_at } => {
                self.ingest_message(&topic, &payload, received_at)
            }
        }
    }

    fn ingest_message(&self, topic: &str, payload: &[u8], received_at: OffsetDateTime) {
        self.connection.record_message(received_at);

        let record = match decode(payload) {
            Ok(record) => record,
            Err(e) => {
                warn!("dropping payload on {topic}: {e}");
                self.connection.record_decode_failure();
                return;
            }
        };

        match classify(&record) {
            Route::Source(id) => {
                if self.store.merge(id, &record.fields, received_at) {
                    info!("new source: {id}");
                }
            }
            Route::System(fields) => {
                self.store.merge(SourceId::System, &fields, received_at);
            }
            Route::Ignored => {
                debug!("ignored device={:?} type={:?}", record.device, record.kind);
                self.connection.record_ignored();
            }
        }
    }

    /// Consomme les événements jusqu'à la fermeture du canal.
    pub fn spawn(self, mut events: mpsc::Receiver<TransportEvent>) -> JoinHandle<()> {
        task::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle(event);
            }
            debug!("transport channel closed, ingestion stopped");
        })
    }
}
