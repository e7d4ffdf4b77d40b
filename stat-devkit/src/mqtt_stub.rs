/*!
Mock MQTT Client pour développement sans broker

Enregistre les abonnements et simule la réception de messages
sur les topics auxquels le client est abonné.
*/

use anyhow::Result;
use parking_lot::Mutex;
use rumqttc::QoS;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// Mock MQTT Client qui simule rumqttc::AsyncClient
#[derive(Clone)]
pub struct MockMqttClient {
    subscriptions: Arc<Mutex<Vec<String>>>,
    message_sender: Arc<Mutex<Option<mpsc::UnboundedSender<MockMessage>>>>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            message_sender: Arc::new(Mutex::new(None)),
        }
    }

    /// Configuration d'un channel pour recevoir les messages simulés
    pub fn setup_receiver(&self) -> mpsc::UnboundedReceiver<MockMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.message_sender.lock() = Some(sender);
        receiver
    }

    /// Simule l'abonnement à un topic (compatible avec AsyncClient)
    pub async fn subscribe<S: Into<String>>(&self, topic: S, _qos: QoS) -> Result<()> {
        let topic = topic.into();
        info!("[mock] subscribed to {topic}");
        self.subscriptions.lock().push(topic);
        Ok(())
    }

    /// Simule la réception d'un message. Renvoie `false` si aucun abonnement ne correspond.
    pub async fn simulate_incoming<S, V>(&self, topic: S, payload: V) -> Result<bool>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let topic = topic.into();
        let subscribed = self.subscriptions.lock().iter().any(|filter| topic_matches(filter, &topic));
        if !subscribed {
            debug!("[mock] no subscription for {topic}, dropped");
            return Ok(false);
        }

        let message = MockMessage { topic, payload: payload.into(), qos: QoS::AtMostOnce, retain: false };
        if let Some(sender) = self.message_sender.lock().as_ref() {
            sender
                .send(message.clone())
                .map_err(|e| anyhow::anyhow!("send error: {e}"))?;
        }
        debug!("[mock] simulated incoming on {}", message.topic);
        Ok(true)
    }
}

impl Default for MockMqttClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Filtre MQTT : `+` couvre un niveau, `#` (en dernier) couvre le reste.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut levels = topic.split('/');
    for part in filter.split('/') {
        match (part, levels.next()) {
            ("#", _) => return true,
            ("+", Some(_)) => {}
            (expected, Some(level)) if expected == level => {}
            _ => return false,
        }
    }
    levels.next().is_none()
}
