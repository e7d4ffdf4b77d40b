/**
 * TRANSPORT MQTT - Adaptateur rumqttc vers `TransportEvent`
 *
 * Le listener poll l'eventloop et ne fait que traduire : CONNACK, publish,
 * disconnect, erreurs. Toute la logique métier vit dans `ingest`.
 * Abonnement refait à chaque CONNACK (session propre après reconnexion).
 */

use crate::config::MqttConf;
use crate::ingest::TransportEvent;
use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info};

const RETRY_DELAY: Duration = Duration::from_secs(2);
/// Limite rumqttc par défaut : 10 Kio, trop court pour un pack Daly complet.
const MAX_PACKET_SIZE: usize = 1024 * 1024;

fn mqtt_options(conf: &MqttConf, client_id: String) -> MqttOptions {
    let mut opts = MqttOptions::new(client_id, conf.host.clone(), conf.port);
    opts.set_keep_alive(Duration::from_secs(conf.keep_alive_secs.max(5)));
    opts.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);
    opts
}

pub fn spawn_mqtt_listener(
    conf: &MqttConf,
    client_id: String,
    events: mpsc::Sender<TransportEvent>,
) -> JoinHandle<()> {
    let opts = mqtt_options(conf, client_id);
    let topic = conf.topic.clone();
    info!("MQTT connecting to {}:{} (topic: {topic})", conf.host, conf.port);

    task::spawn(async move {
        let (client, mut eventloop) = AsyncClient::new(opts, 10);

        loop {
            let polled = eventloop.poll().await;
            let translated = match &polled {
                Ok(event) => translate(event, OffsetDateTime::now_utc()),
                Err(e) => Some(translate_error(e)),
            };

            if matches!(translated, Some(TransportEvent::Connected)) {
                if let Err(e) = client.subscribe(topic.as_str(), QoS::AtMostOnce).await {
                    error!("MQTT subscribe to {topic} failed: {e}");
                } else {
                    debug!("subscribed to {topic}");
                }
            }

            if let Some(event) = translated {
                if events.send(event).await.is_err() {
                    debug!("ingestion gone, MQTT listener stopped");
                    break;
                }
            }

            if polled.is_err() {
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    })
}

fn translate(event: &Event, now: OffsetDateTime) -> Option<TransportEvent> {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => Some(match ack.code {
            ConnectReturnCode::Success => TransportEvent::Connected,
            code => TransportEvent::ConnectionRefused(format!("{code:?}")),
        }),
        Event::Incoming(Packet::Publish(p)) => Some(TransportEvent::Message {
            topic: p.topic.clone(),
            payload: p.payload.to_vec(),
            received_at: now,
        }),
        Event::Incoming(Packet::Disconnect) => Some(TransportEvent::Disconnected),
        _ => None,
    }
}

fn translate_error(err: &ConnectionError) -> TransportEvent {
    match err {
        ConnectionError::ConnectionRefused(code) => TransportEvent::ConnectionRefused(format!("{code:?}")),
        other => TransportEvent::Failed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{ConnAck, Publish};

    #[test]
    fn options_accept_large_payloads() {
        let opts = mqtt_options(&MqttConf::default(), "stat-monitor-test".into());
        assert_eq!(opts.max_packet_size(), MAX_PACKET_SIZE);
        assert_eq!(opts.keep_alive(), Duration::from_secs(15));
        assert_eq!(opts.client_id(), "stat-monitor-test");
    }

    #[test]
    fn connack_codes() {
        let now = OffsetDateTime::now_utc();
        let ok = Event::Incoming(Packet::ConnAck(ConnAck::new(ConnectReturnCode::Success, false)));
        assert_eq!(translate(&ok, now), Some(TransportEvent::Connected));

        let refused = Event::Incoming(Packet::ConnAck(ConnAck::new(ConnectReturnCode::NotAuthorized, false)));
        assert_eq!(translate(&refused, now), Some(TransportEvent::ConnectionRefused("NotAuthorized".into())));
    }

    #[test]
    fn publish_becomes_message() {
        let now = OffsetDateTime::now_utc();
        let publish = Publish::new("stat", QoS::AtMostOnce, br#"{"device":"CPU"}"#.to_vec());
        let Some(TransportEvent::Message { topic, payload, received_at }) =
            translate(&Event::Incoming(Packet::Publish(publish)), now)
        else {
            panic!("publish should translate to a message");
        };
        assert_eq!(topic, "stat");
        assert_eq!(payload, br#"{"device":"CPU"}"#);
        assert_eq!(received_at, now);
    }

    #[test]
    fn other_packets_are_skipped() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(translate(&Event::Incoming(Packet::PingResp), now), None);
        assert_eq!(translate(&Event::Incoming(Packet::Disconnect), now), Some(TransportEvent::Disconnected));
    }

    #[test]
    fn refused_error_keeps_code() {
        let err = ConnectionError::ConnectionRefused(ConnectReturnCode::BadUserNamePassword);
        assert_eq!(translate_error(&err), TransportEvent::ConnectionRefused("BadUserNamePassword".into()));
    }
}
