/*!
# STAT DevKit - Stubs et payloads pour tester sans broker

Bibliothèque partagée par le moniteur et le simulateur :
- Stub MQTT qui simule les publish entrants (filtrage par abonnement, wildcards `+`/`#`)
- Builders de payloads télémétrie au format publié par l'embarqué STAT
- Scénario cyclique pour le simulateur
*/

pub mod mqtt_stub;
pub mod payloads;

pub use mqtt_stub::{topic_matches, MockMessage, MockMqttClient};
pub use payloads::{Scenario, TelemetryBuilder};
