/**
 * STAT SIMULATOR - Publie un scénario de télémétrie sur un vrai broker
 *
 * Envoie chaque seconde un cycle CPU/Memory/Fan/SystemPower/INA238/DalyBMS/BatteryStatus
 * pour exercer le moniteur de bout en bout sans matériel.
 */

use anyhow::Result;
use clap::Parser;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use stat_devkit::Scenario;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "stat-simulator", version, about = "Publish synthetic STAT telemetry")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    #[arg(long, default_value_t = 1883)]
    port: u16,
    #[arg(long, default_value = "stat")]
    topic: String,
    /// Nombre de cellules du pack simulé
    #[arg(long, default_value_t = 16)]
    cells: usize,
    /// Arrêt après N cycles (0 = infini)
    #[arg(long, default_value_t = 0)]
    cycles: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stat_simulator=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let args = Args::parse();
    info!("publishing to {}:{} on {}", args.host, args.port, args.topic);

    let mut opts = MqttOptions::new("stat-simulator", args.host.as_str(), args.port);
    opts.set_keep_alive(Duration::from_secs(30));
    let (client, mut eventloop) = AsyncClient::new(opts, 32);

    // l'eventloop doit tourner pour que les publish partent
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(ack))) => info!("connected ({:?})", ack.code),
                Ok(_) => {}
                Err(e) => {
                    warn!("MQTT connection error: {e}. Reconnecting...");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });

    let scenario = Scenario { cells: args.cells, ..Scenario::default() };
    let mut ticker = interval(Duration::from_secs(1));
    let mut step = 0u64;
    loop {
        ticker.tick().await;
        for frame in scenario.frames(step) {
            let payload = serde_json::to_vec(&frame)?;
            client.publish(args.topic.as_str(), QoS::AtMostOnce, false, payload).await?;
        }
        debug!("cycle {step} published");

        step += 1;
        if args.cycles != 0 && step >= args.cycles {
            break;
        }
    }

    // laisse partir les derniers publish
    tokio::time::sleep(Duration::from_millis(500)).await;
    client.disconnect().await?;
    info!("done after {step} cycles");
    Ok(())
}
