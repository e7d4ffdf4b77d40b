use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "STAT_MONITOR_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "stat-monitor.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct MonitorConfig {
    pub mqtt: MqttConf,
    pub http: HttpConf,
    pub debug: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            topic: "stat".into(),
            client_id: None,
            keep_alive_secs: 15,
        }
    }
}

impl MqttConf {
    /// Identifiant fourni, sinon "stat-monitor-xxxxxxxx" aléatoire.
    pub fn client_id(&self) -> String {
        match self.client_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let uuid = uuid::Uuid::new_v4().simple().to_string();
                format!("stat-monitor-{}", &uuid[..8])
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HttpConf {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 8080 }
    }
}

/// Live view of STAT battery and system telemetry received over MQTT
#[derive(Debug, Parser, Default)]
#[command(name = "stat-monitor", version, about)]
pub struct Cli {
    /// MQTT broker host
    #[arg(long)]
    pub host: Option<String>,
    /// MQTT broker port
    #[arg(long)]
    pub port: Option<u16>,
    /// Topic carrying the telemetry
    #[arg(long)]
    pub topic: Option<String>,
    /// Verbose per-message logging
    #[arg(long)]
    pub debug: bool,
    /// Port of the HTTP read surface
    #[arg(long)]
    pub http_port: Option<u16>,
    /// YAML config file (overrides $STAT_MONITOR_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// --config, puis la variable d'env, puis le fichier par défaut.
pub fn config_path(cli: Option<&Path>, env: Option<String>) -> PathBuf {
    match (cli, env) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(path)) if !path.trim().is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

/// `Ok(None)` si le fichier est absent ou vide : l'appelant garde les défauts.
pub fn load_config(path: &Path) -> Result<Option<MonitorConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let txt = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    if txt.trim().is_empty() {
        return Ok(None);
    }
    serde_yaml::from_str(&txt)
        .map(Some)
        .map_err(|source| ConfigError::Yaml { path: path.to_path_buf(), source })
}

impl MonitorConfig {
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(host) = &cli.host {
            self.mqtt.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.mqtt.port = port;
        }
        if let Some(topic) = &cli.topic {
            self.mqtt.topic = topic.clone();
        }
        if let Some(port) = cli.http_port {
            self.http.port = port;
        }
        self.debug |= cli.debug;
        self
    }

    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "stat_monitor=debug"
        } else {
            "stat_monitor=info"
        }
    }
}
