use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::FixedOffset;
use rumqttc::{MqttOptions, QoS};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Upper bound on pooled store connections.
    pub database_max_connections: u32,
    /// How long a caller waits for a pooled connection before the store is
    /// reported unreachable.
    pub database_acquire_timeout_secs: u64,
    pub mqtt: MqttConfig,
    pub server_host: String,
    pub server_port: u16,
    /// Offset applied to response timestamps, date filters and month buckets.
    pub display_offset: FixedOffset,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub topic: String,
    pub client_id: String,
    pub qos: QoS,
    pub keep_alive_secs: u64,
    /// Pause between reconnect attempts after the broker connection drops.
    pub reconnect_delay_secs: u64,
    /// Largest MQTT packet accepted from or sent to the broker, in bytes.
    /// A larger publish costs the whole session, not just the message.
    pub max_packet_size: usize,
}

/// 1 MiB, far above any sensor reading.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1024 * 1024;

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let topic = optional(&lookup, "MQTT_TOPIC", "sensor/data");
        if topic.trim().is_empty() {
            bail!("MQTT_TOPIC must not be empty");
        }

        let database_max_connections: u32 = optional(&lookup, "DATABASE_MAX_CONNECTIONS", "10")
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;
        if database_max_connections == 0 {
            bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }

        let max_packet_size: usize = match lookup("MQTT_MAX_PACKET_SIZE") {
            Some(raw) => raw
                .parse()
                .context("MQTT_MAX_PACKET_SIZE must be a positive integer")?,
            None => DEFAULT_MAX_PACKET_SIZE,
        };
        if max_packet_size == 0 {
            bail!("MQTT_MAX_PACKET_SIZE must be at least 1");
        }

        let display_offset = parse_offset(&optional(&lookup, "DISPLAY_UTC_OFFSET", "+00:00"))?;

        Ok(Self {
            database_url: required(&lookup, "DATABASE_URL")?,
            database_max_connections,
            database_acquire_timeout_secs: optional(&lookup, "DATABASE_ACQUIRE_TIMEOUT_SECS", "5")
                .parse()
                .context("DATABASE_ACQUIRE_TIMEOUT_SECS must be a positive integer")?,
            mqtt: MqttConfig {
                broker_host: optional(&lookup, "MQTT_BROKER_HOST", "test.mosquitto.org"),
                broker_port: optional(&lookup, "MQTT_BROKER_PORT", "1883")
                    .parse()
                    .context("MQTT_BROKER_PORT must be a valid port number")?,
                topic,
                client_id: lookup("MQTT_CLIENT_ID").unwrap_or_else(default_client_id),
                qos: parse_qos(&optional(&lookup, "MQTT_QOS", "0"))?,
                keep_alive_secs: optional(&lookup, "MQTT_KEEP_ALIVE_SECS", "60")
                    .parse()
                    .context("MQTT_KEEP_ALIVE_SECS must be a positive integer")?,
                reconnect_delay_secs: optional(&lookup, "MQTT_RECONNECT_DELAY_SECS", "5")
                    .parse()
                    .context("MQTT_RECONNECT_DELAY_SECS must be a positive integer")?,
                max_packet_size,
            },
            server_host: optional(&lookup, "SERVER_HOST", "0.0.0.0"),
            server_port: optional(&lookup, "SERVER_PORT", "5000")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            display_offset,
        })
    }
}

impl MqttConfig {
    pub fn mqtt_options(&self) -> MqttOptions {
        let mut options =
            MqttOptions::new(self.client_id.clone(), self.broker_host.clone(), self.broker_port);
        options
            .set_keep_alive(Duration::from_secs(self.keep_alive_secs))
            .set_clean_session(true)
            .set_max_packet_size(self.max_packet_size, self.max_packet_size);
        options
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

fn parse_qos(raw: &str) -> Result<QoS> {
    match raw.trim() {
        "0" => Ok(QoS::AtMostOnce),
        "1" => Ok(QoS::AtLeastOnce),
        "2" => Ok(QoS::ExactlyOnce),
        other => bail!("MQTT_QOS must be 0, 1 or 2, got: {other:?}"),
    }
}

/// Accepts `+HH:MM` / `-HH:MM`, as in `+07:00`.
fn parse_offset(raw: &str) -> Result<FixedOffset> {
    raw.trim()
        .parse()
        .with_context(|| format!("DISPLAY_UTC_OFFSET must look like +07:00, got: {raw:?}"))
}

/// Random suffix keeps concurrently running instances from kicking each other
/// off a shared broker.
fn default_client_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("sensor-monitor-{}", &id[..8])
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_owned())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_applied_when_only_database_url_set() {
        let c = from_pairs(&[("DATABASE_URL", "postgres://localhost/sensors")]).unwrap();
        assert_eq!(c.database_url, "postgres://localhost/sensors");
        assert_eq!(c.database_max_connections, 10);
        assert_eq!(c.database_acquire_timeout_secs, 5);
        assert_eq!(c.mqtt.broker_host, "test.mosquitto.org");
        assert_eq!(c.mqtt.broker_port, 1883);
        assert_eq!(c.mqtt.topic, "sensor/data");
        assert_eq!(c.mqtt.qos, QoS::AtMostOnce);
        assert_eq!(c.mqtt.keep_alive_secs, 60);
        assert_eq!(c.mqtt.reconnect_delay_secs, 5);
        assert_eq!(c.server_host, "0.0.0.0");
        assert_eq!(c.server_port, 5000);
        assert_eq!(c.mqtt.max_packet_size, DEFAULT_MAX_PACKET_SIZE);
        assert_eq!(c.display_offset.local_minus_utc(), 0);
        assert!(c.mqtt.client_id.starts_with("sensor-monitor-"));
    }

    #[test]
    fn missing_database_url_errors() {
        let err = from_pairs(&[]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn overrides_are_respected() {
        let c = from_pairs(&[
            ("DATABASE_URL", "postgres://db/x"),
            ("MQTT_BROKER_HOST", "broker.local"),
            ("MQTT_BROKER_PORT", "8883"),
            ("MQTT_TOPIC", "lab/room1"),
            ("MQTT_CLIENT_ID", "dashboard-1"),
            ("MQTT_QOS", "1"),
            ("SERVER_PORT", "8080"),
            ("MQTT_MAX_PACKET_SIZE", "65536"),
            ("DISPLAY_UTC_OFFSET", "+07:00"),
        ])
        .unwrap();
        assert_eq!(c.mqtt.broker_host, "broker.local");
        assert_eq!(c.mqtt.broker_port, 8883);
        assert_eq!(c.mqtt.topic, "lab/room1");
        assert_eq!(c.mqtt.client_id, "dashboard-1");
        assert_eq!(c.mqtt.qos, QoS::AtLeastOnce);
        assert_eq!(c.server_port, 8080);
        assert_eq!(c.mqtt.max_packet_size, 65536);
        assert_eq!(c.display_offset.local_minus_utc(), 7 * 3600);
    }

    #[test]
    fn invalid_port_errors() {
        let err = from_pairs(&[("DATABASE_URL", "x"), ("SERVER_PORT", "http")]).unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));
    }

    #[test]
    fn zero_pool_size_errors() {
        let err =
            from_pairs(&[("DATABASE_URL", "x"), ("DATABASE_MAX_CONNECTIONS", "0")]).unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn empty_topic_errors() {
        let err = from_pairs(&[("DATABASE_URL", "x"), ("MQTT_TOPIC", "  ")]).unwrap_err();
        assert!(err.to_string().contains("MQTT_TOPIC"));
    }

    #[test]
    fn mqtt_options_lift_default_packet_limit() {
        let c = from_pairs(&[("DATABASE_URL", "x")]).unwrap();
        let options = c.mqtt.mqtt_options();
        assert_eq!(options.max_packet_size(), DEFAULT_MAX_PACKET_SIZE);
        assert!(options.max_packet_size() > 20 * 1024);
    }

    #[test]
    fn zero_packet_size_errors() {
        let err = from_pairs(&[("DATABASE_URL", "x"), ("MQTT_MAX_PACKET_SIZE", "0")]).unwrap_err();
        assert!(err.to_string().contains("MQTT_MAX_PACKET_SIZE"));
    }

    #[test]
    fn display_offset_parses_signed_offsets() {
        assert_eq!(parse_offset("-05:30").unwrap().local_minus_utc(), -(5 * 3600 + 30 * 60));
        assert_eq!(parse_offset(" +07:00 ").unwrap().local_minus_utc(), 7 * 3600);
        let err = parse_offset("Asia/Jakarta").unwrap_err();
        assert!(err.to_string().contains("DISPLAY_UTC_OFFSET"));
    }

    #[test]
    fn parse_qos_levels() {
        assert_eq!(parse_qos("0").unwrap(), QoS::AtMostOnce);
        assert_eq!(parse_qos("1").unwrap(), QoS::AtLeastOnce);
        assert_eq!(parse_qos("2").unwrap(), QoS::ExactlyOnce);
        let err = parse_qos("3").unwrap_err();
        assert!(err.to_string().contains("MQTT_QOS"));
    }
}
