use anyhow::{anyhow, Context, Result};
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{Client, Event, MqttOptions};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::Transport;

const ACK_TIMEOUT: Duration = Duration::from_secs(5);

// Deliveries overlap, and a broker drops the older session on a client id clash.
static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttEndpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub topic: String,
}

/// Parse `mqtt[s]://host:port/topic/path`.
pub fn parse_mqtt_endpoint(addr: &str) -> Result<MqttEndpoint> {
    let (scheme, rest) = addr
        .trim()
        .split_once("://")
        .ok_or_else(|| anyhow!("missing MQTT scheme in {}", addr))?;
    let use_tls = match scheme {
        "mqtt" => false,
        "mqtts" => true,
        other => return Err(anyhow!("unsupported MQTT scheme: {}", other)),
    };

    let (authority, topic) = rest
        .split_once('/')
        .ok_or_else(|| anyhow!("missing MQTT topic in {}", addr))?;
    if topic.is_empty() {
        return Err(anyhow!("missing MQTT topic in {}", addr));
    }
    if topic.contains('+') || topic.contains('#') {
        return Err(anyhow!("MQTT topic must not contain wildcards: {}", topic));
    }

    let (host, port) = split_host_port(authority)?;
    Ok(MqttEndpoint {
        host,
        port,
        use_tls,
        topic: topic.to_string(),
    })
}

fn split_host_port(addr: &str) -> Result<(String, u16)> {
    // Handle IPv6 addresses in brackets: [::1]:1883
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("invalid MQTT address: {}", addr))?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid MQTT port in {}", addr))?;
        return Ok((host.to_string(), port));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid MQTT port in {}", addr))?;
    Ok((host.to_string(), port))
}

/// MQTT consumer. Publishes each payload with QoS 1 on a short-lived
/// connection and waits for the broker's PUBACK.
pub struct MqttTransport {
    url: String,
    endpoint: MqttEndpoint,
}

impl MqttTransport {
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            url: url.to_string(),
            endpoint: parse_mqtt_endpoint(url)?,
        })
    }

    fn options(&self) -> MqttOptions {
        let client_id = format!(
            "gesture-relay-{}-{}",
            std::process::id(),
            NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed)
        );
        let mut options =
            MqttOptions::new(client_id, self.endpoint.host.clone(), self.endpoint.port);
        options.set_keep_alive(Duration::from_secs(5));
        if self.endpoint.use_tls {
            options.set_transport(rumqttc::Transport::tls_with_default_config());
        }
        options
    }
}

impl Transport for MqttTransport {
    fn endpoint(&self) -> &str {
        &self.url
    }

    fn send(&self, payload: &str) -> Result<()> {
        let (client, mut connection) = Client::new(self.options(), 10);
        client
            .publish(
                self.endpoint.topic.clone(),
                QoS::AtLeastOnce,
                false,
                payload.as_bytes().to_vec(),
            )
            .context("queue MQTT publish")?;

        let deadline = Instant::now() + ACK_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match connection.recv_timeout(remaining) {
                Ok(Ok(Event::Incoming(Packet::PubAck(_)))) => {
                    let _ = client.disconnect();
                    return Ok(());
                }
                Ok(Ok(_)) => {}
                Ok(Err(err)) => return Err(anyhow!("MQTT connection error: {}", err)),
                Err(_) => break,
            }
        }
        let _ = client.disconnect();
        Err(anyhow!("no PUBACK from {} within {:?}", self.url, ACK_TIMEOUT))
    }
}
