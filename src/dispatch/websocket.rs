use anyhow::{anyhow, Context, Result};
use std::net::TcpStream;
use std::time::Duration;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};
use url::Url;

use super::Transport;

/// Bound on connecting and on every read or write of one delivery.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// WebSocket consumer. Opens a connection per payload, sends one text frame
/// and closes.
pub struct WebSocketTransport {
    url: String,
    parsed: Url,
    io_timeout: Duration,
}

impl WebSocketTransport {
    pub fn new(url: &str) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_IO_TIMEOUT)
    }

    pub fn with_timeout(url: &str, io_timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(url).with_context(|| format!("invalid websocket url {}", url))?;
        match parsed.scheme() {
            "ws" => {}
            #[cfg(feature = "websocket-tls")]
            "wss" => {}
            #[cfg(not(feature = "websocket-tls"))]
            "wss" => return Err(anyhow!("{} requires the websocket-tls feature", url)),
            other => return Err(anyhow!("unsupported websocket scheme: {}", other)),
        }
        if parsed.host_str().is_none() {
            return Err(anyhow!("websocket url {} has no host", url));
        }
        if io_timeout.is_zero() {
            return Err(anyhow!("websocket timeout must be non-zero"));
        }
        Ok(Self {
            url: url.to_string(),
            parsed,
            io_timeout,
        })
    }

    fn connect_tcp(&self) -> Result<TcpStream> {
        let addrs = self
            .parsed
            .socket_addrs(|| None)
            .with_context(|| format!("resolve {}", self.url))?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.io_timeout) {
                Ok(stream) => return Ok(stream),
                Err(err) => last_err = Some(err),
            }
        }
        Err(match last_err {
            Some(err) => anyhow!("connect to {}: {}", self.url, err),
            None => anyhow!("{} resolved to no addresses", self.url),
        })
    }
}

#[cfg(feature = "websocket-tls")]
fn handshake(url: &str, stream: TcpStream) -> Result<WebSocket<MaybeTlsStream<TcpStream>>> {
    tungstenite::client_tls(url, stream)
        .map(|(socket, _response)| socket)
        .map_err(|err| anyhow!("websocket handshake with {} failed: {}", url, err))
}

#[cfg(not(feature = "websocket-tls"))]
fn handshake(url: &str, stream: TcpStream) -> Result<WebSocket<MaybeTlsStream<TcpStream>>> {
    tungstenite::client(url, MaybeTlsStream::Plain(stream))
        .map(|(socket, _response)| socket)
        .map_err(|err| anyhow!("websocket handshake with {} failed: {}", url, err))
}

impl Transport for WebSocketTransport {
    fn endpoint(&self) -> &str {
        &self.url
    }

    fn send(&self, payload: &str) -> Result<()> {
        let stream = self.connect_tcp()?;
        stream.set_read_timeout(Some(self.io_timeout))?;
        stream.set_write_timeout(Some(self.io_timeout))?;
        // Same socket; lets the close drain be shortened whatever wraps it.
        let control = stream.try_clone().context("clone websocket socket")?;

        let mut socket = handshake(&self.url, stream)?;
        socket
            .send(Message::Text(payload.to_string()))
            .with_context(|| format!("send to {}", self.url))?;

        // Best-effort close handshake; the payload is already on the wire.
        let _ = control.set_read_timeout(Some(CLOSE_TIMEOUT.min(self.io_timeout)));
        if socket.close(None).is_ok() {
            while socket.read().is_ok() {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ws_urls() -> Result<()> {
        let transport = WebSocketTransport::new("ws://127.0.0.1:3000")?;
        assert_eq!(transport.endpoint(), "ws://127.0.0.1:3000");
        Ok(())
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(WebSocketTransport::new("http://127.0.0.1:3000").is_err());
        assert!(WebSocketTransport::new("not a url").is_err());
    }

    #[cfg(not(feature = "websocket-tls"))]
    #[test]
    fn wss_needs_tls_feature() {
        assert!(WebSocketTransport::new("wss://127.0.0.1:3000").is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(WebSocketTransport::with_timeout("ws://127.0.0.1:3000", Duration::ZERO).is_err());
    }

    #[test]
    fn unreachable_consumer_is_an_error() -> Result<()> {
        // Bind then drop to find a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
        let transport = WebSocketTransport::new(&format!("ws://127.0.0.1:{}", port))?;
        assert!(transport.send(r#"{"type":"gesture","data":"one"}"#).is_err());
        Ok(())
    }
}
