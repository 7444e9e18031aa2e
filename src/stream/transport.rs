//! Bidirectional connection to the detection service.
//!
//! The session only needs three things from a connection: send a text
//! message, poll for the next inbound message without blocking for long, and
//! close. `WsTransport` provides that over a blocking WebSocket whose read
//! timeout keeps the session loop on its frame cadence.

use std::io::ErrorKind;
use std::net::TcpStream;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

/// One inbound payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary(Vec<u8>),
}

impl Inbound {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Inbound::Text(text) => text.as_bytes(),
            Inbound::Binary(bytes) => bytes,
        }
    }
}

/// Outcome of one poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Poll {
    Message(Inbound),
    /// Nothing arrived within the poll window.
    Idle,
    /// The peer closed the connection cleanly.
    Closed,
}

pub trait Connection {
    fn send_text(&mut self, text: &str) -> Result<()>;

    /// `Err` means the connection failed and must be treated as closed.
    fn poll(&mut self) -> Result<Poll>;

    fn close(&mut self);
}

pub trait Transport {
    fn connect(&mut self, url: &str) -> Result<Box<dyn Connection>>;
}

/// WebSocket transport (`ws://`, and `wss://` with the ws-tls feature).
#[derive(Clone, Debug)]
pub struct WsTransport {
    read_timeout: Duration,
}

impl WsTransport {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new(Duration::from_millis(20))
    }
}

impl Transport for WsTransport {
    fn connect(&mut self, url: &str) -> Result<Box<dyn Connection>> {
        let (socket, response) =
            tungstenite::connect(url).with_context(|| format!("connect to {}", url))?;
        set_read_timeout(socket.get_ref(), self.read_timeout).context("set socket read timeout")?;
        log::debug!("websocket handshake with {} -> {}", url, response.status());
        Ok(Box::new(WsConnection {
            socket,
            closed: false,
        }))
    }
}

fn set_read_timeout(stream: &MaybeTlsStream<TcpStream>, timeout: Duration) -> std::io::Result<()> {
    match stream {
        MaybeTlsStream::Plain(tcp) => tcp.set_read_timeout(Some(timeout)),
        #[cfg(feature = "ws-tls")]
        MaybeTlsStream::Rustls(tls) => tls.get_ref().set_read_timeout(Some(timeout)),
        _ => Ok(()),
    }
}

struct WsConnection {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl Connection for WsConnection {
    fn send_text(&mut self, text: &str) -> Result<()> {
        if self.closed {
            return Err(anyhow!("websocket already closed"));
        }
        self.socket
            .send(Message::Text(text.to_string()))
            .context("send websocket message")
    }

    fn poll(&mut self) -> Result<Poll> {
        if self.closed {
            return Ok(Poll::Closed);
        }
        match self.socket.read() {
            Ok(Message::Text(text)) => Ok(Poll::Message(Inbound::Text(text))),
            Ok(Message::Binary(bytes)) => Ok(Poll::Message(Inbound::Binary(bytes))),
            Ok(Message::Close(frame)) => {
                log::debug!("websocket close frame: {:?}", frame);
                self.closed = true;
                // Sends the queued close reply.
                let _ = self.socket.flush();
                Ok(Poll::Closed)
            }
            // Pings are answered by tungstenite on the next read/write.
            Ok(_) => Ok(Poll::Idle),
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(Poll::Idle)
            }
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                self.closed = true;
                Ok(Poll::Closed)
            }
            Err(err) => {
                self.closed = true;
                Err(anyhow::Error::new(err).context("read websocket message"))
            }
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.socket.close(None) {
            log::debug!("websocket close: {}", err);
        }
        let _ = self.socket.flush();
    }
}
