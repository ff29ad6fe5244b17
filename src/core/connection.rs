use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::proto::codec::{Decoder, Encoder};
use crate::proto::frame::Frame;
use crate::{Error, Result};

/// A single connection to a backend node.
///
/// Wraps a stream (TCP in production, any duplex stream in tests) and
/// handles RESP framing. One request is in flight at a time; callers that
/// need concurrency borrow several connections from a [`Pool`].
///
/// [`Pool`]: crate::core::pool::Pool
pub struct Connection<S = TcpStream> {
    stream: S,
    decoder: Decoder,
    encoder: Encoder,
    timeout: Option<Duration>,
}

impl Connection<TcpStream> {
    /// Dials `address` (`host:port`), giving up after `timeout`.
    pub async fn connect(address: &str, timeout: Duration) -> Result<Self> {
        let stream = with_timeout(timeout, async {
            TcpStream::connect(address)
                .await
                .map_err(|e| Error::Io { source: e })
        })
        .await?;
        stream.set_nodelay(true)?;
        Ok(Connection::new(stream).with_timeout(Some(timeout)))
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection over `stream`, without timeouts.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: Decoder::new(),
            encoder: Encoder::new(),
            timeout: None,
        }
    }

    /// Sets the network timeout applied to every write and read.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Writes a frame to the connection.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.encoder.encode(frame);
        let data = self.encoder.take();
        match self.timeout {
            Some(t) => {
                with_timeout(t, async { Ok(self.stream.write_all(&data).await?) }).await
            }
            None => Ok(self.stream.write_all(&data).await?),
        }
    }

    /// Reads one complete frame. `wait` bounds each socket read (`None` =
    /// forever), so a large reply arriving steadily is never cut off.
    pub async fn read_frame_within(&mut self, wait: Option<Duration>) -> Result<Frame> {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(frame) = self.decoder.decode()? {
                return Ok(frame);
            }
            let n = match wait {
                Some(t) => with_timeout(t, async { Ok(self.stream.read(&mut buf).await?) }).await?,
                None => self.stream.read(&mut buf).await?,
            };
            if n == 0 {
                return Err(Error::protocol("connection closed by peer"));
            }
            self.decoder.append(&buf[..n]);
        }
    }

    /// Reads one complete frame using the connection's network timeout.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        self.read_frame_within(self.timeout).await
    }

    /// Sends a request and waits for its reply.
    ///
    /// `blocking` is the time the server may hold the reply on purpose
    /// (blocking pops): it extends the read deadline, and `Some(ZERO)`
    /// disables it entirely.
    pub async fn request(&mut self, frame: &Frame, blocking: Option<Duration>) -> Result<Frame> {
        self.write_frame(frame).await?;
        let wait = match (blocking, self.timeout) {
            (Some(b), _) if b.is_zero() => None,
            (Some(b), Some(t)) => Some(b + t),
            (Some(b), None) => Some(b),
            (None, t) => t,
        };
        self.read_frame_within(wait).await
    }
}

async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            millis: timeout.as_millis() as u64,
        }),
    }
}

impl<S> fmt::Debug for Connection<S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("stream", &self.stream)
            .field("timeout", &self.timeout)
            .finish()
    }
}
