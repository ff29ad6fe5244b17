use bytes::{Buf, Bytes, BytesMut};

use crate::proto::error::{Error, Result};
use crate::proto::frame::Frame;

const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

/// An incremental RESP decoder.
///
/// Bytes are fed with [`append`](Decoder::append) as they arrive; [`decode`]
/// returns `Ok(None)` until a whole frame is buffered. Progress through a
/// partial reply is kept between calls: elements of arrays that are still
/// incomplete are decoded once and parked on a stack, so every buffered byte
/// is scanned a single time however many reads a large reply takes.
///
/// [`decode`]: Decoder::decode
#[derive(Debug)]
pub struct Decoder {
    buf: BytesMut,
    max_frame_size: usize,
    /// Offset of the first byte not yet decoded into `pending`.
    cursor: usize,
    /// Arrays whose header has been read but not all of their elements.
    pending: Vec<PendingArray>,
}

#[derive(Debug)]
struct PendingArray {
    remaining: usize,
    items: Vec<Frame>,
}

/// One step of decoding: a finished frame or the header of a non-empty array.
enum Step {
    Frame(Frame, usize),
    ArrayStart(usize, usize),
}

impl Decoder {
    /// Creates a new decoder with an empty buffer.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates a decoder rejecting frames larger than `max_frame_size` bytes.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_size,
            cursor: 0,
            pending: Vec::new(),
        }
    }

    /// Appends raw bytes read from the network.
    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Returns true when no undecoded bytes are buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Attempts to decode one frame from the buffer.
    pub fn decode(&mut self) -> Result<Option<Frame>> {
        if self.buf.len() > self.max_frame_size {
            return Err(protocol("buffer size exceeded maximum frame size"));
        }

        loop {
            let Some(step) = parse_step(&self.buf, self.cursor, self.max_frame_size)? else {
                return Ok(None);
            };
            let mut frame = match step {
                Step::ArrayStart(len, next) => {
                    self.pending.push(PendingArray {
                        remaining: len,
                        items: Vec::with_capacity(len.min(1024)),
                    });
                    self.cursor = next;
                    continue;
                }
                Step::Frame(frame, next) => {
                    self.cursor = next;
                    frame
                }
            };

            // fold the finished frame into its parents, closing every array
            // it completes
            loop {
                let Some(parent) = self.pending.last_mut() else {
                    self.buf.advance(self.cursor);
                    self.cursor = 0;
                    return Ok(Some(frame));
                };
                parent.items.push(frame);
                parent.remaining -= 1;
                if parent.remaining > 0 {
                    break;
                }
                let done = self.pending.pop().map(|p| p.items).unwrap_or_default();
                frame = Frame::Array(done);
            }
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn protocol(message: &str) -> Error {
    Error::Protocol {
        message: message.to_string(),
    }
}

/// Decodes one scalar frame, or one array header, starting at `pos`.
fn parse_step(buf: &[u8], pos: usize, max: usize) -> Result<Option<Step>> {
    let Some(end) = find_crlf(buf, pos + 1) else {
        return Ok(None);
    };
    let line = &buf[pos + 1..end];
    let next = end + 2;

    match buf[pos] {
        b'+' => Ok(Some(Step::Frame(Frame::SimpleString(line.to_vec()), next))),
        b'-' => Ok(Some(Step::Frame(Frame::Error(line.to_vec()), next))),
        b':' => Ok(Some(Step::Frame(Frame::Integer(parse_int(line)?), next))),
        b'$' => {
            let len = parse_int(line)?;
            if len < 0 {
                return Ok(Some(Step::Frame(Frame::BulkString(None), next)));
            }
            let len = len as usize;
            if len > max {
                return Err(protocol("bulk string length exceeds maximum frame size"));
            }
            if buf.len() < next + len + 2 {
                return Ok(None);
            }
            if &buf[next + len..next + len + 2] != b"\r\n" {
                return Err(protocol("bulk string missing terminator"));
            }
            let data = Bytes::copy_from_slice(&buf[next..next + len]);
            Ok(Some(Step::Frame(Frame::BulkString(Some(data)), next + len + 2)))
        }
        b'*' => {
            let len = parse_int(line)?;
            if len < 0 {
                return Ok(Some(Step::Frame(Frame::Null, next)));
            }
            let len = len as usize;
            // every element needs at least 4 bytes (":0\r\n")
            if len > max / 4 {
                return Err(protocol("array length exceeds reasonable maximum"));
            }
            if len == 0 {
                return Ok(Some(Step::Frame(Frame::Array(Vec::new()), next)));
            }
            Ok(Some(Step::ArrayStart(len, next)))
        }
        other => Err(Error::Protocol {
            message: format!("unknown frame type: {}", other as char),
        }),
    }
}

fn parse_int(line: &[u8]) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| protocol("invalid integer"))
}

fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    if from >= buf.len() {
        return None;
    }
    buf[from..]
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|i| from + i)
}
