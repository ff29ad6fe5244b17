use bytes::{BufMut, BytesMut};

use crate::proto::frame::Frame;

/// Serializes [`Frame`]s into RESP bytes.
///
/// Frames accumulate in an internal buffer until [`take`](Encoder::take) is
/// called, so a request and its `ASKING` prefix can share one write.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    /// Creates a new encoder with an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Appends the RESP encoding of `frame` to the buffer.
    pub fn encode(&mut self, frame: &Frame) {
        match frame {
            Frame::SimpleString(s) => self.line(b'+', s),
            Frame::Error(e) => self.line(b'-', e),
            Frame::Integer(n) => self.line(b':', n.to_string().as_bytes()),
            Frame::BulkString(Some(data)) => {
                self.line(b'$', data.len().to_string().as_bytes());
                self.buf.extend_from_slice(data);
                self.buf.extend_from_slice(b"\r\n");
            }
            Frame::BulkString(None) => self.buf.extend_from_slice(b"$-1\r\n"),
            Frame::Array(items) => {
                self.line(b'*', items.len().to_string().as_bytes());
                for item in items {
                    self.encode(item);
                }
            }
            Frame::Null => self.buf.extend_from_slice(b"*-1\r\n"),
        }
    }

    fn line(&mut self, prefix: u8, body: &[u8]) {
        self.buf.put_u8(prefix);
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\r\n");
    }

    /// Takes the encoded data, leaving the encoder empty and reusable.
    pub fn take(&mut self) -> BytesMut {
        self.buf.split()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(frame: Frame) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.encode(&frame);
        encoder.take().to_vec()
    }

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encoded(Frame::simple("OK")), b"+OK\r\n");
        assert_eq!(encoded(Frame::error("ERR")), b"-ERR\r\n");
        assert_eq!(encoded(Frame::Integer(-7)), b":-7\r\n");
    }

    #[test]
    fn test_encode_null_variants_differ() {
        assert_eq!(encoded(Frame::BulkString(None)), b"$-1\r\n");
        assert_eq!(encoded(Frame::Null), b"*-1\r\n");
    }

    #[test]
    fn test_encode_command() {
        let frame = Frame::Array(vec![Frame::bulk("GET"), Frame::bulk("user:1")]);
        assert_eq!(encoded(frame), b"*2\r\n$3\r\nGET\r\n$6\r\nuser:1\r\n");
    }

    #[test]
    fn test_take_resets_buffer() {
        let mut encoder = Encoder::new();
        encoder.encode(&Frame::simple("A"));
        assert_eq!(encoder.take().as_ref(), b"+A\r\n");
        encoder.encode(&Frame::simple("B"));
        assert_eq!(encoder.take().as_ref(), b"+B\r\n");
    }
}
