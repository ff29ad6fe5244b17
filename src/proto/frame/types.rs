use bytes::Bytes;

/// A RESP (Redis Serialization Protocol) frame.
///
/// Requests are always arrays of bulk strings; replies can be any variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Simple string (+OK).
    SimpleString(Vec<u8>),
    /// Error (-ERR).
    Error(Vec<u8>),
    /// Integer (:1000).
    Integer(i64),
    /// Bulk string ($6\r\nfoobar). `None` is the null bulk string.
    BulkString(Option<Bytes>),
    /// Array (*2\r\n...).
    Array(Vec<Frame>),
    /// Null array (*-1).
    Null,
}

impl Frame {
    /// Builds a bulk string frame from anything convertible to [`Bytes`].
    pub fn bulk(data: impl Into<Bytes>) -> Self {
        Frame::BulkString(Some(data.into()))
    }

    /// Builds a simple string frame.
    pub fn simple(s: &str) -> Self {
        Frame::SimpleString(s.as_bytes().to_vec())
    }

    /// Builds an error frame.
    pub fn error(msg: impl AsRef<str>) -> Self {
        Frame::Error(msg.as_ref().as_bytes().to_vec())
    }

    /// Returns true for both null encodings (`$-1` and `*-1`).
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Null | Frame::BulkString(None))
    }

    /// Returns the payload of a simple or bulk string as text, lossily.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Frame::SimpleString(s) => Some(String::from_utf8_lossy(s).into_owned()),
            Frame::BulkString(Some(b)) => Some(String::from_utf8_lossy(b).into_owned()),
            _ => None,
        }
    }

    /// Returns the command name of a request frame, upper-cased.
    pub fn command_name(&self) -> Option<String> {
        match self {
            Frame::Array(items) => items.first().and_then(Frame::as_text).map(|s| s.to_uppercase()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_null_covers_both_encodings() {
        assert!(Frame::Null.is_null());
        assert!(Frame::BulkString(None).is_null());
        assert!(!Frame::Integer(0).is_null());
        assert!(!Frame::bulk("").is_null());
    }

    #[test]
    fn test_as_text() {
        assert_eq!(Frame::simple("OK").as_text(), Some("OK".to_string()));
        assert_eq!(Frame::bulk("hello").as_text(), Some("hello".to_string()));
        assert_eq!(Frame::Integer(3).as_text(), None);
    }

    #[test]
    fn test_command_name() {
        let frame = Frame::Array(vec![Frame::bulk("blpop"), Frame::bulk("q"), Frame::bulk("0")]);
        assert_eq!(frame.command_name(), Some("BLPOP".to_string()));
        assert_eq!(Frame::Null.command_name(), None);
    }
}
