//! Line framing for the IRC connection.
//!
//! Decoding splits on `\n` with `AnyDelimiterCodec` and drops a trailing
//! `\r`. IRC has no declared charset: UTF-8 lines decode as such, anything
//! else is read as Latin-1. Lines over [`MAX_LINE_LENGTH`] are skipped.
//! Encoding terminates every line with `\r\n` as RFC 1459 asks.

use std::io;

use bytes::BytesMut;
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, Encoder};

/// Longest inbound line accepted; longer ones are discarded.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// `Framed` codec: `String` lines in, `String` lines out.
#[derive(Debug)]
pub struct IrcCodec {
    chunks: AnyDelimiterCodec,
}

impl IrcCodec {
    pub fn new() -> Self {
        Self {
            chunks: AnyDelimiterCodec::new_with_max_length(
                b"\n".to_vec(),
                Vec::new(),
                MAX_LINE_LENGTH,
            ),
        }
    }

    fn next_line(
        &mut self,
        src: &mut BytesMut,
        eof: bool,
    ) -> Result<Option<String>, io::Error> {
        loop {
            let chunk = if eof {
                self.chunks.decode_eof(src)
            } else {
                self.chunks.decode(src)
            };
            match chunk {
                Ok(Some(bytes)) => return Ok(Some(to_line(&bytes))),
                Ok(None) => return Ok(None),
                // The inner codec keeps discarding up to the next delimiter.
                Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => {
                    tracing::debug!(max = MAX_LINE_LENGTH, "skipping overlong irc line");
                }
                Err(AnyDelimiterCodecError::Io(e)) => return Err(e),
            }
        }
    }
}

impl Default for IrcCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn to_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

impl Decoder for IrcCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        self.next_line(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        self.next_line(src, true)
    }
}

impl Encoder<String> for IrcCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(line.len() + 2);
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_strips_crlf() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from(&b"PING :x\r\nPART"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :x"));
        // Incomplete line waits for more bytes.
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_decode_bare_lf_line() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from(&b"PING :x\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :x"));
    }

    #[test]
    fn test_decode_latin1_line_falls_back() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from(&b":bob!b@h PRIVMSG #osu :caf\xe9\r\n"[..]);

        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some(":bob!b@h PRIVMSG #osu :caf\u{e9}")
        );
    }

    #[test]
    fn test_decode_utf8_line_kept() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from("PRIVMSG #osu :café\r\n".as_bytes());

        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("PRIVMSG #osu :café")
        );
    }

    #[test]
    fn test_decode_overlong_line_skipped() {
        let mut codec = IrcCodec::new();
        let mut data = vec![b'a'; MAX_LINE_LENGTH + 1];
        data.extend_from_slice(b"\r\nPING :x\r\n");
        let mut buf = BytesMut::from(data.as_slice());

        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("PING :x"));
    }

    #[test]
    fn test_decode_eof_returns_unterminated_line() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from(&b"ERROR :bye"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("ERROR :bye"));
    }

    #[test]
    fn test_encode_appends_crlf() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::new();

        codec.encode("NICK alice".to_string(), &mut buf).unwrap();

        assert_eq!(&buf[..], b"NICK alice\r\n");
    }
}
