//! RESP2 framing: command encoding and incremental reply decoding.
//!
//! Commands always go out as an array of bulk strings. Replies are decoded
//! from a growable read buffer by a [`ReplyDecoder`], which keeps its place
//! between reads so a reply that arrives in many chunks is parsed once.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, TransportError};
use crate::reply::Reply;

/// Largest bulk payload accepted from a peer (512 MiB, the server-side limit).
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Nesting limit for array replies.
const MAX_DEPTH: usize = 32;

const CRLF: &[u8] = b"\r\n";

/// Encodes a command as a RESP array of bulk strings.
pub fn encode_command(argv: &[Bytes]) -> Bytes {
    let payload: usize = argv.iter().map(|arg| arg.len() + 16).sum();
    let mut out = BytesMut::with_capacity(16 + payload);
    out.put_slice(format!("*{}\r\n", argv.len()).as_bytes());
    for arg in argv {
        out.put_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.put_slice(arg);
        out.put_slice(CRLF);
    }
    out.freeze()
}

/// Resumable reply decoder.
///
/// Complete scalars and array elements are consumed from the buffer as soon
/// as they arrive; unfinished arrays are kept on an internal stack. Each byte
/// is parsed once no matter how many reads a reply takes. One decoder serves
/// one byte stream; after an error it starts over from a clean state.
#[derive(Debug, Default)]
pub struct ReplyDecoder {
    stack: Vec<PendingArray>,
    // Bytes at the front of the buffer already searched for a line end.
    scanned: usize,
}

#[derive(Debug)]
struct PendingArray {
    len: usize,
    items: Vec<Reply>,
}

enum Frame {
    Value(Reply),
    ArrayStart(usize),
}

impl ReplyDecoder {
    /// Creates an idle decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no reply is partially decoded.
    pub fn is_idle(&self) -> bool {
        self.stack.is_empty()
    }

    /// Drops any partially decoded reply.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.scanned = 0;
    }

    /// Decodes the next reply from the front of `buf`.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Whatever was decoded so
    /// far is removed from `buf` and kept by the decoder.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Reply>> {
        let result = self.decode_frames(buf);
        if result.is_err() {
            self.reset();
        }
        result
    }

    fn decode_frames(&mut self, buf: &mut BytesMut) -> Result<Option<Reply>> {
        loop {
            let value = match self.next_frame(buf)? {
                None => return Ok(None),
                Some(Frame::Value(value)) => value,
                Some(Frame::ArrayStart(0)) => Reply::Array(Vec::new()),
                Some(Frame::ArrayStart(len)) => {
                    if self.stack.len() >= MAX_DEPTH {
                        return Err(TransportError::protocol("array nesting too deep"));
                    }
                    self.stack.push(PendingArray {
                        len,
                        items: Vec::with_capacity(len.min(1024)),
                    });
                    continue;
                }
            };
            if let Some(reply) = self.complete(value) {
                return Ok(Some(reply));
            }
        }
    }

    // Folds a finished value into the enclosing arrays.
    fn complete(&mut self, mut value: Reply) -> Option<Reply> {
        while let Some(mut top) = self.stack.pop() {
            top.items.push(value);
            if top.items.len() < top.len {
                self.stack.push(top);
                return None;
            }
            value = Reply::Array(top.items);
        }
        Some(value)
    }

    fn next_frame(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>> {
        let Some(&tag) = buf.first() else {
            return Ok(None);
        };
        let Some(line_end) = self.find_line_end(buf) else {
            return Ok(None);
        };
        let line = &buf[1..line_end];
        let next = line_end + CRLF.len();

        let frame = match tag {
            b'+' => Frame::Value(Reply::Status(String::from_utf8_lossy(line).into_owned())),
            b'-' => Frame::Value(Reply::Error(String::from_utf8_lossy(line).into_owned())),
            b':' => Frame::Value(Reply::Integer(parse_int(line)?)),
            b'$' => {
                let len = parse_int(line)?;
                if len == -1 {
                    Frame::Value(Reply::Nil)
                } else {
                    if !(0..=MAX_BULK_LEN).contains(&len) {
                        return Err(TransportError::protocol(format!("invalid bulk length {}", len)));
                    }
                    let len = len as usize;
                    let end = next + len;
                    if buf.len() < end + CRLF.len() {
                        return Ok(None);
                    }
                    if &buf[end..end + CRLF.len()] != CRLF {
                        return Err(TransportError::protocol("bulk string not terminated by CRLF"));
                    }
                    buf.advance(next);
                    let payload = buf.split_to(len).freeze();
                    buf.advance(CRLF.len());
                    self.scanned = 0;
                    return Ok(Some(Frame::Value(Reply::Bulk(payload))));
                }
            }
            b'*' => {
                let count = parse_int(line)?;
                if count == -1 {
                    Frame::Value(Reply::Nil)
                } else if count < 0 {
                    return Err(TransportError::protocol(format!("invalid array length {}", count)));
                } else {
                    Frame::ArrayStart(count as usize)
                }
            }
            other => {
                return Err(TransportError::protocol(format!(
                    "unexpected type byte 0x{:02X}",
                    other
                )))
            }
        };
        buf.advance(next);
        self.scanned = 0;
        Ok(Some(frame))
    }

    fn find_line_end(&mut self, buf: &[u8]) -> Option<usize> {
        let found = find_crlf(buf, self.scanned.max(1));
        if found.is_none() {
            // A trailing '\r' may pair with the next read's '\n'.
            self.scanned = buf.len().saturating_sub(1).max(1);
        }
        found
    }
}

fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    if from >= buf.len() {
        return None;
    }
    buf[from..]
        .windows(CRLF.len())
        .position(|w| w == CRLF)
        .map(|offset| from + offset)
}

fn parse_int(line: &[u8]) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            TransportError::protocol(format!(
                "invalid integer {:?}",
                String::from_utf8_lossy(line)
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_all(bytes: &[u8]) -> Result<Option<Reply>> {
        let mut buf = BytesMut::from(bytes);
        ReplyDecoder::new().decode(&mut buf)
    }

    #[test]
    fn test_encode_command() {
        let argv = vec![Bytes::from_static(b"SET"), Bytes::from_static(b"foo"), Bytes::new()];
        let encoded = encode_command(&argv);
        assert_eq!(&encoded[..], b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$0\r\n\r\n");
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode_all(b"+OK\r\n").unwrap(), Some(Reply::Status("OK".into())));
        assert_eq!(
            decode_all(b"-MOVED 3999 127.0.0.1:6381\r\n").unwrap(),
            Some(Reply::Error("MOVED 3999 127.0.0.1:6381".into()))
        );
        assert_eq!(decode_all(b":-42\r\n").unwrap(), Some(Reply::Integer(-42)));
        assert_eq!(decode_all(b"$-1\r\n").unwrap(), Some(Reply::Nil));
        assert_eq!(decode_all(b"*-1\r\n").unwrap(), Some(Reply::Nil));
        assert_eq!(decode_all(b"$5\r\nhe\r\no\r\n").unwrap(), Some(Reply::bulk("he\r\no")));
    }

    #[test]
    fn test_decode_cluster_slots_shape() {
        let raw = b"*1\r\n*3\r\n:0\r\n:5460\r\n*2\r\n$9\r\n127.0.0.1\r\n:7000\r\n";
        let reply = decode_all(raw).unwrap().unwrap();
        let entries = reply.as_array().unwrap();
        let entry = entries[0].as_array().unwrap();
        assert_eq!(entry[0].as_integer(), Some(0));
        assert_eq!(entry[1].as_integer(), Some(5460));
        let owner = entry[2].as_array().unwrap();
        assert_eq!(owner[0].as_bulk_str(), Some("127.0.0.1"));
        assert_eq!(owner[1].as_integer(), Some(7000));
    }

    #[test]
    fn test_partial_reply_keeps_finished_elements() {
        let mut decoder = ReplyDecoder::new();
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nfoo\r\n$3\r\nba"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"$3\r\nba");
        assert!(!decoder.is_idle());
        buf.extend_from_slice(b"r\r\n");
        assert_eq!(
            decoder.decode(&mut buf).unwrap(),
            Some(Reply::Array(vec![Reply::bulk("foo"), Reply::bulk("bar")]))
        );
        assert!(buf.is_empty());
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_line_end_split_between_reads() {
        let mut decoder = ReplyDecoder::new();
        let mut buf = BytesMut::from(&b"+PONG\r"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"\n");
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(Reply::Status("PONG".into())));
    }

    #[test]
    fn test_byte_at_a_time_matches_whole_buffer() {
        let raw: &[u8] = b"*2\r\n*3\r\n:0\r\n:5460\r\n*2\r\n$9\r\n127.0.0.1\r\n:7000\r\n*0\r\n";
        let whole = decode_all(raw).unwrap().unwrap();

        let mut decoder = ReplyDecoder::new();
        let mut buf = BytesMut::new();
        let mut decoded = None;
        for (i, byte) in raw.iter().enumerate() {
            buf.extend_from_slice(&[*byte]);
            decoded = decoder.decode(&mut buf).unwrap();
            if i + 1 < raw.len() {
                assert!(decoded.is_none());
            }
        }
        assert_eq!(decoded, Some(whole));
    }

    #[test]
    fn test_large_array_in_chunks_is_consumed_as_it_arrives() {
        const ELEMENTS: usize = 200_000;
        const ELEMENT: &[u8] = b"$5\r\nhello\r\n";
        const CHUNK: usize = 16 * 1024;

        let mut wire = format!("*{}\r\n", ELEMENTS).into_bytes();
        for _ in 0..ELEMENTS {
            wire.extend_from_slice(ELEMENT);
        }

        let mut decoder = ReplyDecoder::new();
        let mut buf = BytesMut::with_capacity(CHUNK);
        let mut decoded = None;
        for chunk in wire.chunks(CHUNK) {
            assert!(decoded.is_none());
            buf.extend_from_slice(chunk);
            decoded = decoder.decode(&mut buf).unwrap();
            assert!(buf.len() < ELEMENT.len(), "{} bytes left buffered", buf.len());
        }
        assert!(buf.is_empty());
        assert!(decoder.is_idle());

        let items = decoded.unwrap().as_array().unwrap().to_vec();
        assert_eq!(items.len(), ELEMENTS);
        assert!(items.iter().all(|item| item.as_bulk_str() == Some("hello")));
        assert_eq!(decode_all(&wire).unwrap(), Some(Reply::Array(items)));
    }

    #[test]
    fn test_consecutive_replies() {
        let mut decoder = ReplyDecoder::new();
        let mut buf = BytesMut::from(&b"+OK\r\n:1\r\n"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(Reply::Status("OK".into())));
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(Reply::Integer(1)));
        assert_eq!(decoder.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(decode_all(b"?what\r\n").is_err());
        assert!(decode_all(b":12x\r\n").is_err());
        assert!(decode_all(b"$-5\r\n").is_err());
        assert!(decode_all(b"$3\r\nfooXY").is_err());
        assert!(decode_all(b"*-2\r\n").is_err());
    }

    #[test]
    fn test_rejects_oversized_bulk() {
        let raw = format!("${}\r\n", MAX_BULK_LEN + 1);
        assert!(decode_all(raw.as_bytes()).is_err());
    }

    #[test]
    fn test_rejects_deep_nesting() {
        let raw = "*1\r\n".repeat(MAX_DEPTH + 2);
        assert!(decode_all(raw.as_bytes()).is_err());
    }

    #[test]
    fn test_error_resets_decoder() {
        let mut decoder = ReplyDecoder::new();
        let mut buf = BytesMut::from(&b"*2\r\n:1\r\n?bad\r\n"[..]);
        assert!(decoder.decode(&mut buf).is_err());
        assert!(decoder.is_idle());

        let mut buf = BytesMut::from(&b":7\r\n"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(Reply::Integer(7)));
    }

    proptest! {
        #[test]
        fn prop_split_anywhere_decodes_once(payload in proptest::collection::vec(any::<u8>(), 0..64), split in 0usize..80) {
            let mut wire = format!("${}\r\n", payload.len()).into_bytes();
            wire.extend_from_slice(&payload);
            wire.extend_from_slice(b"\r\n");
            let split = split.min(wire.len());

            let mut decoder = ReplyDecoder::new();
            let mut buf = BytesMut::from(&wire[..split]);
            let first = decoder.decode(&mut buf).unwrap();
            if split < wire.len() {
                prop_assert!(first.is_none());
                buf.extend_from_slice(&wire[split..]);
                let second = decoder.decode(&mut buf).unwrap();
                prop_assert_eq!(second, Some(Reply::Bulk(Bytes::from(payload))));
            } else {
                prop_assert_eq!(first, Some(Reply::Bulk(Bytes::from(payload))));
            }
            prop_assert!(buf.is_empty());
        }
    }
}
