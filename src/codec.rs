//! Framing for the RouterOS API: length-prefixed words grouped into sentences
//! that end with an empty word.

use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::constants::MAX_WORD_LEN;

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SentenceCodec;

impl Decoder for SentenceCodec {
    type Item = Vec<String>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Self::Item>> {
        let mut offset = 0;
        let mut words = Vec::new();
        loop {
            let Some((len, width)) = decode_length(&src[offset..])? else {
                return Ok(None);
            };
            let start = offset + width;
            if len == 0 {
                src.advance(start);
                return Ok(Some(words));
            }
            let end = start + len;
            if src.len() < end {
                src.reserve(end - src.len());
                return Ok(None);
            }
            words.push(String::from_utf8_lossy(&src[start..end]).into_owned());
            offset = end;
        }
    }
}

impl Encoder<Vec<String>> for SentenceCodec {
    type Error = io::Error;

    fn encode(&mut self, words: Vec<String>, dst: &mut BytesMut) -> io::Result<()> {
        for word in words.iter().filter(|word| !word.is_empty()) {
            if word.len() > MAX_WORD_LEN {
                return Err(invalid(format!("word of {} bytes is too long", word.len())));
            }
            encode_length(word.len(), dst);
            dst.put_slice(word.as_bytes());
        }
        dst.put_u8(0);
        Ok(())
    }
}

/// Returns the word length and the width of its prefix, or `None` while the
/// prefix is still incomplete.
fn decode_length(buf: &[u8]) -> io::Result<Option<(usize, usize)>> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    let width = match first {
        b if b & 0x80 == 0x00 => 1,
        b if b & 0xC0 == 0x80 => 2,
        b if b & 0xE0 == 0xC0 => 3,
        b if b & 0xF0 == 0xE0 => 4,
        0xF0 => 5,
        b => return Err(invalid(format!("reserved control byte {b:#04x}"))),
    };
    if buf.len() < width {
        return Ok(None);
    }
    let len = match width {
        1 => first as usize,
        2 => (((first & 0x3F) as usize) << 8) | buf[1] as usize,
        3 => (((first & 0x1F) as usize) << 16) | ((buf[1] as usize) << 8) | buf[2] as usize,
        4 => {
            (((first & 0x0F) as usize) << 24)
                | ((buf[1] as usize) << 16)
                | ((buf[2] as usize) << 8)
                | buf[3] as usize
        }
        _ => u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize,
    };
    if len > MAX_WORD_LEN {
        return Err(invalid(format!("word of {len} bytes is too long")));
    }
    Ok(Some((len, width)))
}

fn encode_length(len: usize, dst: &mut BytesMut) {
    match len {
        0..=0x7F => dst.put_u8(len as u8),
        0x80..=0x3FFF => dst.put_u16(len as u16 | 0x8000),
        0x4000..=0x1F_FFFF => dst.put_slice(&(len as u32 | 0xC0_0000).to_be_bytes()[1..]),
        0x20_0000..=0x0FFF_FFFF => dst.put_u32(len as u32 | 0xE000_0000),
        _ => {
            dst.put_u8(0xF0);
            dst.put_u32(len as u32);
        }
    }
}

fn invalid(reason: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, reason)
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use tokio_util::codec::{Decoder, Encoder};

    use super::{encode_length, SentenceCodec};

    fn prefix(len: usize) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_length(len, &mut buf);
        buf.to_vec()
    }

    #[test]
    fn test_length_prefix_boundaries() {
        assert_eq!(prefix(0x7F), vec![0x7F]);
        assert_eq!(prefix(0x80), vec![0x80, 0x80]);
        assert_eq!(prefix(0x3FFF), vec![0xBF, 0xFF]);
        assert_eq!(prefix(0x4000), vec![0xC0, 0x40, 0x00]);
        assert_eq!(prefix(0x20_0000), vec![0xE0, 0x20, 0x00, 0x00]);
        assert_eq!(prefix(0x1000_0000), vec![0xF0, 0x10, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_login_sentence() {
        let mut buf = BytesMut::new();
        SentenceCodec
            .encode(vec!["/login".into(), "=name=admin".into()], &mut buf)
            .unwrap();
        let mut expected = vec![6];
        expected.extend_from_slice(b"/login");
        expected.push(11);
        expected.extend_from_slice(b"=name=admin");
        expected.push(0);
        assert_eq!(buf.to_vec(), expected);
    }

    #[test]
    fn test_decode_waits_for_full_sentence() {
        let mut codec = SentenceCodec;
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[3]);
        buf.extend_from_slice(b"!re");
        buf.extend_from_slice(&[4]);
        buf.extend_from_slice(b"=a=");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"1");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(&[0, 5]);
        buf.extend_from_slice(b"!done");
        let first = codec.decode(&mut buf).unwrap();
        assert_eq!(first, Some(vec!["!re".to_string(), "=a=1".to_string()]));
        // the next sentence is still missing its terminator
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(&[0]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(vec!["!done".to_string()]));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_long_word() {
        let word = "x".repeat(300);
        let mut buf = BytesMut::new();
        SentenceCodec
            .encode(vec!["!re".into(), word.clone()], &mut buf)
            .unwrap();
        let decoded = SentenceCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded[1], word);
    }

    #[test]
    fn test_reserved_control_byte_is_rejected() {
        let mut buf = BytesMut::from(&[0xF8, 0x00][..]);
        assert!(SentenceCodec.decode(&mut buf).is_err());
    }
}
