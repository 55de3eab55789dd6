//! Frame pack/unpack: a fixed 16-byte header, CRC32 integrity, AES-CTR
//! confidentiality and a monotonic per-direction sequence number.
//!
//! `FrameCodec` is a [`tokio_util::codec`] `Encoder`/`Decoder` pair driven
//! over a plain `TcpStream` half via
//! `tokio_util::codec::{FramedRead, FramedWrite}`.
//!
//! | field    | size    | meaning                                 |
//! |----------|---------|-----------------------------------------|
//! | type     | 2 bytes | message kind (`MessageKind` as u16, LE)  |
//! | length   | 2 bytes | payload length in bytes (LE)             |
//! | checksum | 4 bytes | CRC32 of the full frame with checksum=0  |
//! | nonce    | 8 bytes | AES-CTR nonce, fresh per frame            |
//! | payload  | length  | AES-CTR ciphertext of UTF-8 JSON object  |

use bytes::{BufMut, BytesMut};
use log::{debug, warn};
use tokio_util::codec::{Decoder, Encoder};

use crate::crypto::{self, KEY_LEN, NONCE_LEN};
use crate::error::GameError;
use crate::messages::{Envelope, Payload};

pub const HEADER_LEN: usize = 16;
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024;

/// Per-connection, per-direction framing state. One instance drives the
/// outbound `seq_out` counter, a second (independent) instance the inbound
/// `seq_in` counter.
pub struct FrameCodec {
    key: [u8; KEY_LEN],
    seq_out: u64,
    seq_in: u64,
}

impl FrameCodec {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        FrameCodec {
            key,
            seq_out: 0,
            seq_in: 0,
        }
    }

    pub fn seq_out(&self) -> u64 {
        self.seq_out
    }

    pub fn seq_in(&self) -> u64 {
        self.seq_in
    }
}

impl Encoder<Payload> for FrameCodec {
    type Error = GameError;

    fn encode(&mut self, item: Payload, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let kind: u16 = item.kind().into();

        let envelope = Envelope {
            data: item,
            seq: self.seq_out,
        };
        let plaintext = serde_json::to_vec(&envelope)?;

        if plaintext.len() > MAX_PAYLOAD_LEN {
            return Err(GameError::Protocol(format!(
                "payload of {} bytes exceeds the {} byte limit",
                plaintext.len(),
                MAX_PAYLOAD_LEN
            )));
        }

        let nonce: [u8; NONCE_LEN] = rand::random();
        let mut ciphertext = plaintext;
        crypto::apply_keystream(&self.key, &nonce, &mut ciphertext);

        let length = ciphertext.len() as u16;

        let mut frame = BytesMut::with_capacity(HEADER_LEN + ciphertext.len());
        frame.put_u16_le(kind);
        frame.put_u16_le(length);
        frame.put_u32_le(0); // checksum placeholder, zeroed for the CRC computation
        frame.put_slice(&nonce);
        frame.put_slice(&ciphertext);

        let checksum = crc32fast::hash(&frame);
        frame[4..8].copy_from_slice(&checksum.to_le_bytes());

        dst.put_slice(&frame);
        self.seq_out += 1;
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Payload;
    type Error = GameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < HEADER_LEN {
                return Ok(None);
            }

            let length = u16::from_le_bytes([src[2], src[3]]) as usize;
            let total_len = HEADER_LEN + length;

            if src.len() < total_len {
                src.reserve(total_len - src.len());
                return Ok(None);
            }

            let frame = src.split_to(total_len);

            let kind = u16::from_le_bytes([frame[0], frame[1]]);
            let expected_checksum = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
            let mut nonce = [0u8; NONCE_LEN];
            nonce.copy_from_slice(&frame[8..HEADER_LEN]);

            let mut check_buf = BytesMut::from(&frame[..]);
            check_buf[4..8].copy_from_slice(&0u32.to_le_bytes());
            let actual_checksum = crc32fast::hash(&check_buf);

            if actual_checksum != expected_checksum {
                warn!("dropping corrupted frame (kind {kind}): CRC mismatch");
                continue;
            }

            let mut ciphertext = frame[HEADER_LEN..].to_vec();
            crypto::apply_keystream(&self.key, &nonce, &mut ciphertext);

            let envelope: Envelope = match serde_json::from_slice(&ciphertext) {
                Ok(e) => e,
                Err(e) => {
                    warn!("dropping frame with unparsable payload: {e}");
                    continue;
                }
            };

            if envelope.seq != self.seq_in {
                warn!(
                    "dropping frame with bad sequence number: expected {}, got {}",
                    self.seq_in, envelope.seq
                );
                continue;
            }

            self.seq_in += 1;
            debug!("decoded frame kind {kind} at seq {}", envelope.seq);
            return Ok(Some(envelope.data));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(item) => Ok(Some(item)),
            None if buf.is_empty() => Ok(None),
            None => Err(GameError::ConnectionLost(
                "connection closed with a partial frame buffered".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec_pair() -> (FrameCodec, FrameCodec) {
        let key = crypto::derive_key("test passphrase");
        (FrameCodec::new(key), FrameCodec::new(key))
    }

    #[test]
    fn round_trip_single_frame() {
        let (mut enc, mut dec) = codec_pair();
        let mut buf = BytesMut::new();

        enc.encode(Payload::chat("hello"), &mut buf).unwrap();
        let decoded = dec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded, Payload::chat("hello"));
        assert!(buf.is_empty());
    }

    #[test]
    fn sequence_counters_increase_monotonically() {
        let (mut enc, mut dec) = codec_pair();
        let mut buf = BytesMut::new();

        for i in 0..5 {
            enc.encode(Payload::s_msg(format!("msg {i}")), &mut buf)
                .unwrap();
        }
        assert_eq!(enc.seq_out(), 5);

        for i in 0..5 {
            let decoded = dec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(decoded, Payload::s_msg(format!("msg {i}")));
        }
        assert_eq!(dec.seq_in(), 5);
    }

    #[test]
    fn partial_frame_returns_none_until_complete() {
        let (mut enc, mut dec) = codec_pair();
        let mut full = BytesMut::new();
        enc.encode(Payload::chat("partial"), &mut full).unwrap();

        let mut buf = BytesMut::from(&full[..full.len() - 1]);
        assert!(dec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&full[full.len() - 1..]);
        assert_eq!(dec.decode(&mut buf).unwrap().unwrap(), Payload::chat("partial"));
    }

    #[test]
    fn single_bit_crc_flip_is_rejected() {
        let (mut enc, mut dec) = codec_pair();
        let mut buf = BytesMut::new();
        enc.encode(Payload::chat("hi"), &mut buf).unwrap();

        // flip one bit in the payload, leaving the checksum stale
        let last = buf.len() - 1;
        buf[last] ^= 0x01;

        assert!(dec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty(), "corrupted frame must be fully consumed");
    }

    #[test]
    fn replayed_frame_is_dropped_then_next_is_accepted() {
        let (mut enc, mut dec) = codec_pair();
        let mut first = BytesMut::new();
        enc.encode(Payload::chat("one"), &mut first).unwrap();
        let replay = first.clone();

        assert_eq!(
            dec.decode(&mut first).unwrap().unwrap(),
            Payload::chat("one")
        );

        let mut second = BytesMut::new();
        enc.encode(Payload::chat("two"), &mut second).unwrap();

        // replay the already-consumed frame (seq 0) followed by the legitimate
        // next frame (seq 1, now expected) in the same buffer
        let mut combined = replay;
        combined.extend_from_slice(&second);

        let decoded = dec.decode(&mut combined).unwrap().unwrap();
        assert_eq!(decoded, Payload::chat("two"));
    }

    #[test]
    fn encrypt_then_decrypt_round_trips_with_same_key() {
        let key = crypto::derive_key("shared secret");
        let nonce = [3u8; NONCE_LEN];
        let plaintext = b"A1 V".to_vec();

        let mut ciphertext = plaintext.clone();
        crypto::apply_keystream(&key, &nonce, &mut ciphertext);
        let mut roundtripped = ciphertext;
        crypto::apply_keystream(&key, &nonce, &mut roundtripped);

        assert_eq!(roundtripped, plaintext);
    }
}
