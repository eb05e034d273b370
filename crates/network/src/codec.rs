//! # Frame Codec
//!
//! [`tokio_util::codec`] adapter over the transport framing in
//! [`ots_protocol::frame`]. One codec instance sits on each half of a
//! connection; both switch to XTEA once the first message installed the
//! session key.
//!
//! ```text
//! {u16 length}{body}
//! ```

use bytes::{Buf, BytesMut};
use ots_core::{OtsError, Result};
use ots_protocol::frame::{self, LENGTH_PREFIX};
use ots_protocol::{NetworkMessage, ProtocolError, XteaKey, MAX_MESSAGE_SIZE};
use tokio_util::codec::{Decoder, Encoder};

/// Largest frame body accepted from a client
pub const MAX_FRAME_BODY: usize = MAX_MESSAGE_SIZE - LENGTH_PREFIX;

/// Length-prefixed game frames, optionally XTEA protected
#[derive(Debug, Default, Clone)]
pub struct GameCodec {
    key: Option<XteaKey>,
}

impl GameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encrypt and decrypt every following frame with `key`
    pub fn install_key(&mut self, key: XteaKey) {
        self.key = Some(key);
    }

    pub fn is_encrypted(&self) -> bool {
        self.key.is_some()
    }
}

impl Decoder for GameCodec {
    type Item = NetworkMessage;
    type Error = OtsError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<NetworkMessage>> {
        if src.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let length = u16::from_le_bytes([src[0], src[1]]) as usize;
        if length > MAX_FRAME_BODY {
            return Err(ProtocolError::FrameTooLarge(length).into());
        }

        let total = LENGTH_PREFIX + length;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        let body = src.split_to(length);
        let msg = frame::open(&body, self.key.as_ref())?;
        Ok(Some(msg))
    }
}

impl Encoder<NetworkMessage> for GameCodec {
    type Error = OtsError;

    fn encode(&mut self, msg: NetworkMessage, dst: &mut BytesMut) -> Result<()> {
        let framed = frame::seal(&msg, self.key.as_ref())?;
        dst.extend_from_slice(&framed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: XteaKey = XteaKey::new([7, 11, 13, 17]);

    fn message(bytes: &[u8]) -> NetworkMessage {
        let mut msg = NetworkMessage::new();
        msg.add_bytes(bytes);
        msg
    }

    #[test]
    fn test_partial_frame_waits_for_more() {
        let mut codec = GameCodec::new();
        let mut src = BytesMut::from(&[0x03, 0x00, 0x1E][..]);
        assert!(codec.decode(&mut src).unwrap().is_none());
        assert_eq!(src.len(), 3);

        src.extend_from_slice(&[0x01, 0x02]);
        let msg = codec.decode(&mut src).unwrap().unwrap();
        assert_eq!(msg.body(), &[0x1E, 0x01, 0x02]);
        assert!(src.is_empty());
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut codec = GameCodec::new();
        let mut src = BytesMut::from(&[0x01, 0x00, 0x14, 0x01, 0x00, 0x1E][..]);
        assert_eq!(codec.decode(&mut src).unwrap().unwrap().body(), &[0x14]);
        assert_eq!(codec.decode(&mut src).unwrap().unwrap().body(), &[0x1E]);
        assert!(codec.decode(&mut src).unwrap().is_none());
    }

    #[test]
    fn test_oversized_frame_is_an_error() {
        let mut codec = GameCodec::new();
        let length = (MAX_FRAME_BODY + 1) as u16;
        let mut src = BytesMut::from(&length.to_le_bytes()[..]);
        assert!(codec.decode(&mut src).is_err());
    }

    #[test]
    fn test_encrypted_frames_after_key_install() {
        let mut sender = GameCodec::new();
        let mut receiver = GameCodec::new();
        sender.install_key(KEY);
        receiver.install_key(KEY);
        assert!(receiver.is_encrypted());

        let mut wire = BytesMut::new();
        sender.encode(message(&[0xA0, 0x01, 0x02, 0x00]), &mut wire).unwrap();
        // length + checksum + one block
        assert_eq!(wire.len(), 2 + 4 + 8);

        let msg = receiver.decode(&mut wire).unwrap().unwrap();
        assert_eq!(msg.body(), &[0xA0, 0x01, 0x02, 0x00]);
    }

    #[test]
    fn test_misaligned_ciphertext_is_an_error() {
        let mut codec = GameCodec::new();
        codec.install_key(KEY);
        let mut src = BytesMut::from(&[0x03, 0x00, 1, 2, 3][..]);
        assert!(codec.decode(&mut src).is_err());
    }
}
