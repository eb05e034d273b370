//! # Wire Codec
//!
//! [`NetworkMessage`] is the byte buffer every inbound and outbound message
//! lives in. All integers are little-endian, strings are prefixed with a
//! 16-bit length, positions are `x:u16 y:u16 z:u8`.
//!
//! ## Reading
//! Reads never fail. A read that would cross the end of the message sets
//! the overrun flag and yields a zero value (or an empty string); callers
//! check [`NetworkMessage::is_overrun`] once a logical unit is decoded.
//!
//! ## Writing
//! Writes grow the buffer as needed. The first [`HEADER_LENGTH`] bytes of
//! storage are reserved so transport headers (length, checksum) can be
//! prepended without copying the body.

use bytes::BytesMut;
use ots_core::Position;

/// Bytes reserved in front of the body for transport headers
pub const HEADER_LENGTH: usize = 8;

/// Largest message the transport accepts
pub const MAX_MESSAGE_SIZE: usize = 24590;

/// Client-facing item encoding: sprite id plus an optional count/subtype byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemDescriptor {
    pub client_id: u16,
    pub subtype: Option<u8>,
}

impl ItemDescriptor {
    pub const fn plain(client_id: u16) -> Self {
        Self {
            client_id,
            subtype: None,
        }
    }

    pub const fn with_subtype(client_id: u16, subtype: u8) -> Self {
        Self {
            client_id,
            subtype: Some(subtype),
        }
    }
}

/// Client fluid colors indexed by the low three bits of a fluid type
const FLUID_MAP: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

/// Translate a server fluid type to the color byte the client renders
pub fn fluid_to_client(fluid_type: u16) -> u8 {
    FLUID_MAP[(fluid_type & 7) as usize]
}

/// Growable message buffer with a read/write cursor
#[derive(Debug, Clone)]
pub struct NetworkMessage {
    buffer: BytesMut,
    /// Offset of the first body byte; shrinks as headers are prepended
    start: usize,
    /// Number of body bytes counted from `start`
    length: usize,
    /// Absolute cursor into `buffer`
    position: usize,
    overrun: bool,
}

impl NetworkMessage {
    /// Create an empty outbound message
    pub fn new() -> Self {
        let mut buffer = BytesMut::with_capacity(HEADER_LENGTH + 64);
        buffer.resize(HEADER_LENGTH, 0);
        Self {
            buffer,
            start: HEADER_LENGTH,
            length: 0,
            position: HEADER_LENGTH,
            overrun: false,
        }
    }

    /// Wrap a received body for decoding; the cursor starts at its first byte
    pub fn from_body(body: &[u8]) -> Self {
        let mut buffer = BytesMut::with_capacity(HEADER_LENGTH + body.len());
        buffer.resize(HEADER_LENGTH, 0);
        buffer.extend_from_slice(body);
        Self {
            buffer,
            start: HEADER_LENGTH,
            length: body.len(),
            position: HEADER_LENGTH,
            overrun: false,
        }
    }

    /// Number of body bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    pub fn is_overrun(&self) -> bool {
        self.overrun
    }

    /// Cursor position relative to the body start
    #[inline]
    pub fn position(&self) -> usize {
        self.position.saturating_sub(self.start)
    }

    /// Bytes left between the cursor and the end of the body
    #[inline]
    pub fn remaining(&self) -> usize {
        (self.start + self.length).saturating_sub(self.position)
    }

    /// Body bytes, headers included once prepended
    pub fn body(&self) -> &[u8] {
        &self.buffer[self.start..self.start + self.length]
    }

    /// Bytes at `offset..offset + size` from the body start
    ///
    /// Unlike [`body`](Self::body) this reaches past the current length, so
    /// data written after a forward seek can be read before backpatching.
    pub fn written_range(&self, offset: usize, size: usize) -> Option<&[u8]> {
        self.buffer
            .get(self.start + offset..self.start + offset + size)
    }

    pub fn body_mut(&mut self) -> &mut [u8] {
        let end = self.start + self.length;
        &mut self.buffer[self.start..end]
    }

    /// Move the cursor by `count` bytes, backwards when negative
    ///
    /// Seeking does not change the body length; only writes do.
    pub fn skip_bytes(&mut self, count: isize) {
        let target = self.position as isize + count;
        self.position = target.max(0) as usize;
    }

    fn can_read(&mut self, size: usize) -> bool {
        if self.position + size > self.start + self.length {
            self.overrun = true;
            return false;
        }
        true
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        if !self.can_read(N) {
            return None;
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buffer[self.position..self.position + N]);
        self.position += N;
        Some(out)
    }

    pub fn get_u8(&mut self) -> u8 {
        self.read_array::<1>().map(|b| b[0]).unwrap_or(0)
    }

    pub fn get_u16(&mut self) -> u16 {
        self.read_array::<2>().map(u16::from_le_bytes).unwrap_or(0)
    }

    pub fn get_u32(&mut self) -> u32 {
        self.read_array::<4>().map(u32::from_le_bytes).unwrap_or(0)
    }

    pub fn get_u64(&mut self) -> u64 {
        self.read_array::<8>().map(u64::from_le_bytes).unwrap_or(0)
    }

    /// Step back one byte and return it
    ///
    /// Used to read autowalk paths from the end towards the front.
    pub fn get_previous_byte(&mut self) -> u8 {
        if self.position <= self.start {
            self.overrun = true;
            return 0;
        }
        self.position -= 1;
        self.buffer[self.position]
    }

    /// Read a length-prefixed string; bytes are decoded as Latin-1
    pub fn get_string(&mut self) -> String {
        let Some(raw_len) = self.read_array::<2>() else {
            return String::new();
        };
        let len = u16::from_le_bytes(raw_len) as usize;
        if !self.can_read(len) {
            return String::new();
        }
        let text = self.buffer[self.position..self.position + len]
            .iter()
            .map(|&b| b as char)
            .collect();
        self.position += len;
        text
    }

    pub fn get_position(&mut self) -> Position {
        let x = self.get_u16();
        let y = self.get_u16();
        let z = self.get_u8();
        Position::new(x, y, z)
    }

    /// Take every byte from the cursor to the end of the body
    pub fn get_remaining(&mut self) -> Vec<u8> {
        let end = self.start + self.length;
        if self.position >= end {
            return Vec::new();
        }
        let out = self.buffer[self.position..end].to_vec();
        self.position = end;
        out
    }

    /// Mutable view of the next `size` bytes, advancing past them
    ///
    /// Returns `None` (and flags overrun) if fewer bytes remain.
    pub fn take_slice_mut(&mut self, size: usize) -> Option<&mut [u8]> {
        if !self.can_read(size) {
            return None;
        }
        let at = self.position;
        self.position += size;
        Some(&mut self.buffer[at..at + size])
    }

    fn write(&mut self, bytes: &[u8]) {
        let end = self.position + bytes.len();
        if self.buffer.len() < end {
            self.buffer.resize(end, 0);
        }
        self.buffer[self.position..end].copy_from_slice(bytes);
        self.position = end;
        self.length += bytes.len();
    }

    pub fn add_u8(&mut self, value: u8) {
        self.write(&[value]);
    }

    pub fn add_u16(&mut self, value: u16) {
        self.write(&value.to_le_bytes());
    }

    pub fn add_u32(&mut self, value: u32) {
        self.write(&value.to_le_bytes());
    }

    pub fn add_u64(&mut self, value: u64) {
        self.write(&value.to_le_bytes());
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.write(bytes);
    }

    /// Append `count` copies of the XTEA padding byte
    pub fn add_padding(&mut self, count: usize) {
        for _ in 0..count {
            self.add_u8(0x33);
        }
    }

    /// Write a length-prefixed string, encoding characters as Latin-1
    pub fn add_string(&mut self, text: &str) {
        let bytes: Vec<u8> = text
            .chars()
            .map(|c| u8::try_from(c as u32).unwrap_or(b'?'))
            .collect();
        let len = bytes.len().min(u16::MAX as usize);
        self.add_u16(len as u16);
        self.write(&bytes[..len]);
    }

    pub fn add_position(&mut self, pos: Position) {
        self.add_u16(pos.x);
        self.add_u16(pos.y);
        self.add_u8(pos.z);
    }

    pub fn add_item_id(&mut self, client_id: u16) {
        self.add_u16(client_id);
    }

    pub fn add_item(&mut self, item: &ItemDescriptor) {
        self.add_u16(item.client_id);
        if let Some(subtype) = item.subtype {
            self.add_u8(subtype);
        }
    }

    /// Copy another message's body onto the end of this one
    pub fn append(&mut self, other: &NetworkMessage) {
        self.write(other.body());
    }

    /// Place `bytes` directly in front of the body
    fn prepend(&mut self, bytes: &[u8]) {
        if self.start < bytes.len() {
            let mut grown = BytesMut::with_capacity(self.buffer.len() + HEADER_LENGTH);
            grown.resize(HEADER_LENGTH, 0);
            grown.extend_from_slice(&self.buffer);
            self.buffer = grown;
            self.start += HEADER_LENGTH;
            self.position += HEADER_LENGTH;
        }
        self.start -= bytes.len();
        self.buffer[self.start..self.start + bytes.len()].copy_from_slice(bytes);
        self.length += bytes.len();
    }

    pub fn prepend_u16(&mut self, value: u16) {
        self.prepend(&value.to_le_bytes());
    }

    pub fn prepend_u32(&mut self, value: u32) {
        self.prepend(&value.to_le_bytes());
    }
}

impl Default for NetworkMessage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_are_little_endian() {
        let mut msg = NetworkMessage::new();
        msg.add_u8(0xAB);
        msg.add_u16(0x1234);
        msg.add_u32(0xDEAD_BEEF);
        assert_eq!(msg.body(), &[0xAB, 0x34, 0x12, 0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_position_round_trip() {
        let mut msg = NetworkMessage::new();
        msg.add_position(Position::new(32369, 32241, 7));
        let mut read = NetworkMessage::from_body(msg.body());
        assert_eq!(read.get_position(), Position::new(32369, 32241, 7));
        assert!(!read.is_overrun());
    }

    #[test]
    fn test_string_round_trip_including_empty() {
        let mut msg = NetworkMessage::new();
        msg.add_string("");
        msg.add_string("Rook\u{e9}");
        assert_eq!(&msg.body()[..2], &[0, 0]);
        let mut read = NetworkMessage::from_body(msg.body());
        assert_eq!(read.get_string(), "");
        assert_eq!(read.get_string(), "Rook\u{e9}");
        assert_eq!(read.remaining(), 0);
        assert!(!read.is_overrun());
    }

    #[test]
    fn test_read_past_end_sets_overrun() {
        let mut msg = NetworkMessage::from_body(&[0x01]);
        assert_eq!(msg.get_u16(), 0);
        assert!(msg.is_overrun());

        let mut empty = NetworkMessage::from_body(&[]);
        assert_eq!(empty.get_u8(), 0);
        assert!(empty.is_overrun());
    }

    #[test]
    fn test_truncated_string_sets_overrun() {
        let mut msg = NetworkMessage::from_body(&[0x05, 0x00, b'a', b'b']);
        assert_eq!(msg.get_string(), "");
        assert!(msg.is_overrun());
    }

    #[test]
    fn test_negative_skip_backpatch() {
        let mut msg = NetworkMessage::new();
        msg.skip_bytes(4);
        msg.add_u16(0x0006);
        msg.add_u8(0x1F);
        msg.skip_bytes(-7);
        msg.add_u32(0x0102_0304);
        assert_eq!(msg.len(), 7);
        assert_eq!(msg.body(), &[0x04, 0x03, 0x02, 0x01, 0x06, 0x00, 0x1F]);
    }

    #[test]
    fn test_previous_byte_walks_backwards() {
        let mut msg = NetworkMessage::from_body(&[1, 2, 3]);
        msg.skip_bytes(3);
        assert_eq!(msg.get_previous_byte(), 3);
        assert_eq!(msg.get_previous_byte(), 2);
        assert_eq!(msg.get_previous_byte(), 1);
        assert!(!msg.is_overrun());
        msg.get_previous_byte();
        assert!(msg.is_overrun());
    }

    #[test]
    fn test_prepend_uses_reserved_header() {
        let mut msg = NetworkMessage::new();
        msg.add_u8(0x1E);
        msg.prepend_u16(1);
        msg.prepend_u32(0xAABB_CCDD);
        assert_eq!(msg.body(), &[0xDD, 0xCC, 0xBB, 0xAA, 0x01, 0x00, 0x1E]);
        msg.prepend_u16(7);
        msg.prepend_u16(9);
        assert_eq!(&msg.body()[..4], &[0x09, 0x00, 0x07, 0x00]);
        assert_eq!(msg.len(), 11);
    }

    #[test]
    fn test_item_subtype() {
        let mut msg = NetworkMessage::new();
        msg.add_item(&ItemDescriptor::plain(0x0BC3));
        msg.add_item(&ItemDescriptor::with_subtype(0x0BD7, 100));
        assert_eq!(msg.body(), &[0xC3, 0x0B, 0xD7, 0x0B, 100]);
        assert_eq!(fluid_to_client(9), 1);
    }
}
