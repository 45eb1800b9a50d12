//! Framed message types and the outgoing message builder
//!
//! Every message starts with a little-endian 16-bit header word: the low 13 bits hold the
//! total length including the header, the top 3 bits the message kind. Control kinds carry a
//! 16-bit item id right after the header; data items and acks carry raw payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Size of the header word
pub const HEADER_LEN: usize = 2;

/// Largest frame the header can describe (a length field of 0)
pub const MAX_FRAME_LEN: usize = 8192 + HEADER_LEN;

const LENGTH_MASK: u16 = 0x1FFF;
const KIND_SHIFT: u16 = 13;

/// 3-bit message kind from the header word.
///
/// Host and target share the same 3-bit space. The target-side names for the control kinds
/// are available as associated constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    SetItem = 0,
    ReqItem = 1,
    ReqItemRange = 2,
    Ack = 3,
    DataItem0 = 4,
    DataItem1 = 5,
    DataItem2 = 6,
    DataItem3 = 7,
}

impl MessageKind {
    /// Target response to a set or request
    pub const RESP_ITEM: MessageKind = MessageKind::SetItem;
    /// Target-originated control item
    pub const UNSOLICITED_ITEM: MessageKind = MessageKind::ReqItem;
    /// Target response to a range request
    pub const RESP_ITEM_RANGE: MessageKind = MessageKind::ReqItemRange;

    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => MessageKind::SetItem,
            1 => MessageKind::ReqItem,
            2 => MessageKind::ReqItemRange,
            3 => MessageKind::Ack,
            4 => MessageKind::DataItem0,
            5 => MessageKind::DataItem1,
            6 => MessageKind::DataItem2,
            _ => MessageKind::DataItem3,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Control kinds are the ones followed by an item id
    pub fn is_control(self) -> bool {
        matches!(
            self,
            MessageKind::SetItem | MessageKind::ReqItem | MessageKind::ReqItemRange
        )
    }
}

/// A fully assembled message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedMessage {
    pub kind: MessageKind,
    pub item_id: Option<u16>,
    pub payload: Bytes,
}

impl FramedMessage {
    pub fn new(kind: MessageKind, item_id: Option<u16>, payload: Bytes) -> Self {
        Self {
            kind,
            item_id,
            payload,
        }
    }

    /// Data item or ack with an opaque body
    pub fn data(kind: MessageKind, payload: Bytes) -> Self {
        Self::new(kind, None, payload)
    }

    /// Total length on the wire, header included
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.item_id.map_or(0, |_| 2) + self.payload.len()
    }

    /// Serialize into `buf`: header placeholder, item id, parameters, then the length patch.
    pub fn encode_into(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        let len = self.encoded_len();
        // 8194 is written as a length field of 0; 8192 and 8193 have no encoding
        let field = match len {
            MAX_FRAME_LEN => 0,
            n if n <= LENGTH_MASK as usize => n as u16,
            n => return Err(ProtocolError::TooLong(n)),
        };

        let start = buf.len();
        buf.reserve(len);
        buf.put_u16_le(0);
        if let Some(item) = self.item_id {
            buf.put_u16_le(item);
        }
        buf.put_slice(&self.payload);

        let header = field | ((self.kind.bits() as u16) << KIND_SHIFT);
        buf[start..start + HEADER_LEN].copy_from_slice(&header.to_le_bytes());
        Ok(())
    }

    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Cursor over the parameters that follow the item id
    pub fn params(&self) -> ParamReader<'_> {
        ParamReader::new(&self.payload)
    }
}

/// Decode a header word into `(total length, kind)`. A length field of 0 means the
/// maximal frame.
pub fn parse_header(word: u16) -> (usize, MessageKind) {
    let len = match (word & LENGTH_MASK) as usize {
        0 => MAX_FRAME_LEN,
        n => n,
    };
    (len, MessageKind::from_bits((word >> KIND_SHIFT) as u8))
}

/// Builder for outgoing messages.
///
/// Parameters are appended in call order as little-endian primitives.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    kind: MessageKind,
    item_id: Option<u16>,
    params: BytesMut,
}

impl MessageBuilder {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            item_id: None,
            params: BytesMut::with_capacity(16),
        }
    }

    /// Control message addressed to `item`
    pub fn control(kind: MessageKind, item: u16) -> Self {
        Self::new(kind).item(item)
    }

    pub fn item(mut self, item: u16) -> Self {
        self.item_id = Some(item);
        self
    }

    pub fn u8(mut self, v: u8) -> Self {
        self.params.put_u8(v);
        self
    }

    pub fn i8(mut self, v: i8) -> Self {
        self.params.put_i8(v);
        self
    }

    pub fn u16(mut self, v: u16) -> Self {
        self.params.put_u16_le(v);
        self
    }

    pub fn i16(mut self, v: i16) -> Self {
        self.params.put_i16_le(v);
        self
    }

    pub fn u32(mut self, v: u32) -> Self {
        self.params.put_u32_le(v);
        self
    }

    pub fn bytes(mut self, v: &[u8]) -> Self {
        self.params.put_slice(v);
        self
    }

    /// NUL-terminated Latin-1 string; characters outside Latin-1 become `?`
    pub fn cstr(mut self, s: &str) -> Self {
        for c in s.chars() {
            let b = u32::from(c);
            self.params.put_u8(if b <= 0xFF { b as u8 } else { b'?' });
        }
        self.params.put_u8(0);
        self
    }

    pub fn build(self) -> FramedMessage {
        FramedMessage::new(self.kind, self.item_id, self.params.freeze())
    }
}

/// Bounds-checked little-endian reader over message parameters
#[derive(Debug, Clone)]
pub struct ParamReader<'a> {
    buf: &'a [u8],
}

impl<'a> ParamReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn u8(&mut self) -> Option<u8> {
        (self.buf.remaining() >= 1).then(|| self.buf.get_u8())
    }

    pub fn i8(&mut self) -> Option<i8> {
        (self.buf.remaining() >= 1).then(|| self.buf.get_i8())
    }

    pub fn u16(&mut self) -> Option<u16> {
        (self.buf.remaining() >= 2).then(|| self.buf.get_u16_le())
    }

    pub fn i16(&mut self) -> Option<i16> {
        (self.buf.remaining() >= 2).then(|| self.buf.get_i16_le())
    }

    pub fn u32(&mut self) -> Option<u32> {
        (self.buf.remaining() >= 4).then(|| self.buf.get_u32_le())
    }

    /// 40-bit frequency: low 32 bits followed by the high byte
    pub fn u40(&mut self) -> Option<u64> {
        let low = self.u32()?;
        let high = self.u8()?;
        Some(u64::from(low) | (u64::from(high) << 32))
    }

    /// NUL-terminated string; the whole remainder if no terminator is present
    pub fn cstr(&mut self) -> String {
        let end = self.buf.iter().position(|&b| b == 0).unwrap_or(self.buf.len());
        let s: String = self.buf[..end].iter().map(|&b| char::from(b)).collect();
        let consumed = (end + 1).min(self.buf.len());
        self.buf.advance(consumed);
        s
    }

    pub fn rest(&mut self) -> &'a [u8] {
        let rest = self.buf;
        self.buf = &[];
        rest
    }
}
