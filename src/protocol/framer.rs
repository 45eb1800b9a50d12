//! Byte-stream reassembly into framed messages
//!
//! The framer is fed one byte at a time and only yields a message once the declared length has
//! been reached, so the way the transport chunks the stream never matters.

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::error::ProtocolError;
use crate::protocol::message::{parse_header, FramedMessage, MessageKind, HEADER_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
    AwaitHeader1,
    AwaitHeader2 { low: u8 },
    AwaitBody,
}

/// Incoming message assembler
pub struct MessageFramer {
    state: FramerState,
    kind: MessageKind,
    declared_len: usize,
    body: BytesMut,
    max_len: usize,
    messages_framed: u64,
}

impl MessageFramer {
    /// Create a framer that rejects declared lengths above `max_len`
    pub fn new(max_len: usize) -> Self {
        Self {
            state: FramerState::AwaitHeader1,
            kind: MessageKind::SetItem,
            declared_len: 0,
            body: BytesMut::with_capacity(max_len.saturating_sub(HEADER_LEN)),
            max_len,
            messages_framed: 0,
        }
    }

    /// Consume one byte. Returns a message when this byte completes one.
    ///
    /// A header announcing more than `max_len` bytes is rejected as soon as the header is
    /// complete; the framer is back in its initial state afterwards.
    pub fn feed(&mut self, byte: u8) -> Result<Option<FramedMessage>, ProtocolError> {
        match self.state {
            FramerState::AwaitHeader1 => {
                self.state = FramerState::AwaitHeader2 { low: byte };
                Ok(None)
            }
            FramerState::AwaitHeader2 { low } => {
                let (len, kind) = parse_header(u16::from_le_bytes([low, byte]));
                self.state = FramerState::AwaitHeader1;

                if len < HEADER_LEN {
                    return Err(ProtocolError::InvalidLength(len));
                }
                if len > self.max_len {
                    return Err(ProtocolError::MessageTooLong {
                        declared: len,
                        limit: self.max_len,
                    });
                }
                if len == HEADER_LEN {
                    return Ok(Some(self.emit(kind, Bytes::new())));
                }

                self.kind = kind;
                self.declared_len = len;
                self.body.clear();
                self.state = FramerState::AwaitBody;
                Ok(None)
            }
            FramerState::AwaitBody => {
                self.body.extend_from_slice(&[byte]);
                if self.body.len() + HEADER_LEN < self.declared_len {
                    return Ok(None);
                }
                self.state = FramerState::AwaitHeader1;
                let body = self.body.split().freeze();
                Ok(Some(self.emit(self.kind, body)))
            }
        }
    }

    /// Feed a whole chunk, collecting every completed message into `out`.
    ///
    /// Stops at the first framing error; messages completed before it are kept.
    pub fn feed_slice(
        &mut self,
        chunk: &[u8],
        out: &mut Vec<FramedMessage>,
    ) -> Result<(), ProtocolError> {
        for &byte in chunk {
            if let Some(msg) = self.feed(byte)? {
                out.push(msg);
            }
        }
        Ok(())
    }

    /// Drop any partially assembled message
    pub fn reset(&mut self) {
        self.state = FramerState::AwaitHeader1;
        self.declared_len = 0;
        self.body.clear();
    }

    /// True while a message is partially assembled
    pub fn in_message(&self) -> bool {
        self.state != FramerState::AwaitHeader1
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn messages_framed(&self) -> u64 {
        self.messages_framed
    }

    fn emit(&mut self, kind: MessageKind, body: Bytes) -> FramedMessage {
        self.messages_framed += 1;
        let msg = if kind.is_control() && body.len() >= 2 {
            let item = u16::from_le_bytes([body[0], body[1]]);
            FramedMessage::new(kind, Some(item), body.slice(2..))
        } else {
            FramedMessage::data(kind, body)
        };
        debug!(
            "Framed {:?} item={:?} payload={} bytes",
            msg.kind,
            msg.item_id,
            msg.payload.len()
        );
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::{MessageBuilder, MAX_FRAME_LEN};
    use proptest::prelude::*;

    fn sample_stream() -> (Vec<FramedMessage>, Vec<u8>) {
        let messages = vec![
            MessageBuilder::control(MessageKind::RESP_ITEM, 0x0018)
                .u8(0)
                .u8(2)
                .u8(0)
                .u8(0)
                .build(),
            FramedMessage::data(
                MessageKind::DataItem0,
                Bytes::from_static(&[0x10, 0xFF, 0x04, 1, 2, 3, 4, 5]),
            ),
            FramedMessage::data(MessageKind::Ack, Bytes::from_static(&[0x00])),
            FramedMessage::data(MessageKind::DataItem3, Bytes::from_static(&[0x00, b'K'])),
            MessageBuilder::control(MessageKind::ReqItem, 0x0005).build(),
        ];
        let mut wire = Vec::new();
        for msg in &messages {
            wire.extend_from_slice(&msg.encode().unwrap());
        }
        (messages, wire)
    }

    #[test]
    fn test_single_chunk() {
        let (expected, wire) = sample_stream();
        let mut framer = MessageFramer::new(3000);
        let mut out = Vec::new();
        framer.feed_slice(&wire, &mut out).unwrap();
        assert_eq!(out, expected);
        assert!(!framer.in_message());
        assert_eq!(framer.messages_framed(), expected.len() as u64);
    }

    #[test]
    fn test_byte_by_byte_matches_single_chunk() {
        let (_, wire) = sample_stream();

        let mut whole = Vec::new();
        MessageFramer::new(3000).feed_slice(&wire, &mut whole).unwrap();

        let mut framer = MessageFramer::new(3000);
        let mut split = Vec::new();
        for byte in &wire {
            framer.feed_slice(std::slice::from_ref(byte), &mut split).unwrap();
        }
        assert_eq!(whole, split);
    }

    #[test]
    fn test_header_only_message() {
        let mut framer = MessageFramer::new(3000);
        assert_eq!(framer.feed(0x02).unwrap(), None);
        let msg = framer.feed(0x60).unwrap().unwrap();
        assert_eq!(msg.kind, MessageKind::Ack);
        assert_eq!(msg.item_id, None);
        assert!(msg.payload.is_empty());
    }

    #[test]
    fn test_message_not_exposed_until_complete() {
        let msg = MessageBuilder::control(MessageKind::SetItem, 0x0048).u8(0).u8(50).build();
        let wire = msg.encode().unwrap();
        let mut framer = MessageFramer::new(3000);
        for &b in &wire[..wire.len() - 1] {
            assert_eq!(framer.feed(b).unwrap(), None);
        }
        assert!(framer.in_message());
        assert_eq!(framer.feed(wire[wire.len() - 1]).unwrap(), Some(msg));
    }

    #[test]
    fn test_data_item_keeps_full_body() {
        let mut framer = MessageFramer::new(3000);
        let mut out = Vec::new();
        // length 7, DataItem0: meter 0x0010, mode 4, two data bytes
        framer
            .feed_slice(&[0x07, 0x80, 0x10, 0x00, 0x04, 0xAB, 0xCD], &mut out)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, MessageKind::DataItem0);
        assert_eq!(out[0].item_id, None);
        assert_eq!(&out[0].payload[..], &[0x10, 0x00, 0x04, 0xAB, 0xCD]);
    }

    #[test]
    fn test_oversized_length_is_fatal() {
        let mut framer = MessageFramer::new(3000);
        // 3001 bytes, DataItem0
        let word: u16 = 3001 | (4 << 13);
        let [lo, hi] = word.to_le_bytes();
        framer.feed(lo).unwrap();
        assert_eq!(
            framer.feed(hi),
            Err(ProtocolError::MessageTooLong {
                declared: 3001,
                limit: 3000
            })
        );
        assert!(!framer.in_message());
    }

    #[test]
    fn test_zero_length_means_maximal_frame() {
        let mut framer = MessageFramer::new(3000);
        framer.feed(0x00).unwrap();
        assert_eq!(
            framer.feed(0x80),
            Err(ProtocolError::MessageTooLong {
                declared: MAX_FRAME_LEN,
                limit: 3000
            })
        );

        let mut bulk = MessageFramer::new(MAX_FRAME_LEN);
        let payload = Bytes::from(vec![0x5A; 8192]);
        let wire = FramedMessage::data(MessageKind::DataItem2, payload.clone())
            .encode()
            .unwrap();
        let mut out = Vec::new();
        bulk.feed_slice(&wire, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].payload, payload);
    }

    #[test]
    fn test_length_below_header_rejected() {
        let mut framer = MessageFramer::new(3000);
        framer.feed(0x01).unwrap();
        assert_eq!(framer.feed(0x00), Err(ProtocolError::InvalidLength(1)));
    }

    #[test]
    fn test_reset_discards_partial() {
        let mut framer = MessageFramer::new(3000);
        framer.feed_slice(&[0x08, 0x00, 0x18], &mut Vec::new()).unwrap();
        framer.reset();
        let mut out = Vec::new();
        framer.feed_slice(&[0x02, 0x00], &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, MessageKind::SetItem);
    }

    fn arb_message() -> impl Strategy<Value = FramedMessage> {
        prop_oneof![
            (0u8..3, any::<u16>(), proptest::collection::vec(any::<u8>(), 0..64)).prop_map(
                |(kind, item, params)| {
                    MessageBuilder::control(MessageKind::from_bits(kind), item)
                        .bytes(&params)
                        .build()
                }
            ),
            (3u8..8, proptest::collection::vec(any::<u8>(), 0..200)).prop_map(|(kind, body)| {
                FramedMessage::data(MessageKind::from_bits(kind), Bytes::from(body))
            }),
        ]
    }

    proptest! {
        #[test]
        fn prop_chunking_does_not_change_output(
            messages in proptest::collection::vec(arb_message(), 1..8),
            chunk in 1usize..17,
        ) {
            let mut wire = Vec::new();
            for msg in &messages {
                wire.extend_from_slice(&msg.encode().unwrap());
            }

            let mut framer = MessageFramer::new(3000);
            let mut out = Vec::new();
            for part in wire.chunks(chunk) {
                framer.feed_slice(part, &mut out).unwrap();
            }
            prop_assert_eq!(out, messages);
        }
    }
}
