//! Wire protocol: message framing, the outgoing builder and control item definitions

pub mod framer;
pub mod items;
pub mod message;

pub use framer::MessageFramer;
pub use items::{CompressionMode, LinkStatus, TxState, VideoCompression};
pub use message::{FramedMessage, MessageBuilder, MessageKind, ParamReader};
