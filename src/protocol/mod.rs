//! Wire protocol: envelope types, binary codec, and message framing

pub mod envelope;
pub mod framing;

pub use envelope::{Envelope, MessageType, SensorKind, StreamInfo, Unit};
pub use framing::{FrameReader, FrameWriter, MAX_FRAME_LEN};
