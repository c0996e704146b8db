//! Archival pipeline
//!
//! Streams are persisted as rotated WAV files: one file per stream per
//! rotation window, finalized on close/rotation/disconnect and then
//! compressed in the background by an external encoder.

pub mod compress;
pub mod rotation;
pub mod sink;
pub mod wav;

pub use compress::{spawn_worker, CompressQueue, EncoderConfig};
pub use rotation::spawn_rotation_task;
pub use sink::{SampleSink, ARCHIVE_EXT};
