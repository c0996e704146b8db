//! WAV (RIFF) container writing
//!
//! Archived streams are standard PCM WAV files so any audio tool can open
//! them: little-endian interleaved samples, bits-per-sample rounded up to
//! the stream's byte depth.
//!
//! ```text
//! +======+========+======+===================+======+========+----------+
//! | RIFF | Size(4)| WAVE | fmt  chunk (24 B) | data | Size(4)| samples  |
//! +======+========+======+===================+======+========+----------+
//! ```
//!
//! The two size fields are unknown while a sink is live; they are written
//! as zero at creation and patched on finalize.

use bytes::{BufMut, Bytes, BytesMut};

/// Total header length up to the start of sample data
pub const HEADER_LEN: usize = 44;

/// Byte offset of the RIFF chunk size field
pub const RIFF_SIZE_OFFSET: u64 = 4;

/// Byte offset of the data chunk size field
pub const DATA_SIZE_OFFSET: u64 = 40;

/// PCM format code in the fmt chunk
const FORMAT_PCM: u16 = 1;

/// Build a 44-byte PCM WAV header
///
/// `data_len` is the sample payload length in bytes; pass 0 for a live
/// sink and patch the size fields on finalize.
pub fn header(channels: u16, sample_rate: u32, byte_depth: usize, data_len: u32) -> [u8; HEADER_LEN] {
    let block_align = channels as u32 * byte_depth as u32;
    let byte_rate = sample_rate * block_align;

    let mut out = [0u8; HEADER_LEN];
    out[0..4].copy_from_slice(b"RIFF");
    out[4..8].copy_from_slice(&riff_size(data_len).to_le_bytes());
    out[8..12].copy_from_slice(b"WAVE");

    out[12..16].copy_from_slice(b"fmt ");
    out[16..20].copy_from_slice(&16u32.to_le_bytes()); // fmt chunk length
    out[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
    out[22..24].copy_from_slice(&channels.to_le_bytes());
    out[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    out[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    out[32..34].copy_from_slice(&(block_align as u16).to_le_bytes());
    out[34..36].copy_from_slice(&(byte_depth as u16 * 8).to_le_bytes());

    out[36..40].copy_from_slice(b"data");
    out[40..44].copy_from_slice(&data_len.to_le_bytes());
    out
}

/// RIFF chunk size for a given data payload length
pub fn riff_size(data_len: u32) -> u32 {
    data_len + (HEADER_LEN as u32 - 8)
}

/// Interleave per-channel sample batches channel-major -> sample-major
///
/// Each sample is written as its low `byte_depth` bytes, little-endian.
/// All channels must carry the same sample count (validated upstream);
/// output length is `samples * channels * byte_depth`.
pub fn interleave(channels: &[Vec<i32>], byte_depth: usize) -> Bytes {
    let samples = channels.first().map(|c| c.len()).unwrap_or(0);
    let mut out = BytesMut::with_capacity(samples * channels.len() * byte_depth);
    for i in 0..samples {
        for channel in channels {
            let raw = channel[i].to_le_bytes();
            out.put_slice(&raw[..byte_depth]);
        }
    }
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let h = header(2, 1000, 2, 8000);

        assert_eq!(&h[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(h[4..8].try_into().unwrap()), 8036);
        assert_eq!(&h[8..12], b"WAVE");
        assert_eq!(&h[12..16], b"fmt ");
        assert_eq!(u32::from_le_bytes(h[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes(h[20..22].try_into().unwrap()), 1); // PCM
        assert_eq!(u16::from_le_bytes(h[22..24].try_into().unwrap()), 2); // channels
        assert_eq!(u32::from_le_bytes(h[24..28].try_into().unwrap()), 1000); // rate
        assert_eq!(u32::from_le_bytes(h[28..32].try_into().unwrap()), 4000); // byte rate
        assert_eq!(u16::from_le_bytes(h[32..34].try_into().unwrap()), 4); // block align
        assert_eq!(u16::from_le_bytes(h[34..36].try_into().unwrap()), 16); // bits
        assert_eq!(&h[36..40], b"data");
        assert_eq!(u32::from_le_bytes(h[40..44].try_into().unwrap()), 8000);
    }

    #[test]
    fn test_interleave_16bit() {
        let data = interleave(&[vec![0x0102, 0x0304], vec![0x0506, 0x0708]], 2);
        // sample 0: ch0 then ch1, little-endian
        assert_eq!(&data[..], &[0x02, 0x01, 0x06, 0x05, 0x04, 0x03, 0x08, 0x07]);
    }

    #[test]
    fn test_interleave_8bit_truncates() {
        let data = interleave(&[vec![0x1FF, -1]], 1);
        assert_eq!(&data[..], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_interleave_32bit() {
        let data = interleave(&[vec![-2]], 4);
        assert_eq!(&data[..], &(-2i32).to_le_bytes());
    }

    #[test]
    fn test_interleave_empty() {
        assert!(interleave(&[], 2).is_empty());
        assert!(interleave(&[vec![]], 2).is_empty());
    }

    #[test]
    fn test_interleaved_width() {
        let data = interleave(&[vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9]], 2);
        assert_eq!(data.len(), 3 * 3 * 2);
    }
}
