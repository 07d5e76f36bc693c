//! Channel geometry for the redundant playback frame
//!
//! Both source computers feed the same multichannel transport, so every
//! channel lives in one unified index space that is fixed for the life of
//! the process:
//!
//! ```text
//! 0..=30   primary program channels
//! 31       primary pilot
//! 32..=62  secondary program channels
//! 63       secondary pilot
//! 64..=94  outputs (output k carries program channel k)
//! ```

use thiserror::Error;

/// Program channels per source bank.
pub const BANK_CHANNELS: usize = 31;

/// Input channels: two program banks plus one pilot each.
pub const INPUT_CHANNELS: usize = 2 * (BANK_CHANNELS + 1);

/// Output channels: one program bank.
pub const OUTPUT_CHANNELS: usize = BANK_CHANNELS;

/// Unified indices of the fixed channels.
pub const PRIMARY_PILOT: usize = 31;
pub const SECONDARY_FIRST: usize = 32;
pub const SECONDARY_PILOT: usize = 63;
pub const OUTPUT_FIRST: usize = 64;

/// Bytes per sample on the packed 24-bit transport this system was built
/// around. The engine itself is width-agnostic; JACK hands us 4-byte floats.
pub const SAMPLE_WIDTH_24BIT: usize = 3;

/// Geometry problems caught at setup. Never raised per block.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GeometryError {
    #[error("audio subsystem negotiated a degenerate block ({block_len} frames x {sample_width} bytes)")]
    DegenerateBlock { block_len: usize, sample_width: usize },

    #[error("expected {expected} input channels, audio subsystem offers {actual}")]
    InputCount { expected: usize, actual: usize },

    #[error("expected {expected} output channels, audio subsystem offers {actual}")]
    OutputCount { expected: usize, actual: usize },
}

/// Block geometry negotiated with the audio subsystem at setup.
///
/// `block_len` is frames per block, `sample_width` bytes per sample. Both
/// are uniform across all channels and fixed once the callback is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelLayout {
    pub block_len: usize,
    pub sample_width: usize,
}

impl ChannelLayout {
    pub fn new(block_len: usize, sample_width: usize) -> Result<Self, GeometryError> {
        if block_len == 0 || sample_width == 0 {
            return Err(GeometryError::DegenerateBlock {
                block_len,
                sample_width,
            });
        }
        Ok(Self {
            block_len,
            sample_width,
        })
    }

    /// Bytes per channel per block.
    pub fn block_bytes(&self) -> usize {
        self.block_len * self.sample_width
    }

    /// Check the channel counts the audio subsystem actually gave us
    /// against the fixed bank layout.
    pub fn validate_channel_counts(inputs: usize, outputs: usize) -> Result<(), GeometryError> {
        if inputs != INPUT_CHANNELS {
            return Err(GeometryError::InputCount {
                expected: INPUT_CHANNELS,
                actual: inputs,
            });
        }
        if outputs != OUTPUT_CHANNELS {
            return Err(GeometryError::OutputCount {
                expected: OUTPUT_CHANNELS,
                actual: outputs,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_space_is_contiguous() {
        assert_eq!(PRIMARY_PILOT, BANK_CHANNELS);
        assert_eq!(SECONDARY_FIRST, BANK_CHANNELS + 1);
        assert_eq!(SECONDARY_PILOT, 2 * BANK_CHANNELS + 1);
        assert_eq!(OUTPUT_FIRST, INPUT_CHANNELS);
        assert_eq!(OUTPUT_FIRST + OUTPUT_CHANNELS, 95);
    }

    #[test]
    fn test_block_bytes() {
        let layout = ChannelLayout::new(512, SAMPLE_WIDTH_24BIT).unwrap();
        assert_eq!(layout.block_bytes(), 1536);
    }

    #[test]
    fn test_degenerate_block_rejected() {
        assert!(matches!(
            ChannelLayout::new(0, 3),
            Err(GeometryError::DegenerateBlock { .. })
        ));
        assert!(matches!(
            ChannelLayout::new(512, 0),
            Err(GeometryError::DegenerateBlock { .. })
        ));
    }

    #[test]
    fn test_channel_count_validation() {
        assert!(ChannelLayout::validate_channel_counts(64, 31).is_ok());
        assert_eq!(
            ChannelLayout::validate_channel_counts(62, 31),
            Err(GeometryError::InputCount {
                expected: 64,
                actual: 62
            })
        );
        assert_eq!(
            ChannelLayout::validate_channel_counts(64, 32),
            Err(GeometryError::OutputCount {
                expected: 31,
                actual: 32
            })
        );
    }
}
