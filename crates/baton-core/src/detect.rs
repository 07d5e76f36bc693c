//! Pilot-signal presence detection
//!
//! Each source computer plays a constant tone on its pilot channel. A dead
//! or unplugged computer delivers digital zero there, so "is this pilot
//! silent" reduces to scanning a handful of raw sample bytes at the head of
//! every block. The rule is pluggable behind [`SignalPresence`] so rigs with
//! noisier converters can swap in something stricter.

/// Bytes inspected at the head of each pilot block.
///
/// 64 bytes is 16 float frames (or ~21 packed 24-bit frames): far shorter
/// than any real block, long enough that a live tone always lands a
/// non-zero byte in it.
pub const PILOT_WINDOW: usize = 64;

/// Decides whether one pilot-channel block carries signal.
///
/// Called on the audio thread once per pilot per block. Implementations
/// must not allocate, block, or perform I/O. `&mut self` is there for
/// implementations that keep per-channel history; the engine holds one
/// instance per pilot so histories never mix.
pub trait SignalPresence: Send {
    fn is_silent(&mut self, block: &[u8]) -> bool;
}

/// Default rule: the leading window contains only zero bytes.
///
/// Counting bytes rather than decoding samples keeps the check width
/// agnostic; all-zero bytes decode to digital silence in every PCM width.
#[derive(Debug, Clone, Copy, Default)]
pub struct PilotWindow;

impl SignalPresence for PilotWindow {
    fn is_silent(&mut self, block: &[u8]) -> bool {
        let window = &block[..block.len().min(PILOT_WINDOW)];
        window.iter().all(|&byte| byte == 0)
    }
}

/// Wraps another rule and only reports silence after `threshold`
/// consecutive silent blocks. One non-silent block resets the streak.
#[derive(Debug, Clone)]
pub struct Debounce<D> {
    inner: D,
    threshold: u32,
    streak: u32,
}

impl<D: SignalPresence> Debounce<D> {
    pub fn new(inner: D, threshold: u32) -> Self {
        Self {
            inner,
            threshold: threshold.max(1),
            streak: 0,
        }
    }
}

impl<D: SignalPresence> SignalPresence for Debounce<D> {
    fn is_silent(&mut self, block: &[u8]) -> bool {
        if self.inner.is_silent(block) {
            self.streak = self.streak.saturating_add(1);
        } else {
            self.streak = 0;
        }
        self.streak >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_zero_window_is_silent() {
        let block = vec![0u8; 512];
        assert!(PilotWindow.is_silent(&block));
    }

    #[test]
    fn test_any_nonzero_byte_in_window_is_signal() {
        let mut block = vec![0u8; 512];
        block[PILOT_WINDOW - 1] = 1;
        assert!(!PilotWindow.is_silent(&block));
    }

    #[test]
    fn test_signal_outside_window_is_not_seen() {
        let mut block = vec![0u8; 512];
        block[PILOT_WINDOW] = 0xFF;
        assert!(PilotWindow.is_silent(&block));
    }

    #[test]
    fn test_short_block_shrinks_window() {
        let mut block = vec![0u8; 16];
        assert!(PilotWindow.is_silent(&block));
        block[15] = 3;
        assert!(!PilotWindow.is_silent(&block));
    }

    #[test]
    fn test_debounce_needs_consecutive_silence() {
        let mut rule = Debounce::new(PilotWindow, 3);
        let silent = vec![0u8; 128];
        let live = vec![1u8; 128];

        assert!(!rule.is_silent(&silent));
        assert!(!rule.is_silent(&silent));
        assert!(rule.is_silent(&silent));

        // One live block resets the streak.
        assert!(!rule.is_silent(&live));
        assert!(!rule.is_silent(&silent));
    }

    #[test]
    fn test_debounce_threshold_zero_behaves_like_one() {
        let mut rule = Debounce::new(PilotWindow, 0);
        assert!(rule.is_silent(&[0u8; 64]));
        assert!(!rule.is_silent(&[7u8; 64]));
    }
}
