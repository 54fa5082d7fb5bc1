/// Length of the HIGH marker pulse that opens every channel slot, in microseconds.
pub const PULSE_LENGTH_US: u16 = 300;
/// Total length of one PPM frame, in microseconds.
pub const FRAME_LENGTH_US: u32 = 22_500;
/// Number of channels carried per frame.
pub const CHANNEL_COUNT: usize = 8;
/// Channel value used until the first update arrives (stick centered).
pub const DEFAULT_CHANNEL_VALUE: u16 = 1_500;
/// Consecutive stale receive cycles before the failsafe is forced.
pub const FAILSAFE_THRESHOLD: u16 = 50;
/// Delay between arming the generator and the first frame, in microseconds.
pub const START_DELAY_US: u32 = 12_000;

/// Pulse and frame lengths of a PPM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PpmTimings {
    pulse_us: u16,
    frame_us: u32,
}

impl Default for PpmTimings {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl PpmTimings {
    /// 300us pulses in a 22.5ms frame.
    pub const STANDARD: Self = Self {
        pulse_us: PULSE_LENGTH_US,
        frame_us: FRAME_LENGTH_US,
    };

    /// Creates new timings given a pulse length and a frame length in microseconds.
    ///
    /// Returns [`None`] if the pulse length is zero or the frame cannot fit one pulse per channel.
    pub const fn new<const N: usize>(pulse_us: u16, frame_us: u32) -> Option<Self> {
        if pulse_us == 0 || N == 0 {
            return None;
        }

        if (pulse_us as u32) * (N as u32) > frame_us {
            return None;
        }

        Some(Self { pulse_us, frame_us })
    }

    pub const fn pulse_us(&self) -> u16 {
        self.pulse_us
    }

    pub const fn frame_us(&self) -> u32 {
        self.frame_us
    }

    /// Returns the inclusive `(min, max)` range of a single channel value for an `N` channel frame.
    ///
    /// The longest slot is what is left of the frame once every other channel is at its shortest.
    pub const fn channel_range<const N: usize>(&self) -> (u16, u16) {
        let others = (N as u32).saturating_sub(1) * self.pulse_us as u32;
        let max = self.frame_us.saturating_sub(others);
        let max = if max > u16::MAX as u32 { u16::MAX } else { max as u16 };

        (self.pulse_us, max)
    }
}
