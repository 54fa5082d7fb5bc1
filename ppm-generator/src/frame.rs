use embedded_hal::digital::PinState;

use crate::channels::ChannelBuffer;
use crate::timing::PpmTimings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameState {
    /// Not started. The next expiry opens a new frame.
    Idle,
    /// The next expiry starts a channel's marker pulse.
    Pulse,
    /// The next expiry ends the marker pulse and starts the channel's fill.
    Fill,
}

/// Progress through the frame currently being emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    /// Channel whose slot is being emitted.
    pub channel: usize,
    /// Microseconds of the frame programmed so far, including the phase just started.
    pub elapsed_us: u32,
    /// Level the output was last driven to.
    pub level: PinState,
}

impl FrameContext {
    const START: Self = Self {
        channel: 0,
        elapsed_us: 0,
        level: PinState::Low,
    };
}

/// A phase started by [`FrameGenerator::advance`]: drive the output to `level` for `duration_us`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub level: PinState,
    pub duration_us: u32,
    /// This phase is the last of its frame (the final fill and sync gap).
    pub ends_frame: bool,
}

/// The PPM frame state machine.
///
/// Each channel slot is a HIGH marker pulse followed by a LOW fill; the slot's total length is the
/// channel value. The last fill runs to the end of the frame, so it also carries the sync gap and the
/// frame is always exactly [`PpmTimings::frame_us`] long regardless of the channel values.
///
/// Channel values are latched when a frame's first pulse starts and the whole frame is emitted from
/// that copy, so an update landing mid-frame takes effect from the next frame.
///
/// Only the alarm expiry handler drives it.
pub struct FrameGenerator<const N: usize> {
    state: FrameState,
    context: FrameContext,
    timings: PpmTimings,
    latched: [u16; N],
}

impl<const N: usize> FrameGenerator<N> {
    pub const fn new(timings: PpmTimings) -> Self {
        Self {
            state: FrameState::Idle,
            context: FrameContext::START,
            timings,
            latched: [timings.pulse_us(); N],
        }
    }

    pub const fn state(&self) -> FrameState {
        self.state
    }

    pub const fn context(&self) -> FrameContext {
        self.context
    }

    pub const fn timings(&self) -> PpmTimings {
        self.timings
    }

    /// Channel values the current frame is emitted from.
    pub const fn latched(&self) -> [u16; N] {
        self.latched
    }

    /// Returns to [`FrameState::Idle`]; the next [`FrameGenerator::advance`] opens a fresh frame.
    pub fn reset(&mut self) {
        self.state = FrameState::Idle;
        self.context = FrameContext::START;
    }

    /// Moves to the next phase. `channels` is only read when a new frame starts.
    ///
    /// Never fails: values are validated when written to the buffer. Durations saturate at zero should a
    /// value slip through anyway.
    pub fn advance(&mut self, channels: &ChannelBuffer<N>) -> Phase {
        if self.state == FrameState::Idle {
            self.context = FrameContext::START;
            self.state = FrameState::Pulse;
        }

        let pulse_us = u32::from(self.timings.pulse_us());

        let phase = match self.state {
            FrameState::Fill => {
                let last = self.context.channel + 1 >= N;

                let duration_us = if last {
                    self.timings.frame_us().saturating_sub(self.context.elapsed_us)
                } else {
                    let value = self.latched.get(self.context.channel).copied().unwrap_or_default();
                    u32::from(value).saturating_sub(pulse_us)
                };

                if last {
                    self.context.channel = 0;
                    self.context.elapsed_us = 0;
                } else {
                    self.context.channel += 1;
                    self.context.elapsed_us += duration_us;
                }
                self.state = FrameState::Pulse;

                Phase {
                    level: PinState::Low,
                    duration_us,
                    ends_frame: last,
                }
            }
            _ => {
                if self.context.channel == 0 {
                    self.latched = channels.snapshot();
                }

                self.context.elapsed_us += pulse_us;
                self.state = FrameState::Fill;

                Phase {
                    level: PinState::High,
                    duration_us: pulse_us,
                    ends_frame: false,
                }
            }
        };

        self.context.level = phase.level;
        phase
    }
}
