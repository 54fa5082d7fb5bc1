#![allow(dead_code)]

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin, PinState};
use ppm_generator::alarm::{AlarmConfig, CountDirection, HardwareAlarm};
use ppm_generator::channels::ChannelBuffer;
use ppm_generator::timing::{CHANNEL_COUNT, DEFAULT_CHANNEL_VALUE};
use ppm_generator::PpmTimings;

/// Alarm whose passage of time is driven by the test.
#[derive(Debug, Default)]
pub struct SimAlarm {
    pub period: u32,
    pub autoreload: bool,
    pub enabled: bool,
    pub divider: u16,
    pub remaining: Option<u32>,
    pub programmed: Vec<u32>,
    pub enables: usize,
    pub disables: usize,
}

impl SimAlarm {
    pub fn with_divider(divider: u16) -> Self {
        Self {
            divider,
            ..Self::default()
        }
    }

    /// Counts `ticks` if enabled. Returns `true` if the interval expired.
    pub fn tick(&mut self, ticks: u32) -> bool {
        if !self.enabled {
            return false;
        }

        let left = self.remaining.unwrap_or(self.period);
        if ticks >= left {
            self.remaining = None;
            true
        } else {
            self.remaining = Some(left - ticks);
            false
        }
    }
}

impl HardwareAlarm for SimAlarm {
    fn program(&mut self, duration_ticks: u32, autoreload: bool) {
        self.period = duration_ticks;
        self.autoreload = autoreload;
        self.remaining = None;
        self.programmed.push(duration_ticks);
    }

    fn enable(&mut self) {
        self.enabled = true;
        self.enables += 1;
    }

    fn disable(&mut self) {
        if self.enabled && self.remaining.is_none() {
            self.remaining = Some(self.period);
        }
        self.enabled = false;
        self.disables += 1;
    }

    fn set_divider(&mut self, divider: u16) {
        self.divider = divider;
    }

    fn divider(&self) -> u16 {
        self.divider
    }

    fn config(&self) -> AlarmConfig {
        AlarmConfig {
            divider: self.divider,
            autoreload: self.autoreload,
            enabled: self.enabled,
            direction: CountDirection::Up,
        }
    }
}

/// Output pin that records every level it is driven to.
#[derive(Debug, Default)]
pub struct RecordingPin {
    pub history: Vec<PinState>,
}

impl RecordingPin {
    pub fn level(&self) -> Option<PinState> {
        self.history.last().copied()
    }
}

impl ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.history.push(PinState::Low);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.history.push(PinState::High);
        Ok(())
    }
}

pub fn standard_buffer() -> ChannelBuffer<CHANNEL_COUNT> {
    ChannelBuffer::new(PpmTimings::STANDARD, DEFAULT_CHANNEL_VALUE).unwrap()
}
