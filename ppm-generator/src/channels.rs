use portable_atomic::{AtomicU16, Ordering};

use crate::timing::PpmTimings;

/// Channel pulse widths shared between the update path and the generator interrupt.
///
/// Every channel lives in its own atomic cell, so the generator never observes a half written value.
/// Writes are validated before they are stored: any snapshot the generator takes can be turned into a
/// frame with a non-negative sync gap.
///
/// The last channel's slot is never read back from its value, it is whatever the frame has left. So
/// the frame only constrains the leading `N - 1` channels: their sum plus one marker pulse must fit.
///
/// There must be a single writer (the update task); the generator only reads.
pub struct ChannelBuffer<const N: usize> {
    values: [AtomicU16; N],
    timings: PpmTimings,
}

impl<const N: usize> ChannelBuffer<N> {
    /// Creates a new buffer with every channel set to `default`.
    ///
    /// Returns [`crate::Error::InvalidTimings`] if the timings cannot hold `N` channels, or the validation
    /// error of `default` if a frame of `N` default values would not fit.
    pub fn new(timings: PpmTimings, default: u16) -> Result<Self, crate::Error> {
        if PpmTimings::new::<N>(timings.pulse_us(), timings.frame_us()).is_none() {
            return Err(crate::Error::InvalidTimings);
        }

        let buffer = Self {
            values: core::array::from_fn(|_| AtomicU16::new(timings.pulse_us())),
            timings,
        };
        buffer.set_all(&[default; N])?;

        Ok(buffer)
    }

    pub const fn timings(&self) -> PpmTimings {
        self.timings
    }

    /// Returns the last value written to channel `index`.
    ///
    /// Returns [`None`] if the index is out of range.
    pub fn get(&self, index: usize) -> Option<u16> {
        self.values.get(index).map(|value| value.load(Ordering::Acquire))
    }

    /// Returns a copy of every channel value.
    pub fn snapshot(&self) -> [u16; N] {
        core::array::from_fn(|index| self.values[index].load(Ordering::Acquire))
    }

    /// Writes a single channel value.
    ///
    /// Returns [`crate::Error::ChannelIndexOutOfRange`], [`crate::Error::ChannelValueOutOfRange`] or
    /// [`crate::Error::FrameOverrun`] without touching the buffer if the write would be invalid.
    pub fn set(&self, index: usize, value: u16) -> Result<(), crate::Error> {
        if index >= N {
            return Err(crate::Error::ChannelIndexOutOfRange { index });
        }

        let mut values = self.snapshot();
        values[index] = value;
        self.validate(&values)?;

        self.values[index].store(value, Ordering::Release);
        Ok(())
    }

    /// Writes the leading channels from `values`, leaving channels past `values.len()` unchanged.
    ///
    /// The update is validated as a whole before any channel is stored, so order within the update
    /// does not matter.
    pub fn set_all(&self, values: &[u16]) -> Result<(), crate::Error> {
        if values.len() > N {
            return Err(crate::Error::ChannelIndexOutOfRange { index: values.len() - 1 });
        }

        let mut merged = self.snapshot();
        merged[..values.len()].copy_from_slice(values);
        self.validate(&merged)?;

        self.store_all(&merged);
        Ok(())
    }

    /// Stores `values` without validation. Callers guarantee they fit the frame.
    pub(crate) fn store_all(&self, values: &[u16; N]) {
        debug_assert!(self.validate(values).is_ok());

        // A snapshot taken by the generator interrupt sees all of the update or none of it.
        critical_section::with(|_| {
            for (cell, value) in self.values.iter().zip(values) {
                cell.store(*value, Ordering::Release);
            }
        });
    }

    fn validate(&self, values: &[u16; N]) -> Result<(), crate::Error> {
        let (min, max) = self.timings.channel_range::<N>();

        if let Some(&value) = values.iter().find(|value| !(min..=max).contains(*value)) {
            return Err(crate::Error::ChannelValueOutOfRange { value, min, max });
        }

        let total_us = leading_slots_us(&self.timings, values);
        let frame_us = self.timings.frame_us();
        if total_us > frame_us {
            return Err(crate::Error::FrameOverrun { total_us, frame_us });
        }

        Ok(())
    }
}

/// Time the leading `N - 1` slots plus the last channel's marker pulse take out of a frame.
///
/// The sync gap is what is left of the frame after this.
pub(crate) fn leading_slots_us<const N: usize>(timings: &PpmTimings, values: &[u16; N]) -> u32 {
    let leading: u32 = values
        .iter()
        .take(N.saturating_sub(1))
        .map(|value| u32::from(*value))
        .sum();

    leading + u32::from(timings.pulse_us())
}
