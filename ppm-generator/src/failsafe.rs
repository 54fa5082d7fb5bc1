use crate::channels::{ChannelBuffer, leading_slots_us};
use crate::packet::ChannelPacket;
use crate::timing::PpmTimings;

/// Channel values forced into the buffer once the link goes quiet.
///
/// Channels without an override keep whatever value they last received, shortened if needed so the
/// forced values always fit the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FailsafePolicy<const N: usize> {
    overrides: [Option<u16>; N],
}

impl<const N: usize> Default for FailsafePolicy<N> {
    fn default() -> Self {
        Self::hold()
    }
}

impl<const N: usize> FailsafePolicy<N> {
    /// A policy that holds every channel at its last received value.
    pub const fn hold() -> Self {
        Self { overrides: [None; N] }
    }

    /// Forces channel `index` to `value` when the failsafe engages.
    ///
    /// Indices past the channel count are ignored.
    pub const fn with(mut self, index: usize, value: u16) -> Self {
        if index < N {
            self.overrides[index] = Some(value);
        }
        self
    }

    pub const fn value(&self, index: usize) -> Option<u16> {
        if index < N { self.overrides[index] } else { None }
    }

    /// Checks that the overrides fit a frame of `timings` even with every held channel at its shortest.
    ///
    /// Returns [`crate::Error::ChannelValueOutOfRange`] or [`crate::Error::FrameOverrun`] otherwise.
    pub fn validate(&self, timings: &PpmTimings) -> Result<(), crate::Error> {
        let (min, max) = timings.channel_range::<N>();

        let mut shortest = [min; N];
        for (slot, forced) in shortest.iter_mut().zip(self.overrides) {
            if let Some(value) = forced {
                if !(min..=max).contains(&value) {
                    return Err(crate::Error::ChannelValueOutOfRange { value, min, max });
                }
                *slot = value;
            }
        }

        let total_us = leading_slots_us(timings, &shortest);
        let frame_us = timings.frame_us();
        if total_us > frame_us {
            return Err(crate::Error::FrameOverrun { total_us, frame_us });
        }

        Ok(())
    }

    /// Returns `current` with the overrides applied, fitted to a frame of `timings`.
    ///
    /// Every value is clamped to the channel range. If the leading slots would still overrun the frame,
    /// overridden channels keep their length first and held channels are shortened, latest channel first.
    pub fn resolve(&self, current: [u16; N], timings: &PpmTimings) -> [u16; N] {
        let (min, max) = timings.channel_range::<N>();
        let pulse_us = u32::from(timings.pulse_us());

        let mut values = current;
        for (value, forced) in values.iter_mut().zip(self.overrides) {
            *value = forced.unwrap_or(*value).clamp(min, max);
        }

        // Time the leading slots may spend beyond their marker pulses.
        let leading = N.saturating_sub(1);
        let mut spare_us = timings
            .frame_us()
            .saturating_sub(pulse_us * (leading as u32 + 1));

        let mut fit = |value: &mut u16| {
            let extra_us = u32::from(*value) - pulse_us;
            let kept_us = extra_us.min(spare_us);
            spare_us -= kept_us;
            // kept_us <= extra_us, so this fits back into a u16.
            *value = (pulse_us + kept_us) as u16;
        };

        for (value, forced) in values[..leading].iter_mut().zip(self.overrides) {
            if forced.is_some() {
                fit(value);
            }
        }
        for (value, forced) in values[..leading].iter_mut().zip(self.overrides) {
            if forced.is_none() {
                fit(value);
            }
        }

        values
    }

    /// Forces the policy into `channels`.
    pub fn apply(&self, channels: &ChannelBuffer<N>) {
        let values = self.resolve(channels.snapshot(), &channels.timings());
        channels.store_all(&values);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WatchdogStatus {
    /// Updates are arriving.
    Fresh,
    /// No valid update for `cycles` consecutive receive cycles.
    Stale { cycles: u16 },
    /// The failsafe policy is applied and held.
    Failsafe,
}

/// Counts receive cycles without a valid channel update and engages the failsafe policy after
/// `threshold` of them.
pub struct FailsafeWatchdog<const N: usize> {
    stale_cycles: u16,
    threshold: u16,
    policy: FailsafePolicy<N>,
}

impl<const N: usize> FailsafeWatchdog<N> {
    /// Creates a new watchdog for a buffer with `timings`. A `threshold` of zero is treated as one.
    ///
    /// Returns the policy's validation error if its overrides cannot fit a frame.
    pub fn new(
        threshold: u16,
        policy: FailsafePolicy<N>,
        timings: &PpmTimings,
    ) -> Result<Self, crate::Error> {
        policy.validate(timings)?;

        Ok(Self {
            stale_cycles: 0,
            threshold: threshold.max(1),
            policy,
        })
    }

    pub const fn stale_cycles(&self) -> u16 {
        self.stale_cycles
    }

    pub const fn threshold(&self) -> u16 {
        self.threshold
    }

    pub const fn policy(&self) -> &FailsafePolicy<N> {
        &self.policy
    }

    pub const fn is_engaged(&self) -> bool {
        self.stale_cycles >= self.threshold
    }

    pub const fn status(&self) -> WatchdogStatus {
        match self.stale_cycles {
            0 => WatchdogStatus::Fresh,
            cycles if cycles >= self.threshold => WatchdogStatus::Failsafe,
            cycles => WatchdogStatus::Stale { cycles },
        }
    }

    /// Records a valid channel update.
    ///
    /// Returns `true` if this update ends an engaged failsafe. The failsafe values stay in the buffer
    /// until the update path writes new ones.
    pub fn notify_received(&mut self) -> bool {
        let recovered = self.is_engaged();
        self.stale_cycles = 0;
        recovered
    }

    /// Records a receive cycle that produced no valid channel update.
    ///
    /// Once the threshold is reached the policy is forced into `channels` on every further cycle, so a
    /// stray write cannot undo it while the link stays quiet.
    pub fn notify_timeout_cycle(&mut self, channels: &ChannelBuffer<N>) -> WatchdogStatus {
        self.stale_cycles = self.stale_cycles.saturating_add(1).min(self.threshold);

        if self.is_engaged() {
            self.policy.apply(channels);
        }

        self.status()
    }

    /// Decodes a received packet line and applies it to `channels`.
    ///
    /// A packet that is applied counts as a valid update. One that fails to decode or is rejected by the
    /// buffer counts like a receive cycle without an update, so a link carrying only garbage still
    /// engages the failsafe. Returns the number of channels written, or why the packet was rejected.
    pub fn receive_packet(
        &mut self,
        packet: &[u8],
        channels: &ChannelBuffer<N>,
    ) -> Result<usize, crate::Error> {
        let update = ChannelPacket::<N>::parse(packet).and_then(|packet| packet.apply(channels));

        match update {
            Ok(_) => {
                self.notify_received();
            }
            Err(_) => {
                self.notify_timeout_cycle(channels);
            }
        }

        update
    }
}
