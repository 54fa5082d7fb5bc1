use embedded_hal::digital::OutputPin;

use crate::alarm::HardwareAlarm;
use crate::channels::ChannelBuffer;
use crate::clock::{ClockChangeCallback, ClockChangeEvent, ClockChangeNotifier, ClockRescaler};
use crate::frame::{FrameGenerator, Phase};

/// A PPM output: the frame state machine together with the alarm that times it and the pin it drives.
///
/// The platform calls [`PpmGenerator::on_alarm`] from the alarm interrupt and
/// [`PpmGenerator::on_clock_change`] from its clock change subscription. Both must run with the
/// generator's interrupt masked relative to each other, which holds when the generator is kept in a
/// critical section mutex.
pub struct PpmGenerator<'a, A: HardwareAlarm, P: OutputPin, const N: usize> {
    alarm: A,
    pin: P,
    frame: FrameGenerator<N>,
    channels: &'a ChannelBuffer<N>,
    subscription: Option<(usize, ClockChangeCallback)>,
}

impl<'a, A: HardwareAlarm, P: OutputPin, const N: usize> PpmGenerator<'a, A, P, N> {
    pub fn new(alarm: A, pin: P, channels: &'a ChannelBuffer<N>) -> Self {
        Self {
            alarm,
            pin,
            frame: FrameGenerator::new(channels.timings()),
            channels,
            subscription: None,
        }
    }

    pub fn alarm(&self) -> &A {
        &self.alarm
    }

    /// Mutable access to the alarm, for backends that must acknowledge an expiry before
    /// [`PpmGenerator::on_alarm`] runs.
    pub fn alarm_mut(&mut self) -> &mut A {
        &mut self.alarm
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }

    pub fn frame(&self) -> &FrameGenerator<N> {
        &self.frame
    }

    /// Drives the output low and arms the alarm; the first frame begins `start_delay_us` later.
    pub fn start(&mut self, start_delay_us: u32) {
        let _ = self.pin.set_low();
        self.frame.reset();
        self.alarm.program(start_delay_us, true);
        self.alarm.enable();

        #[cfg(feature = "defmt-logging")]
        defmt::info!("PPM generator started, first frame in {}us", start_delay_us);
    }

    /// Alarm expiry handler: sets the output for the next phase and programs its duration.
    pub fn on_alarm(&mut self) -> Phase {
        let phase = self.frame.advance(self.channels);

        let _ = self.pin.set_state(phase.level);
        self.alarm.program(phase.duration_us, true);

        phase
    }

    /// Clock change handler: pauses the alarm before the change and rescales its divider after it.
    pub fn on_clock_change(&mut self, event: &ClockChangeEvent) {
        ClockRescaler::on_clock_change(&mut self.alarm, event);
    }

    /// Subscribes `callback` to `notifier` and remembers the subscription for [`PpmGenerator::stop`].
    ///
    /// `callback` is expected to forward events to [`PpmGenerator::on_clock_change`].
    pub fn subscribe_clock_changes<const CAP: usize>(
        &mut self,
        notifier: &ClockChangeNotifier<CAP>,
        context: usize,
        callback: ClockChangeCallback,
    ) -> Result<(), crate::Error> {
        notifier.subscribe(context, callback)?;
        self.subscription = Some((context, callback));
        Ok(())
    }

    /// Stops the output: disables the alarm and drops the clock change subscription in one critical
    /// section, so a late clock change cannot restart the alarm. The output is left low.
    pub fn stop<const CAP: usize>(&mut self, notifier: &ClockChangeNotifier<CAP>) {
        critical_section::with(|_| {
            self.alarm.disable();
            if let Some((context, callback)) = self.subscription.take() {
                notifier.unsubscribe(context, callback);
            }
        });

        let _ = self.pin.set_low();
        self.frame.reset();

        #[cfg(feature = "defmt-logging")]
        defmt::info!("PPM generator stopped");
    }
}
