//! RP2040 alarm backend.
//!
//! The RP2040 `TIMER` counts microsecond ticks produced by the watchdog tick generator, which divides
//! `clk_ref` by a cycle count. That cycle count is the alarm's divider. Alarms compare against the low
//! 32 bits of the counter, so deadlines are absolute and each phase is scheduled from the previous
//! expiry rather than from the (late) moment the interrupt handler runs.
//!
//! Alarm 0 belongs to the `embassy-time` driver. Note that the tick generator is shared with it: a
//! rescaled divider keeps `embassy-time` correct too.

use embassy_rp::pac;

use crate::alarm::{
    AlarmConfig, CompareAction, CountDirection, DeadlineSchedule, HardwareAlarm, deadline_passed,
};

/// The tick generator's cycle count field is 9 bits wide.
const MAX_TICK_CYCLES: u16 = 0x1FF;

/// One of the RP2040 timer alarms 1-3.
pub struct TimerAlarm<const ALARM: usize> {
    schedule: DeadlineSchedule,
}

impl<const ALARM: usize> TimerAlarm<ALARM> {
    /// Takes alarm `ALARM` and enables its interrupt in the timer block.
    ///
    /// The matching `TIMER_IRQ_n` must be bound and unmasked by the caller, and its handler must call
    /// [`TimerAlarm::acknowledge`] before handing the expiry to the generator.
    pub fn new() -> Self {
        const { assert!(ALARM >= 1 && ALARM <= 3, "Alarm 0 is used by embassy-time, use 1-3") };

        apply::<ALARM>(CompareAction::Disarm);
        pac::TIMER.intr().write(|w| w.set_alarm(ALARM, true));
        pac::TIMER.inte().modify(|w| w.set_alarm(ALARM, true));

        Self {
            schedule: DeadlineSchedule::new(now()),
        }
    }

    /// Clears the expiry interrupt and, with autoreload, re-arms for another interval of the same length.
    ///
    /// Returns `false` for an interrupt that should be ignored: the alarm is disabled, or its deadline
    /// has not been reached (an expiry forced for a past deadline that was re-targeted before the
    /// handler returned).
    pub fn acknowledge(&mut self) -> bool {
        pac::TIMER.intr().write(|w| w.set_alarm(ALARM, true));

        match self.schedule.expire(now()) {
            Some(action) => {
                apply::<ALARM>(action);
                true
            }
            None => false,
        }
    }
}

impl<const ALARM: usize> Default for TimerAlarm<ALARM> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const ALARM: usize> HardwareAlarm for TimerAlarm<ALARM> {
    fn program(&mut self, duration_ticks: u32, autoreload: bool) {
        apply::<ALARM>(self.schedule.program(duration_ticks, autoreload));
    }

    fn enable(&mut self) {
        apply::<ALARM>(self.schedule.enable(now()));
    }

    fn disable(&mut self) {
        apply::<ALARM>(self.schedule.disable(now()));
    }

    fn set_divider(&mut self, divider: u16) {
        let cycles = divider.clamp(1, MAX_TICK_CYCLES);
        pac::WATCHDOG.tick().write(|w| {
            w.set_cycles(cycles);
            w.set_enable(true);
        });
    }

    fn divider(&self) -> u16 {
        pac::WATCHDOG.tick().read().cycles()
    }

    fn config(&self) -> AlarmConfig {
        AlarmConfig {
            divider: self.divider(),
            autoreload: self.schedule.autoreload(),
            enabled: self.schedule.is_enabled(),
            direction: CountDirection::Up,
        }
    }
}

fn now() -> u32 {
    pac::TIMER.timerawl().read()
}

fn apply<const ALARM: usize>(action: CompareAction) {
    match action {
        CompareAction::Arm { target } => {
            pac::TIMER.alarm(ALARM).write_value(target);

            // A compare that has already passed would only match again after the counter wraps. The force
            // bit is cleared otherwise, or a force left over from an earlier past deadline fires early.
            let passed = deadline_passed(now(), target);
            if passed {
                disarm::<ALARM>();
            }
            pac::TIMER.intf().modify(|w| w.set_alarm(ALARM, passed));
        }
        CompareAction::Disarm => {
            disarm::<ALARM>();
            pac::TIMER.intf().modify(|w| w.set_alarm(ALARM, false));
        }
        CompareAction::Keep => (),
    }
}

fn disarm<const ALARM: usize>() {
    pac::TIMER.armed().write(|w| w.set_armed(1 << ALARM));
}
