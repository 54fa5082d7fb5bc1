//! Clock frequency change notification and alarm divider rescaling.
//!
//! The alarm counts raw clock cycles and its divider turns them into microsecond ticks. When the clock
//! feeding the timer is scaled, the divider has to be scaled with it or every programmed pulse silently
//! changes length.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::alarm::HardwareAlarm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockPhase {
    /// The clock is about to change. Timers fed by it must stop.
    Before,
    /// The clock has changed. Timers may be reconfigured and restarted.
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockChangeEvent {
    pub phase: ClockPhase,
    pub old_hz: u32,
    pub new_hz: u32,
}

/// Clock change handler. `context` is the value given when subscribing.
pub type ClockChangeCallback = fn(context: usize, event: ClockChangeEvent);

#[derive(Clone, Copy)]
struct Registration {
    context: usize,
    callback: ClockChangeCallback,
}

impl Registration {
    fn matches(&self, context: usize, callback: ClockChangeCallback) -> bool {
        self.context == context && core::ptr::fn_addr_eq(self.callback, callback)
    }
}

/// Fixed capacity set of clock change subscriptions.
///
/// The table is only touched inside a short critical section. Callbacks run after the section ends, so
/// they may take critical sections of their own (or subscribe and unsubscribe) without deadlocking.
pub struct ClockChangeNotifier<const CAP: usize> {
    registrations: Mutex<CriticalSectionRawMutex, RefCell<[Option<Registration>; CAP]>>,
}

impl<const CAP: usize> Default for ClockChangeNotifier<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> ClockChangeNotifier<CAP> {
    pub const fn new() -> Self {
        Self {
            registrations: Mutex::new(RefCell::new([None; CAP])),
        }
    }

    /// Subscribes `callback` to clock change events, in registration order.
    ///
    /// Returns [`crate::Error::DuplicateSubscription`] if the same (context, callback) pair is already
    /// subscribed, or [`crate::Error::SubscriberCapacity`] if the table is full.
    pub fn subscribe(&self, context: usize, callback: ClockChangeCallback) -> Result<(), crate::Error> {
        self.registrations.lock(|registrations| {
            let mut registrations = registrations.borrow_mut();

            if registrations
                .iter()
                .flatten()
                .any(|registration| registration.matches(context, callback))
            {
                return Err(crate::Error::DuplicateSubscription);
            }

            let slot = registrations
                .iter_mut()
                .find(|slot| slot.is_none())
                .ok_or(crate::Error::SubscriberCapacity)?;
            *slot = Some(Registration { context, callback });

            Ok(())
        })
    }

    /// Removes a subscription. Returns `false` if it was not subscribed.
    ///
    /// Later registrations move up so notification order stays the registration order.
    pub fn unsubscribe(&self, context: usize, callback: ClockChangeCallback) -> bool {
        self.registrations.lock(|registrations| {
            let mut registrations = registrations.borrow_mut();

            let Some(position) = registrations
                .iter()
                .position(|slot| slot.is_some_and(|registration| registration.matches(context, callback)))
            else {
                return false;
            };

            registrations[position..].rotate_left(1);
            registrations[CAP - 1] = None;
            true
        })
    }

    pub fn is_subscribed(&self, context: usize, callback: ClockChangeCallback) -> bool {
        self.registrations.lock(|registrations| {
            registrations
                .borrow()
                .iter()
                .flatten()
                .any(|registration| registration.matches(context, callback))
        })
    }

    pub fn len(&self) -> usize {
        self.registrations
            .lock(|registrations| registrations.borrow().iter().flatten().count())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `event` to every subscriber.
    pub fn notify(&self, event: ClockChangeEvent) {
        let registrations = self.registrations.lock(|registrations| *registrations.borrow());

        for registration in registrations.iter().flatten() {
            (registration.callback)(registration.context, event);
        }
    }

    /// Runs a clock reconfiguration from `old_hz` to `new_hz`, notifying subscribers before and after it.
    pub fn transition<R>(&self, old_hz: u32, new_hz: u32, reconfigure: impl FnOnce() -> R) -> R {
        self.notify(ClockChangeEvent {
            phase: ClockPhase::Before,
            old_hz,
            new_hz,
        });

        let result = reconfigure();

        self.notify(ClockChangeEvent {
            phase: ClockPhase::After,
            old_hz,
            new_hz,
        });

        result
    }
}

/// Rounds a frequency to whole megahertz.
pub const fn round_mhz(hz: u32) -> u32 {
    ((hz as u64 + 500_000) / 1_000_000) as u32
}

/// Scales an alarm divider from a clock of `old_hz` to one of `new_hz`, keeping the tick length.
///
/// Frequencies are rounded to whole megahertz first. Returns [`None`] if the old clock rounds to zero.
/// The result is clamped to `1..=u16::MAX`.
pub const fn rescale_divider(divider: u16, old_hz: u32, new_hz: u32) -> Option<u16> {
    let old_mhz = round_mhz(old_hz);
    if old_mhz == 0 {
        return None;
    }

    let scaled = divider as u64 * round_mhz(new_hz) as u64 / old_mhz as u64;
    Some(match scaled {
        0 => 1,
        scaled if scaled > u16::MAX as u64 => u16::MAX,
        scaled => scaled as u16,
    })
}

/// Stops an alarm ahead of a clock change and restarts it with a rescaled divider afterwards.
pub struct ClockRescaler;

impl ClockRescaler {
    pub fn on_clock_change<A: HardwareAlarm>(alarm: &mut A, event: &ClockChangeEvent) {
        match event.phase {
            ClockPhase::Before => alarm.disable(),
            ClockPhase::After => {
                match rescale_divider(alarm.divider(), event.old_hz, event.new_hz) {
                    Some(divider) => {
                        #[cfg(feature = "defmt-logging")]
                        defmt::debug!(
                            "Clock {}Hz -> {}Hz, alarm divider {} -> {}",
                            event.old_hz,
                            event.new_hz,
                            alarm.divider(),
                            divider
                        );
                        alarm.set_divider(divider);
                    }
                    None => {
                        #[cfg(feature = "defmt-logging")]
                        defmt::warn!(
                            "Ignoring clock change from {}Hz: old frequency rounds to 0MHz, divider left at {}",
                            event.old_hz,
                            alarm.divider()
                        );
                    }
                }

                alarm.enable();
            }
        }
    }
}
