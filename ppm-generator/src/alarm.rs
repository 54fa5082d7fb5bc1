//! Hardware countdown alarm abstraction.
//!
//! The generator only needs a timer that fires once per programmed interval and whose
//! tick-to-time divider can be read and changed. Expiry is delivered by the platform's interrupt,
//! which calls [`crate::PpmGenerator::on_alarm`].

/// Direction the underlying counter runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CountDirection {
    Up,
    Down,
}

/// Snapshot of the alarm's hardware configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmConfig {
    /// Raw clock cycles per timer tick.
    pub divider: u16,
    /// The alarm re-arms itself with the same interval after expiring.
    pub autoreload: bool,
    /// The alarm is counting and will fire.
    pub enabled: bool,
    pub direction: CountDirection,
}

pub trait HardwareAlarm {
    /// Sets the interval to the next expiry in timer ticks.
    ///
    /// Called from the expiry handler this schedules the next expiry relative to the one that just fired,
    /// so interrupt latency does not accumulate.
    fn program(&mut self, duration_ticks: u32, autoreload: bool);

    /// Starts (or resumes) counting towards the programmed expiry.
    ///
    /// A count interrupted by [`HardwareAlarm::disable`] resumes with the time it had left.
    fn enable(&mut self);

    /// Stops counting without losing the remaining time of the in-flight interval.
    fn disable(&mut self);

    /// Sets the number of raw clock cycles per timer tick.
    fn set_divider(&mut self, divider: u16);

    /// Returns the number of raw clock cycles per timer tick.
    fn divider(&self) -> u16;

    /// Returns a snapshot of the alarm configuration.
    fn config(&self) -> AlarmConfig;
}

/// Returns `true` once a free-running 32 bit up-counter at `now` has reached `target`, across wraps.
///
/// Deadlines more than half the counter range away count as passed.
pub const fn deadline_passed(now: u32, target: u32) -> bool {
    now.wrapping_sub(target) as i32 >= 0
}

/// What a compare register has to be set to after a [`DeadlineSchedule`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompareAction {
    /// Compare against `target`. The backend fires at once, and only then, if `target` has already
    /// passed by the time the register is written.
    Arm { target: u32 },
    /// Stop comparing and drop any pending or forced expiry.
    Disarm,
    /// Leave the hardware alone.
    Keep,
}

/// Interval bookkeeping for an alarm that compares an up-counter against absolute deadlines.
///
/// Each interval is measured from the deadline of the previous one, not from when its expiry was
/// handled, so interrupt latency never accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineSchedule {
    /// Absolute tick of the armed expiry.
    target: u32,
    /// Absolute tick the current interval started at.
    interval_start: u32,
    period: u32,
    autoreload: bool,
    enabled: bool,
    /// Time left in an interval interrupted by `disable`.
    remaining: Option<u32>,
}

impl DeadlineSchedule {
    pub const fn new(now: u32) -> Self {
        Self {
            target: now,
            interval_start: now,
            period: 0,
            autoreload: false,
            enabled: false,
            remaining: None,
        }
    }

    pub const fn target(&self) -> u32 {
        self.target
    }

    pub const fn period(&self) -> u32 {
        self.period
    }

    pub const fn autoreload(&self) -> bool {
        self.autoreload
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the interval; while enabled the current interval is re-targeted to end `duration_ticks`
    /// after it started.
    pub fn program(&mut self, duration_ticks: u32, autoreload: bool) -> CompareAction {
        self.period = duration_ticks;
        self.autoreload = autoreload;
        self.remaining = None;

        if !self.enabled {
            return CompareAction::Keep;
        }

        self.arm(self.interval_start.wrapping_add(duration_ticks))
    }

    /// Starts counting, resuming the time left by [`DeadlineSchedule::disable`] if there is any.
    pub fn enable(&mut self, now: u32) -> CompareAction {
        if self.enabled {
            return CompareAction::Keep;
        }

        let remaining = self.remaining.take().unwrap_or(self.period);
        let target = now.wrapping_add(remaining);
        self.interval_start = target.wrapping_sub(self.period);
        self.enabled = true;

        self.arm(target)
    }

    /// Stops counting and remembers how long the current interval still had to run.
    pub fn disable(&mut self, now: u32) -> CompareAction {
        if !self.enabled {
            return CompareAction::Keep;
        }

        self.enabled = false;
        let left = self.target.wrapping_sub(now) as i32;
        self.remaining = Some(left.max(0) as u32);

        CompareAction::Disarm
    }

    /// Handles an expiry interrupt seen at `now`.
    ///
    /// Returns [`None`] if the alarm is disabled or its deadline has not been reached: a stale or
    /// spurious interrupt that must not advance anything. Otherwise the next interval starts at the
    /// deadline that just passed.
    pub fn expire(&mut self, now: u32) -> Option<CompareAction> {
        if !self.enabled || !deadline_passed(now, self.target) {
            return None;
        }

        self.interval_start = self.target;
        if self.autoreload {
            Some(self.arm(self.interval_start.wrapping_add(self.period)))
        } else {
            self.enabled = false;
            Some(CompareAction::Disarm)
        }
    }

    fn arm(&mut self, target: u32) -> CompareAction {
        self.target = target;
        CompareAction::Arm { target }
    }
}
