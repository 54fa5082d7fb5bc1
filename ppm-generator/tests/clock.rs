mod common;

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use ppm_generator::Error;
use ppm_generator::alarm::HardwareAlarm;
use ppm_generator::clock::{
    ClockChangeEvent, ClockChangeNotifier, ClockPhase, ClockRescaler, rescale_divider, round_mhz,
};

use common::SimAlarm;

fn before(old_hz: u32, new_hz: u32) -> ClockChangeEvent {
    ClockChangeEvent { phase: ClockPhase::Before, old_hz, new_hz }
}

fn after(old_hz: u32, new_hz: u32) -> ClockChangeEvent {
    ClockChangeEvent { phase: ClockPhase::After, old_hz, new_hz }
}

#[test]
fn test_rescale_halved_clock() {
    // 80MHz / 80 = 1 tick per us, so 40MHz needs 40.
    assert_eq!(rescale_divider(80, 80_000_000, 40_000_000), Some(40));
}

#[test]
fn test_rescale_law_within_rounding() {
    for (divider, old_hz, new_hz) in [
        (80u16, 80_000_000u32, 160_000_000u32),
        (80, 80_000_000, 240_000_000),
        (12, 12_000_000, 48_000_000),
        (125, 125_000_000, 133_000_000),
        (133, 133_000_000, 125_000_000),
        (240, 240_000_000, 10_000_000),
    ] {
        let expected = u32::from(divider) * (new_hz / 1_000_000) / (old_hz / 1_000_000);
        let rescaled = u32::from(rescale_divider(divider, old_hz, new_hz).unwrap());
        assert!(
            rescaled.abs_diff(expected) <= 1,
            "Divider {} at {}Hz -> {}Hz gave {}, expected {}",
            divider, old_hz, new_hz, rescaled, expected
        );
    }
}

#[test]
fn test_frequencies_round_to_nearest_mhz() {
    assert_eq!(round_mhz(79_600_000), 80);
    assert_eq!(round_mhz(80_400_000), 80);
    assert_eq!(round_mhz(1_500_000), 2);
    assert_eq!(round_mhz(499_999), 0);
}

#[test]
fn test_zero_old_frequency_is_not_a_rescale() {
    assert_eq!(rescale_divider(80, 0, 40_000_000), None);
    assert_eq!(rescale_divider(80, 400_000, 40_000_000), None);

    let mut alarm = SimAlarm::with_divider(80);
    alarm.enable();
    ClockRescaler::on_clock_change(&mut alarm, &before(0, 40_000_000));
    ClockRescaler::on_clock_change(&mut alarm, &after(0, 40_000_000));

    assert_eq!(alarm.divider(), 80);
    assert!(alarm.enabled, "Alarm must resume even when the divider is left alone");
}

#[test]
fn test_rescale_result_is_clamped() {
    assert_eq!(rescale_divider(1, 240_000_000, 1_000_000), Some(1));
    assert_eq!(rescale_divider(1, 240_000_000, 200_000), Some(1));
    assert_eq!(rescale_divider(u16::MAX, 1_000_000, 2_000_000), Some(u16::MAX));
}

#[test]
fn test_rescaler_stops_before_and_resumes_after() {
    let mut alarm = SimAlarm::with_divider(80);
    alarm.program(1_200, true);
    alarm.enable();

    ClockRescaler::on_clock_change(&mut alarm, &before(80_000_000, 40_000_000));
    assert!(!alarm.enabled);
    assert_eq!(alarm.divider(), 80, "Divider must not change while the clock is switching");

    ClockRescaler::on_clock_change(&mut alarm, &after(80_000_000, 40_000_000));
    assert!(alarm.enabled);
    assert_eq!(alarm.divider(), 40);
}

#[test]
fn test_no_time_lost_across_clock_change() {
    let mut alarm = SimAlarm::with_divider(80);
    alarm.program(1_200, true);
    alarm.enable();

    assert!(!alarm.tick(500));
    ClockRescaler::on_clock_change(&mut alarm, &before(80_000_000, 40_000_000));
    assert!(!alarm.tick(10_000), "Stopped alarm must not count");
    ClockRescaler::on_clock_change(&mut alarm, &after(80_000_000, 40_000_000));

    assert!(!alarm.tick(699));
    assert!(alarm.tick(1), "Interval must complete after exactly the remaining 700 ticks");
}

static ORDER: Mutex<Vec<(usize, ClockPhase)>> = Mutex::new(Vec::new());

fn record_first(context: usize, event: ClockChangeEvent) {
    ORDER.lock().unwrap().push((context, event.phase));
}

fn record_second(context: usize, event: ClockChangeEvent) {
    ORDER.lock().unwrap().push((context + 100, event.phase));
}

#[test]
fn test_transition_notifies_in_registration_order() {
    let notifier = ClockChangeNotifier::<4>::new();
    notifier.subscribe(1, record_first).unwrap();
    notifier.subscribe(2, record_second).unwrap();

    let reconfigured = notifier.transition(80_000_000, 40_000_000, || {
        ORDER.lock().unwrap().push((0, ClockPhase::Before));
        true
    });

    assert!(reconfigured);
    assert_eq!(
        *ORDER.lock().unwrap(),
        vec![
            (1, ClockPhase::Before),
            (102, ClockPhase::Before),
            (0, ClockPhase::Before),
            (1, ClockPhase::After),
            (102, ClockPhase::After),
        ]
    );
}

fn ignore(_context: usize, _event: ClockChangeEvent) {}

fn ignore_too(_context: usize, _event: ClockChangeEvent) {}

#[test]
fn test_duplicate_subscription_is_rejected() {
    let notifier = ClockChangeNotifier::<4>::new();

    assert_eq!(notifier.subscribe(7, ignore), Ok(()));
    assert_eq!(notifier.subscribe(7, ignore), Err(Error::DuplicateSubscription));
    // Same callback with another context, or another callback, is a new registration.
    assert_eq!(notifier.subscribe(8, ignore), Ok(()));
    assert_eq!(notifier.subscribe(7, ignore_too), Ok(()));
    assert_eq!(notifier.len(), 3);
}

#[test]
fn test_subscription_capacity() {
    let notifier = ClockChangeNotifier::<2>::new();
    notifier.subscribe(1, ignore).unwrap();
    notifier.subscribe(2, ignore).unwrap();

    assert_eq!(notifier.subscribe(3, ignore), Err(Error::SubscriberCapacity));

    assert!(notifier.unsubscribe(1, ignore));
    assert_eq!(notifier.subscribe(3, ignore), Ok(()));
}

#[test]
fn test_unsubscribe() {
    let notifier = ClockChangeNotifier::<4>::new();
    notifier.subscribe(1, ignore).unwrap();

    assert!(notifier.is_subscribed(1, ignore));
    assert!(notifier.unsubscribe(1, ignore));
    assert!(!notifier.unsubscribe(1, ignore));
    assert!(notifier.is_empty());
}

static RESUBSCRIBED: AtomicUsize = AtomicUsize::new(0);
static REENTRANT_NOTIFIER: ClockChangeNotifier<2> = ClockChangeNotifier::new();

fn unsubscribe_self(context: usize, _event: ClockChangeEvent) {
    // Callbacks run outside the registration lock.
    REENTRANT_NOTIFIER.unsubscribe(context, unsubscribe_self);
    RESUBSCRIBED.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn test_callback_may_modify_subscriptions() {
    REENTRANT_NOTIFIER.subscribe(5, unsubscribe_self).unwrap();
    REENTRANT_NOTIFIER.notify(before(80_000_000, 40_000_000));
    REENTRANT_NOTIFIER.notify(after(80_000_000, 40_000_000));

    assert_eq!(RESUBSCRIBED.load(Ordering::SeqCst), 1);
    assert!(REENTRANT_NOTIFIER.is_empty());
}
