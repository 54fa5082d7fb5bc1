mod common;

use embedded_hal::digital::PinState;
use ppm_generator::clock::{ClockChangeEvent, ClockChangeNotifier, ClockPhase};
use ppm_generator::frame::FrameState;
use ppm_generator::timing::{CHANNEL_COUNT, FRAME_LENGTH_US, START_DELAY_US};
use ppm_generator::{Error, PpmGenerator};

use common::{RecordingPin, SimAlarm, standard_buffer};

fn forward(_context: usize, _event: ClockChangeEvent) {}

#[test]
fn test_start_arms_first_frame() {
    let channels = standard_buffer();
    let mut generator = PpmGenerator::new(SimAlarm::with_divider(125), RecordingPin::default(), &channels);

    generator.start(START_DELAY_US);

    assert_eq!(generator.pin().level(), Some(PinState::Low));
    assert_eq!(generator.alarm().programmed, vec![START_DELAY_US]);
    assert!(generator.alarm().enabled);
    assert!(generator.alarm().autoreload);
    assert_eq!(generator.frame().state(), FrameState::Idle);
}

#[test]
fn test_alarm_drives_full_frame() {
    let channels = standard_buffer();
    channels.set(1, 1_000).unwrap();
    let mut generator = PpmGenerator::new(SimAlarm::with_divider(125), RecordingPin::default(), &channels);
    generator.start(START_DELAY_US);

    let mut frame_ended = false;
    for index in 0..2 * CHANNEL_COUNT {
        let phase = generator.on_alarm();
        let expected = if index % 2 == 0 { PinState::High } else { PinState::Low };
        assert_eq!(generator.pin().level(), Some(expected), "Wrong level after expiry {}", index);
        assert_eq!(phase.level, expected);
        frame_ended = phase.ends_frame;
    }
    assert!(frame_ended);

    let programmed = &generator.alarm().programmed;
    assert_eq!(programmed[0], START_DELAY_US);
    assert_eq!(programmed[1], 300);
    assert_eq!(programmed[4], 1_000 - 300);
    assert_eq!(programmed[1..].iter().sum::<u32>(), FRAME_LENGTH_US);
}

#[test]
fn test_frames_repeat_back_to_back() {
    let channels = standard_buffer();
    let mut generator = PpmGenerator::new(SimAlarm::with_divider(125), RecordingPin::default(), &channels);
    generator.start(START_DELAY_US);

    for _ in 0..3 * 2 * CHANNEL_COUNT {
        generator.on_alarm();
    }

    let frames: Vec<u32> = generator.alarm().programmed[1..]
        .chunks(2 * CHANNEL_COUNT)
        .map(|frame| frame.iter().sum())
        .collect();
    assert_eq!(frames, vec![FRAME_LENGTH_US; 3]);
}

#[test]
fn test_clock_change_rescales_alarm() {
    let channels = standard_buffer();
    let mut generator = PpmGenerator::new(SimAlarm::with_divider(80), RecordingPin::default(), &channels);
    generator.start(START_DELAY_US);

    generator.on_clock_change(&ClockChangeEvent {
        phase: ClockPhase::Before,
        old_hz: 80_000_000,
        new_hz: 40_000_000,
    });
    assert!(!generator.alarm().enabled);

    generator.on_clock_change(&ClockChangeEvent {
        phase: ClockPhase::After,
        old_hz: 80_000_000,
        new_hz: 40_000_000,
    });
    assert!(generator.alarm().enabled);
    assert_eq!(generator.alarm().divider, 40);
}

#[test]
fn test_stop_disables_and_unsubscribes() {
    let channels = standard_buffer();
    let notifier = ClockChangeNotifier::<2>::new();
    let mut generator = PpmGenerator::new(SimAlarm::with_divider(125), RecordingPin::default(), &channels);

    generator.subscribe_clock_changes(&notifier, 1, forward).unwrap();
    assert_eq!(
        generator.subscribe_clock_changes(&notifier, 1, forward),
        Err(Error::DuplicateSubscription)
    );

    generator.start(START_DELAY_US);
    generator.on_alarm();
    assert_eq!(generator.pin().level(), Some(PinState::High));

    generator.stop(&notifier);

    assert!(!generator.alarm().enabled);
    assert!(notifier.is_empty());
    assert_eq!(generator.pin().level(), Some(PinState::Low));
    assert_eq!(generator.frame().state(), FrameState::Idle);
}

#[test]
fn test_stop_without_subscription() {
    let channels = standard_buffer();
    let notifier = ClockChangeNotifier::<2>::new();
    notifier.subscribe(9, forward).unwrap();
    let mut generator = PpmGenerator::new(SimAlarm::with_divider(125), RecordingPin::default(), &channels);

    generator.start(START_DELAY_US);
    generator.stop(&notifier);

    assert!(!generator.alarm().enabled);
    assert_eq!(notifier.len(), 1, "Unrelated subscriptions must survive");
}
