#![no_std]
#![no_main]

mod config;
mod link;

use core::cell::RefCell;

use defmt::{error, info};
use embassy_executor::Executor;
use embassy_rp::clocks::ClockConfig;
use embassy_rp::config::Config as EmbassyConfig;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::interrupt;
use embassy_rp::uart::UartRx;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use ppm_generator::channels::ChannelBuffer;
use ppm_generator::clock::{ClockChangeEvent, ClockChangeNotifier};
use ppm_generator::driver::TimerAlarm;
use ppm_generator::failsafe::FailsafeWatchdog;
use ppm_generator::timing::{CHANNEL_COUNT, DEFAULT_CHANNEL_VALUE, START_DELAY_US};
use ppm_generator::{PpmGenerator, PpmTimings};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use crate::config::ppm::{CLOCK_SUBSCRIBERS, CRYSTAL_HZ, FAILSAFE_POLICY, FAILSAFE_THRESHOLD, PPM_ALARM};

type Generator = PpmGenerator<'static, TimerAlarm<PPM_ALARM>, Output<'static>, CHANNEL_COUNT>;

static THREAD_EXECUTOR: StaticCell<Executor> = StaticCell::new();
static CHANNELS: StaticCell<ChannelBuffer<CHANNEL_COUNT>> = StaticCell::new();

/// Shared by the alarm interrupt and clock change subscribers.
static GENERATOR: Mutex<CriticalSectionRawMutex, RefCell<Option<Generator>>> =
    Mutex::new(RefCell::new(None));

/// Code that reprograms `clk_ref` must go through [`ClockChangeNotifier::transition`] on this.
static CLOCK_CHANGES: ClockChangeNotifier<CLOCK_SUBSCRIBERS> = ClockChangeNotifier::new();

bind_link_interrupt!();
bind_ppm_interrupt!(on_ppm_alarm);

fn on_ppm_alarm() {
    GENERATOR.lock(|generator| {
        let mut generator = generator.borrow_mut();
        let Some(generator) = generator.as_mut() else {
            return;
        };

        if generator.alarm_mut().acknowledge() {
            generator.on_alarm();
        }
    });
}

fn on_clock_change(_context: usize, event: ClockChangeEvent) {
    GENERATOR.lock(|generator| {
        if let Some(generator) = generator.borrow_mut().as_mut() {
            generator.on_clock_change(&event);
        }
    });
}

#[cortex_m_rt::entry]
fn main() -> ! {
    let embassy_config = EmbassyConfig::new(ClockConfig::crystal(CRYSTAL_HZ));
    let p = embassy_rp::init(embassy_config);

    let channels: &'static ChannelBuffer<CHANNEL_COUNT> = CHANNELS.init(
        ChannelBuffer::new(PpmTimings::STANDARD, DEFAULT_CHANNEL_VALUE)
            .expect("Failed to create channel buffer!"),
    );

    let watchdog = FailsafeWatchdog::new(FAILSAFE_THRESHOLD, FAILSAFE_POLICY, &channels.timings())
        .expect("Invalid failsafe policy!");

    let output = Output::new(get_ppm_pin!(p), Level::Low);
    let mut generator = PpmGenerator::new(TimerAlarm::<PPM_ALARM>::new(), output, channels);

    if let Err(subscribe_error) = generator.subscribe_clock_changes(&CLOCK_CHANGES, 0, on_clock_change) {
        error!("Failed to subscribe PPM alarm to clock changes: {}", subscribe_error);
    }

    generator.start(START_DELAY_US);
    GENERATOR.lock(|cell| cell.replace(Some(generator)));
    unmask_ppm_interrupt();
    info!("PPM output running on alarm {}", PPM_ALARM);

    let (uart_peri, rx_pin, dma_channel) = get_link_peripherals!(p);
    let uart_config = config::link::get_uart_config();
    let uart_device = UartRx::new(uart_peri, rx_pin, UartIrq, dma_channel, uart_config);

    let thread_executor = THREAD_EXECUTOR.init(Executor::new());
    thread_executor.run(|spawner| {
        spawner
            .spawn(link::link_task(uart_device, channels, watchdog))
            .expect("Failed to create link task!")
    })
}
