use defmt::{error, info, warn};
use embassy_rp::uart::{self, UartRx};
use embassy_time::{TimeoutError, with_timeout};
use ppm_generator::channels::ChannelBuffer;
use ppm_generator::failsafe::{FailsafeWatchdog, WatchdogStatus};
use ppm_generator::timing::CHANNEL_COUNT;

use crate::config::link::{LINE_CAPACITY, RECEIVE_WINDOW};

/// Collects newline terminated packet lines. A line may span several receive windows.
struct LineReader {
    buffer: [u8; LINE_CAPACITY],
    len: usize,
    overflowed: bool,
}

impl LineReader {
    const fn new() -> Self {
        Self {
            buffer: [0u8; LINE_CAPACITY],
            len: 0,
            overflowed: false,
        }
    }

    /// Reads up to the end of the current line.
    ///
    /// Returns `None` for a line that did not fit in the buffer; it is dropped whole so a truncated
    /// packet is never mistaken for a shorter valid one.
    async fn read_line(
        &mut self,
        uart: &mut UartRx<'static, uart::Async>,
    ) -> Result<Option<&[u8]>, uart::Error> {
        let mut byte = [0u8; 1];

        loop {
            uart.read(&mut byte).await?;
            if byte[0] == b'\n' {
                break;
            }

            match self.buffer.get_mut(self.len) {
                Some(slot) => {
                    *slot = byte[0];
                    self.len += 1;
                }
                None => self.overflowed = true,
            }
        }

        let len = core::mem::take(&mut self.len);
        if core::mem::take(&mut self.overflowed) {
            return Ok(None);
        }

        Ok(Some(&self.buffer[..len]))
    }

    /// Drops a partially received line.
    fn discard(&mut self) {
        self.len = 0;
        self.overflowed = false;
    }
}

#[embassy_executor::task]
pub async fn link_task(
    mut uart: UartRx<'static, uart::Async>,
    channels: &'static ChannelBuffer<CHANNEL_COUNT>,
    mut watchdog: FailsafeWatchdog<CHANNEL_COUNT>,
) {
    let mut reader = LineReader::new();

    info!("Listening for channel packets...");
    loop {
        let was_engaged = watchdog.is_engaged();

        match with_timeout(RECEIVE_WINDOW, reader.read_line(&mut uart)).await {
            Ok(Ok(Some(line))) => {
                if let Err(update_error) = watchdog.receive_packet(line, channels) {
                    warn!("Rejected channel packet: {}", update_error);
                }
            }
            Ok(Ok(None)) => {
                warn!("Dropped channel packet longer than {} bytes!", LINE_CAPACITY);
                watchdog.notify_timeout_cycle(channels);
            }
            Ok(Err(read_error)) => {
                reader.discard();
                handle_uart_error(read_error);
            }
            Err(TimeoutError) => {
                watchdog.notify_timeout_cycle(channels);
            }
        }

        log_failsafe_transition(&watchdog, was_engaged);
    }
}

fn log_failsafe_transition(watchdog: &FailsafeWatchdog<CHANNEL_COUNT>, was_engaged: bool) {
    match (was_engaged, watchdog.status()) {
        (false, WatchdogStatus::Failsafe) => warn!(
            "No valid channel packet for {} receive windows, failsafe engaged!",
            watchdog.threshold()
        ),
        (true, WatchdogStatus::Fresh) => info!("Channel packets resumed, failsafe released!"),
        _ => (),
    }
}

fn handle_uart_error(err: uart::Error) {
    match err {
        uart::Error::Overrun => error!("UART link FIFO or shift-register overflowed!"),
        uart::Error::Break => error!("UART link received a break condition!"),
        uart::Error::Framing => error!("UART link failed to receive a valid stop bit!"),
        uart::Error::Parity => error!("UART link packet parity detected error!"),
        _ => error!("Unknown UART link error!"),
    }
}
