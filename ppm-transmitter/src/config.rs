pub mod ppm {
    use embassy_rp::gpio::Pin;
    use ppm_generator::failsafe::FailsafePolicy;
    use ppm_generator::timing::CHANNEL_COUNT;
    use static_assertions::assert_impl_all as assert_impl;

    #[allow(clippy::wildcard_imports)]
    use embassy_rp::peripherals::*;

    macro_rules! define_ppm_config {
        (
            output_pin: $output_pin:ty,
            alarm: $alarm:literal,
            crystal_hz: $crystal_hz:expr,
            clock_subscribers: $clock_subscribers:expr,
            failsafe_threshold: $failsafe_threshold:expr,
            failsafe_policy: $failsafe_policy:expr
        ) => {
            pub type OutputPin = $output_pin;

            // Any GPIO can drive the PPM line.
            assert_impl!(OutputPin: Pin);

            /// Gets the PPM output pin as defined by define_ppm_config!
            #[macro_export]
            macro_rules! get_ppm_pin {
                ($peripherals:ident) => {
                    ::pastey::paste! { $peripherals.[<$output_pin>] }
                }
            }

            /// Binds `$handler` to the TIMER interrupt of the configured alarm and defines
            /// `unmask_ppm_interrupt` to enable it.
            ///
            /// Needs `embassy_rp::interrupt` in scope for the `#[interrupt]` attribute.
            #[macro_export]
            macro_rules! bind_ppm_interrupt {
                ($handler:path) => {
                    ::pastey::paste! {
                        #[interrupt]
                        fn [<TIMER_IRQ_ $alarm>]() {
                            $handler()
                        }

                        fn unmask_ppm_interrupt() {
                            use ::embassy_rp::interrupt::InterruptExt;

                            // Above embassy-time so a busy executor cannot stretch a pulse.
                            ::embassy_rp::interrupt::[<TIMER_IRQ_ $alarm>]
                                .set_priority(::embassy_rp::interrupt::Priority::P0);
                            // SAFETY: the handler only touches the generator inside a critical section.
                            unsafe { ::embassy_rp::interrupt::[<TIMER_IRQ_ $alarm>].enable() };
                        }
                    }
                };
            }

            /// TIMER alarm timing the PPM output. Alarm 0 belongs to embassy-time.
            pub const PPM_ALARM: usize = $alarm;
            pub const CRYSTAL_HZ: u32 = $crystal_hz;
            pub const CLOCK_SUBSCRIBERS: usize = $clock_subscribers;
            pub const FAILSAFE_THRESHOLD: u16 = $failsafe_threshold;
            pub const FAILSAFE_POLICY: FailsafePolicy<CHANNEL_COUNT> = $failsafe_policy;
        };
    }

    define_ppm_config! {
        output_pin: PIN_15,
        alarm: 1,
        crystal_hz: 12_000_000,
        clock_subscribers: 4,
        failsafe_threshold: ppm_generator::timing::FAILSAFE_THRESHOLD,
        // Throttle to minimum, flight mode to its safe position, everything else held.
        failsafe_policy: FailsafePolicy::hold().with(2, 1_000).with(4, 2_000)
    }
}

pub mod link {
    use embassy_rp::uart;
    use embassy_time::Duration;
    use static_assertions::assert_impl_all as assert_impl;

    #[allow(clippy::wildcard_imports)]
    use embassy_rp::peripherals::*;

    macro_rules! define_link_config {
        (
            peripheral: $uart:ty,
            rx_pin: $rx_pin:ty,
            dma_channel: $dma_channel:ty,
            baudrate: $baudrate:expr,
            receive_window_ms: $receive_window_ms:expr,
            line_capacity: $line_capacity:expr
        ) => {
            // Assert that the given pin can receive on the given UART.
            assert_impl!($rx_pin: uart::RxPin<$uart>);

            /// Gets the link UART, RX pin and DMA channel as defined by define_link_config!
            #[macro_export]
            macro_rules! get_link_peripherals {
                ($peripherals:ident) => {
                    ::pastey::paste! {(
                        $peripherals.[<$uart>],
                        $peripherals.[<$rx_pin>],
                        $peripherals.[<$dma_channel>],
                    )}
                }
            }

            /// Binds the UART interrupt of the link peripheral to `UartIrq`.
            #[macro_export]
            macro_rules! bind_link_interrupt {
                () => {
                    ::pastey::paste! {
                        ::embassy_rp::bind_interrupts!(struct UartIrq {
                            [<$uart _IRQ>] => ::embassy_rp::uart::InterruptHandler<::embassy_rp::peripherals::$uart>;
                        });
                    }
                }
            }

            pub fn get_uart_config() -> uart::Config {
                let mut config = uart::Config::default();

                config.baudrate = $baudrate;
                config.data_bits = uart::DataBits::DataBits8;
                config.stop_bits = uart::StopBits::STOP1;
                config.parity = uart::Parity::ParityNone;

                config
            }

            /// How long to wait for a packet before counting a missed update.
            pub const RECEIVE_WINDOW: Duration = Duration::from_millis($receive_window_ms);
            /// Longest packet line accepted, excluding the newline.
            pub const LINE_CAPACITY: usize = $line_capacity;
        };
    }

    define_link_config! {
        peripheral: UART0,
        rx_pin: PIN_1,
        dma_channel: DMA_CH0,
        baudrate: 115_200,
        receive_window_ms: 15,
        line_capacity: 64
    }
}
