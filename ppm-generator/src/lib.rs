//! A crate for generating an RC PPM (pulse position modulation) signal from a single output pin
//!
//! The frame is produced by reprogramming a hardware alarm on every phase transition, so each channel
//! slot gets its own width while the frame as a whole stays exactly [`timing::FRAME_LENGTH_US`] long.
//! Channel values are shared with the update path through a lock-free [`channels::ChannelBuffer`], and a
//! [`failsafe::FailsafeWatchdog`] forces safe values when updates stop arriving.

#![no_std]

pub mod alarm;
pub mod channels;
pub mod clock;
pub mod failsafe;
pub mod frame;
pub mod generator;
pub mod packet;
pub mod timing;

#[cfg(feature = "driver")]
pub mod driver;

pub use generator::PpmGenerator;
pub use timing::PpmTimings;

#[derive(Debug, Clone, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Channel index is not below the channel count.
    #[error("Channel index {index} is out of range")]
    ChannelIndexOutOfRange { index: usize },
    /// Channel value must lie between the pulse length and the longest slot that still fits in a frame.
    #[error("Channel value {value}us must be in the range {min}-{max}us")]
    ChannelValueOutOfRange { value: u16, min: u16, max: u16 },
    /// The channel slots would not leave a non-negative sync gap.
    #[error("Channel slots total {total_us}us, longer than the {frame_us}us frame")]
    FrameOverrun { total_us: u32, frame_us: u32 },
    /// Pulse and frame lengths cannot hold the requested number of channels.
    #[error("Invalid PPM timings")]
    InvalidTimings,
    /// The (context, callback) pair is already subscribed.
    #[error("Clock change callback already subscribed")]
    DuplicateSubscription,
    /// Every clock change registration slot is taken.
    #[error("No free clock change registration slot")]
    SubscriberCapacity,
    /// Packet contained no channel values.
    #[error("Channel packet contains no values")]
    EmptyPacket,
    /// A packet field could not be read as a number of microseconds.
    #[error("Malformed channel value in packet")]
    MalformedChannelValue,
    /// Packet carried more values than there are channels.
    #[error("Channel packet carries {count} values, more than the channel count")]
    TooManyChannels { count: usize },
}
