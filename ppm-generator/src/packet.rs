//! Channel update packets.
//!
//! A packet is ASCII text in which each channel value follows a one letter label, for example
//! `r1500p1500t1000y1500m2000a1500g1500`. Labels only separate the fields: values are assigned to
//! channels in the order they appear.

use num_enum::TryFromPrimitive;

use crate::channels::ChannelBuffer;

/// Field labels sent by the ground station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ChannelTag {
    Roll = b'r',
    Pitch = b'p',
    Throttle = b't',
    Yaw = b'y',
    Mode = b'm',
    Aux = b'a',
    Gear = b'g',
}

impl ChannelTag {
    pub fn is_tag(byte: u8) -> bool {
        Self::try_from(byte).is_ok()
    }
}

/// Channel values decoded from one packet, in channel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelPacket<const N: usize> {
    values: [u16; N],
    len: usize,
}

impl<const N: usize> ChannelPacket<N> {
    /// Decodes a packet.
    ///
    /// Empty fields (consecutive labels) are skipped, a fractional part is truncated, and surrounding
    /// whitespace or NUL padding is ignored.
    ///
    /// Returns [`crate::Error::EmptyPacket`] if no field holds a value,
    /// [`crate::Error::MalformedChannelValue`] if a field is not a number that fits in 16 bits, or
    /// [`crate::Error::TooManyChannels`] if there are more values than channels.
    pub fn parse(packet: &[u8]) -> Result<Self, crate::Error> {
        let mut values = [0u16; N];
        let mut count = 0;

        let fields = packet
            .split(|byte| ChannelTag::is_tag(*byte))
            .map(trim)
            .filter(|field| !field.is_empty());

        for field in fields {
            let value = parse_value(field)?;
            if let Some(slot) = values.get_mut(count) {
                *slot = value;
            }
            count += 1;
        }

        match count {
            0 => Err(crate::Error::EmptyPacket),
            count if count > N => Err(crate::Error::TooManyChannels { count }),
            len => Ok(Self { values, len }),
        }
    }

    /// Returns the decoded values; channel `i` is at index `i`.
    pub fn values(&self) -> &[u16] {
        &self.values[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Writes the values into the leading channels of `channels` as one validated update.
    ///
    /// Returns the number of channels written.
    pub fn apply(&self, channels: &ChannelBuffer<N>) -> Result<usize, crate::Error> {
        channels.set_all(self.values())?;
        Ok(self.len)
    }
}

fn is_padding(byte: &u8) -> bool {
    byte.is_ascii_whitespace() || *byte == 0
}

fn trim(field: &[u8]) -> &[u8] {
    let Some(start) = field.iter().position(|byte| !is_padding(byte)) else {
        return &[];
    };
    let end = field.iter().rposition(|byte| !is_padding(byte)).map_or(start, |end| end + 1);

    &field[start..end]
}

fn parse_value(field: &[u8]) -> Result<u16, crate::Error> {
    let (whole, fraction) = match field.iter().position(|byte| *byte == b'.') {
        Some(dot) => (&field[..dot], &field[dot + 1..]),
        None => (field, &[][..]),
    };

    if whole.is_empty() || !fraction.iter().all(u8::is_ascii_digit) {
        return Err(crate::Error::MalformedChannelValue);
    }

    whole
        .iter()
        .try_fold(0u16, |value, byte| {
            if !byte.is_ascii_digit() {
                return None;
            }
            value.checked_mul(10)?.checked_add(u16::from(byte - b'0'))
        })
        .ok_or(crate::Error::MalformedChannelValue)
}
