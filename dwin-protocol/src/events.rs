//! VP value updates delivered by the display

/// Values read back from display memory
///
/// Produced from a read reply (function code 0x83), whether it answers a
/// read request or was sent unsolicited because a watched VP changed
/// (a button press, a slider move).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VpUpdate<'a> {
    /// First VP address covered by the reply
    pub address: u16,
    /// Number of 16-bit words the reply declares
    pub count: u8,
    /// Raw value bytes, big-endian words
    pub payload: &'a [u8],
}

impl<'a> VpUpdate<'a> {
    /// Iterate the payload as 16-bit values
    ///
    /// A trailing odd byte, which only appears in a truncated reply, is
    /// skipped.
    pub fn values(&self) -> impl Iterator<Item = u16> + 'a {
        self.payload
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
    }

    /// Value at `index`, if it arrived
    pub fn value(&self, index: usize) -> Option<u16> {
        let start = index.checked_mul(2)?;
        let pair = self.payload.get(start..start + 2)?;
        Some(u16::from_be_bytes([pair[0], pair[1]]))
    }

    /// True if every declared word is present in the payload
    pub fn is_complete(&self) -> bool {
        self.payload.len() == usize::from(self.count) * 2
    }
}
