//! Link diagnostics counters

/// Counters describing what the engine has seen on the link
///
/// All counters wrap on overflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    /// Complete frames assembled
    pub frames_received: u32,
    /// Partial frames timed out or frames too large for the buffer
    pub frames_discarded: u32,
    /// Write acknowledgements matched to an open write
    pub write_acks: u32,
    /// Read replies received, solicited or not
    pub read_replies: u32,
    /// Callbacks invoked
    pub callbacks_dispatched: u32,
    /// Transactions abandoned by timeout
    pub tx_timeouts: u32,
    /// Successful transport error recoveries
    pub recoveries: u32,
}

pub(crate) fn bump(counter: &mut u32) {
    *counter = counter.wrapping_add(1);
}
