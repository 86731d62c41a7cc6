//! Link configuration

use dwin_protocol::Tick;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default ticks before an unanswered request is abandoned
pub const DEFAULT_TX_TIMEOUT_TICKS: Tick = 1000;

/// Default ticks before a partial incoming frame is discarded
pub const DEFAULT_RX_FRAME_TIMEOUT_TICKS: Tick = 1000;

/// Default receive ring storage, in bytes
pub const DEFAULT_RING_CAPACITY: usize = 64;

/// Timeouts for one display link
///
/// Ticks are whatever unit the host loop passes to `tick`, usually
/// milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkConfig {
    /// Ticks from sending a request until it is abandoned
    pub tx_timeout_ticks: Tick,
    /// Ticks from a frame header until the partial frame is discarded
    pub rx_frame_timeout_ticks: Tick,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkConfig {
    /// Configuration with the default timeouts
    pub const fn new() -> Self {
        Self {
            tx_timeout_ticks: DEFAULT_TX_TIMEOUT_TICKS,
            rx_frame_timeout_ticks: DEFAULT_RX_FRAME_TIMEOUT_TICKS,
        }
    }

    /// Set the transaction timeout
    pub const fn with_tx_timeout(mut self, ticks: Tick) -> Self {
        self.tx_timeout_ticks = ticks;
        self
    }

    /// Set the partial-frame timeout
    pub const fn with_rx_frame_timeout(mut self, ticks: Tick) -> Self {
        self.rx_frame_timeout_ticks = ticks;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.tx_timeout_ticks, 1000);
        assert_eq!(config.rx_frame_timeout_ticks, 1000);
    }

    #[test]
    fn test_builders() {
        const CONFIG: LinkConfig = LinkConfig::new().with_tx_timeout(50).with_rx_frame_timeout(20);
        assert_eq!(CONFIG.tx_timeout_ticks, 50);
        assert_eq!(CONFIG.rx_frame_timeout_ticks, 20);
    }
}
