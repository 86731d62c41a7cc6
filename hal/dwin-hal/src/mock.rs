//! Mock UART transport for host testing

use crate::uart::{UartBusError, UartConfig, UartTransport};

/// Mock UART transport
///
/// Records every frame handed over for transmission and counts receive
/// starts and aborts, so tests can check what the engine asked the
/// hardware to do. Failures can be injected per operation.
///
/// # Example
///
/// ```
/// use dwin_hal::{MockUart, UartTransport};
///
/// let mut uart = MockUart::new(Default::default());
/// uart.start_transmit(&[0x5A, 0xA5]).unwrap();
/// assert_eq!(uart.last_sent(), Some(&[0x5A, 0xA5][..]));
/// ```
#[derive(Debug, Default)]
pub struct MockUart {
    config: UartConfig,
    sent: Vec<Vec<u8>>,
    receive_starts: usize,
    receive_capacity: usize,
    aborts: usize,
    fail_transmit: bool,
    fail_receive: bool,
}

impl MockUart {
    /// Create a new mock UART
    pub fn new(config: UartConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// All frames passed to `start_transmit`, oldest first
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// Most recently transmitted frame
    pub fn last_sent(&self) -> Option<&[u8]> {
        self.sent.last().map(Vec::as_slice)
    }

    /// Forget recorded transmissions
    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    /// Number of times reception was (re)started
    pub fn receive_starts(&self) -> usize {
        self.receive_starts
    }

    /// Capacity passed to the last successful `start_receive`
    pub fn receive_capacity(&self) -> usize {
        self.receive_capacity
    }

    /// Number of abort requests
    pub fn aborts(&self) -> usize {
        self.aborts
    }

    /// Make subsequent transmits fail
    pub fn set_fail_transmit(&mut self, fail: bool) {
        self.fail_transmit = fail;
    }

    /// Make subsequent receive starts fail
    pub fn set_fail_receive(&mut self, fail: bool) {
        self.fail_receive = fail;
    }

    /// Get current configuration
    pub fn config(&self) -> UartConfig {
        self.config
    }
}

impl UartTransport for MockUart {
    type Error = UartBusError;

    fn start_receive(&mut self, capacity: usize) -> Result<(), Self::Error> {
        if self.fail_receive {
            return Err(UartBusError::Busy);
        }
        self.receive_starts += 1;
        self.receive_capacity = capacity;
        Ok(())
    }

    fn start_transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        if self.fail_transmit {
            return Err(UartBusError::Busy);
        }
        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn abort(&mut self) -> Result<(), Self::Error> {
        self.aborts += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_frames() {
        let mut uart = MockUart::new(UartConfig::default());
        uart.start_transmit(&[1, 2, 3]).unwrap();
        uart.start_transmit(&[4]).unwrap();

        assert_eq!(uart.sent().len(), 2);
        assert_eq!(uart.last_sent(), Some(&[4u8][..]));

        uart.clear_sent();
        assert!(uart.last_sent().is_none());
    }

    #[test]
    fn test_mock_injected_failures() {
        let mut uart = MockUart::new(UartConfig::default());
        uart.set_fail_transmit(true);
        uart.set_fail_receive(true);

        assert_eq!(uart.start_transmit(&[1]), Err(UartBusError::Busy));
        assert_eq!(uart.start_receive(32), Err(UartBusError::Busy));
        assert!(uart.sent().is_empty());
        assert_eq!(uart.receive_starts(), 0);
    }

    #[test]
    fn test_mock_receive_and_abort_counts() {
        let mut uart = MockUart::new(UartConfig::default());
        uart.start_receive(32).unwrap();
        uart.abort().unwrap();
        uart.start_receive(16).unwrap();

        assert_eq!(uart.receive_starts(), 2);
        assert_eq!(uart.receive_capacity(), 16);
        assert_eq!(uart.aborts(), 1);
        assert_eq!(uart.config().baudrate, 115_200);
    }

    #[test]
    fn test_mut_ref_forwards() {
        fn send<T: UartTransport>(mut transport: T) {
            transport.start_transmit(&[9]).unwrap();
        }

        let mut uart = MockUart::new(UartConfig::default());
        send(&mut uart);
        assert_eq!(uart.last_sent(), Some(&[9u8][..]));
    }
}
