//! UART transport abstractions
//!
//! The DWIN engine never blocks on the serial port. Receive runs
//! continuously into the engine's ring storage and reports progress by
//! index; transmit is started and completes in the background.

/// UART transport used by the DWIN engine
///
/// Every method only *starts* an operation. Completion is reported out
/// of band, typically from an interrupt handler, through the engine's
/// port: receive progress with the index of the newest byte, transmit
/// complete, and error. Each of those is signalled exactly once per
/// event.
pub trait UartTransport {
    /// Error type for transport operations
    type Error: core::fmt::Debug;

    /// Start an idle-terminated receive into the engine's ring storage
    ///
    /// The transport writes incoming bytes at successive indices
    /// `0..capacity`, wrapping back to 0, and reports the index of the
    /// newest byte after each burst.
    fn start_receive(&mut self, capacity: usize) -> Result<(), Self::Error>;

    /// Start transmitting a complete frame
    ///
    /// The frame slice is only guaranteed valid for the duration of the
    /// call; implementations that transmit in the background must copy it.
    fn start_transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Abort any receive or transmit in progress
    fn abort(&mut self) -> Result<(), Self::Error>;
}

impl<T: UartTransport + ?Sized> UartTransport for &mut T {
    type Error = T::Error;

    fn start_receive(&mut self, capacity: usize) -> Result<(), Self::Error> {
        (**self).start_receive(capacity)
    }

    fn start_transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        (**self).start_transmit(frame)
    }

    fn abort(&mut self) -> Result<(), Self::Error> {
        (**self).abort()
    }
}

/// Error from UART operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UartBusError {
    /// Framing error
    Framing,
    /// Noise error
    Noise,
    /// Overrun error
    Overrun,
    /// Parity error
    Parity,
    /// Peripheral busy with a previous operation
    Busy,
    /// Buffer too small
    BufferTooSmall,
    /// Other error
    Other,
}

/// Serial line settings for a DGUS panel
///
/// DGUS panels always use 8 data bits; baud rate, parity and stop bits
/// are set in the panel's configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartConfig {
    /// Line rate in bits per second
    pub baudrate: u32,
    /// Parity bit, if any
    pub parity: Parity,
    /// Stop bits after each byte
    pub stop_bits: StopBits,
}

impl Default for UartConfig {
    fn default() -> Self {
        // Factory setting of DGUS panels
        Self::new(115_200)
    }
}

impl UartConfig {
    /// 8N1 at `baudrate`
    pub const fn new(baudrate: u32) -> Self {
        Self {
            baudrate,
            parity: Parity::None,
            stop_bits: StopBits::One,
        }
    }

    /// Line bits per transferred byte, start bit included
    pub const fn bits_per_byte(&self) -> u32 {
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Even | Parity::Odd => 1,
        };
        let stop = match self.stop_bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        };
        1 + 8 + parity + stop
    }

    /// Microseconds needed to transfer `bytes` bytes, rounded up
    pub const fn transfer_time_us(&self, bytes: u32) -> u32 {
        let bits = (bytes as u64) * (self.bits_per_byte() as u64) * 1_000_000;
        let rate = self.baudrate as u64;
        if rate == 0 {
            return u32::MAX;
        }
        let us = (bits + rate - 1) / rate;
        if us > u32::MAX as u64 {
            u32::MAX
        } else {
            us as u32
        }
    }
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Stop bit count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_dgus_factory_setting() {
        let config = UartConfig::default();
        assert_eq!(config.baudrate, 115_200);
        assert_eq!(config.bits_per_byte(), 10);
    }

    #[test]
    fn test_transfer_time() {
        let config = UartConfig::default();
        // A 16-byte frame at 115200 8N1 takes just under 1.4 ms
        assert_eq!(config.transfer_time_us(16), 1389);

        let slow = UartConfig {
            parity: Parity::Even,
            stop_bits: StopBits::Two,
            ..UartConfig::new(9600)
        };
        assert_eq!(slow.bits_per_byte(), 12);
        assert_eq!(slow.transfer_time_us(1), 1250);
        assert_eq!(UartConfig::new(0).transfer_time_us(1), u32::MAX);
    }
}
