//! Frame layout and the receive state machine for the DGUS serial protocol.
//!
//! Frame format:
//! - HEADER (2 bytes): 0x5A 0xA5
//! - LENGTH (1 byte): number of bytes that follow (function code + data)
//! - FUNCTION (1 byte): 0x82 write variable, 0x83 read variable
//! - DATA (LENGTH - 1 bytes): function-specific payload
//!
//! There is no checksum in the default DGUS configuration; a frame is
//! recovered from the byte stream by its header alone, and partial frames
//! are bounded by a tick-based timeout.

use crate::Tick;

/// First header byte
pub const HEADER_HIGH: u8 = 0x5A;

/// Second header byte
pub const HEADER_LOW: u8 = 0xA5;

/// Write variable (VP) function code
pub const FN_WRITE_VP: u8 = 0x82;

/// Read variable (VP) function code
pub const FN_READ_VP: u8 = 0x83;

/// Payload of the display's write acknowledgement ("OK")
pub const WRITE_ACK_PAYLOAD: [u8; 2] = [0x4F, 0x4B];

/// Receive frame buffer size (header + length + function + data)
pub const RX_FRAME_MAX_LEN: usize = 16;

/// Transmit frame buffer size
pub const TX_FRAME_MAX_LEN: usize = 16;

/// Bytes preceding the data area: header (2), length, function code
pub const FRAME_OVERHEAD: usize = 4;

/// Data bytes the receive buffer can hold
pub const RX_DATA_CAPACITY: usize = RX_FRAME_MAX_LEN - FRAME_OVERHEAD;

const IDX_HEADER_HIGH: usize = 0;
const IDX_HEADER_LOW: usize = 1;
const IDX_LEN: usize = 2;
const IDX_FUNCTION: usize = 3;
const IDX_DATA: usize = FRAME_OVERHEAD;

/// Errors that can occur during frame encoding or decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Request carries no values
    EmptyPayload,
    /// Encoded frame would not fit its buffer
    PayloadTooLarge,
    /// Frame structure does not match its function code
    InvalidFrame,
}

/// Receive parser state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxState {
    /// Scanning for 0x5A 0xA5
    WaitingHeader,
    /// Header seen, next byte is LENGTH
    WaitingLength,
    /// Next byte is the function code
    WaitingFunctionCode,
    /// Collecting LENGTH - 1 data bytes
    WaitingData,
    /// A complete frame is held; reset before feeding more bytes
    DataReceived,
}

/// A completed frame, borrowed from the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxFrame<'a> {
    /// Function code byte
    pub function_code: u8,
    /// LENGTH byte as received
    pub declared_len: u8,
    /// Data bytes that fit in the receive buffer
    pub data: &'a [u8],
    /// Data bytes that arrived but did not fit
    pub dropped: usize,
}

impl RxFrame<'_> {
    /// True if some data bytes were dropped for lack of buffer space
    pub fn is_truncated(&self) -> bool {
        self.dropped > 0
    }
}

/// Byte-at-a-time receive state machine
///
/// Bytes are fed one per call together with the current tick. Once the
/// state reaches [`RxState::DataReceived`] the frame is available through
/// [`FrameParser::frame`] until [`FrameParser::reset`] is called.
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: RxState,
    buffer: [u8; RX_FRAME_MAX_LEN],
    header_seen: bool,
    data_len: usize,
    data_received: usize,
    started_at: Tick,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a new frame parser
    pub const fn new() -> Self {
        Self {
            state: RxState::WaitingHeader,
            buffer: [0; RX_FRAME_MAX_LEN],
            header_seen: false,
            data_len: 0,
            data_received: 0,
            started_at: 0,
        }
    }

    /// Discard any partial or completed frame and resume header search
    pub fn reset(&mut self) {
        self.state = RxState::WaitingHeader;
        self.header_seen = false;
        self.data_len = 0;
        self.data_received = 0;
    }

    /// Current state
    pub fn state(&self) -> RxState {
        self.state
    }

    /// True once a whole frame has been assembled
    pub fn is_complete(&self) -> bool {
        self.state == RxState::DataReceived
    }

    /// Tick at which the second header byte was seen
    pub fn started_at(&self) -> Tick {
        self.started_at
    }

    /// Feed a single byte to the parser
    ///
    /// Returns the state after the byte has been consumed. Bytes fed while
    /// a completed frame is held are ignored.
    ///
    /// A frame declaring no data bytes completes without consuming a byte;
    /// call [`FrameParser::complete_empty`] before feeding so the byte that
    /// follows such a frame is not swallowed.
    pub fn feed(&mut self, byte: u8, now: Tick) -> RxState {
        match self.state {
            RxState::WaitingHeader => {
                if byte == HEADER_HIGH {
                    self.buffer[IDX_HEADER_HIGH] = byte;
                    self.header_seen = true;
                } else if byte == HEADER_LOW && self.header_seen {
                    self.buffer[IDX_HEADER_LOW] = byte;
                    self.header_seen = false;
                    self.started_at = now;
                    self.state = RxState::WaitingLength;
                } else {
                    self.header_seen = false;
                }
            }
            RxState::WaitingLength => {
                if byte == 0 {
                    // LENGTH must at least cover the function code
                    self.reset();
                } else {
                    self.buffer[IDX_LEN] = byte;
                    self.state = RxState::WaitingFunctionCode;
                }
            }
            RxState::WaitingFunctionCode => {
                self.buffer[IDX_FUNCTION] = byte;
                self.data_len = usize::from(self.buffer[IDX_LEN]) - 1;
                self.data_received = 0;
                self.state = RxState::WaitingData;
            }
            RxState::WaitingData => {
                if self.data_len == 0 {
                    self.state = RxState::DataReceived;
                    return self.state;
                }
                if self.data_received < RX_DATA_CAPACITY {
                    self.buffer[IDX_DATA + self.data_received] = byte;
                }
                // Overflow bytes are counted so framing stays aligned
                self.data_received += 1;
                if self.data_received == self.data_len {
                    self.state = RxState::DataReceived;
                }
            }
            RxState::DataReceived => {}
        }
        self.state
    }

    /// Complete a frame that declared no data bytes
    ///
    /// Returns true if the parser moved to [`RxState::DataReceived`].
    pub fn complete_empty(&mut self) -> bool {
        if self.state == RxState::WaitingData && self.data_len == 0 {
            self.state = RxState::DataReceived;
            return true;
        }
        false
    }

    /// Feed bytes until a frame completes
    ///
    /// Returns the number of bytes consumed. Remaining bytes after a
    /// complete frame are not consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8], now: Tick) -> usize {
        let mut consumed = 0;
        for &byte in bytes {
            if self.complete_empty() {
                return consumed;
            }
            consumed += 1;
            if self.feed(byte, now) == RxState::DataReceived {
                return consumed;
            }
        }
        self.complete_empty();
        consumed
    }

    /// The completed frame, if any
    pub fn frame(&self) -> Option<RxFrame<'_>> {
        if self.state != RxState::DataReceived {
            return None;
        }
        let stored = self.data_received.min(RX_DATA_CAPACITY);
        Some(RxFrame {
            function_code: self.buffer[IDX_FUNCTION],
            declared_len: self.buffer[IDX_LEN],
            data: &self.buffer[IDX_DATA..IDX_DATA + stored],
            dropped: self.data_received - stored,
        })
    }

    /// Abandon a frame that has been in progress for `timeout` ticks or more
    ///
    /// Returns true if a partial frame was discarded.
    pub fn check_timeout(&mut self, now: Tick, timeout: Tick) -> bool {
        if self.state == RxState::WaitingHeader {
            return false;
        }
        if now.wrapping_sub(self.started_at) >= timeout {
            self.reset();
            return true;
        }
        false
    }
}
