//! Request encoding and reply decoding
//!
//! Requests (controller → display):
//! - Write VP: `5A A5 LEN 82 ADDR_H ADDR_L (DATA_H DATA_L)*n`, LEN = 2n + 3
//! - Read VP:  `5A A5 04 83 ADDR_H ADDR_L n`
//!
//! Replies (display → controller):
//! - Write ack:  `5A A5 03 82 4F 4B`
//! - Read reply: `5A A5 LEN 83 ADDR_H ADDR_L n (DATA_H DATA_L)*n`, LEN = 2n + 4

use heapless::Vec;

use crate::events::VpUpdate;
use crate::frame::{
    FrameError, RxFrame, FN_READ_VP, FN_WRITE_VP, FRAME_OVERHEAD, HEADER_HIGH, HEADER_LOW,
    RX_DATA_CAPACITY, TX_FRAME_MAX_LEN, WRITE_ACK_PAYLOAD,
};

/// Encoded outgoing request
pub type TxFrame = Vec<u8, TX_FRAME_MAX_LEN>;

/// Length of a read request frame
pub const READ_REQUEST_LEN: usize = 7;

/// Largest frame the LENGTH byte can describe
pub const MAX_WIRE_FRAME_LEN: usize = 3 + u8::MAX as usize;

/// Complete write acknowledgement frame
pub const WRITE_ACK_FRAME: [u8; 6] = [
    HEADER_HIGH,
    HEADER_LOW,
    0x03,
    FN_WRITE_VP,
    WRITE_ACK_PAYLOAD[0],
    WRITE_ACK_PAYLOAD[1],
];

/// Total frame length of a write request carrying `count` values
pub const fn write_request_len(count: usize) -> usize {
    FRAME_OVERHEAD + 2 + 2 * count
}

/// Largest number of values a single write request can carry
pub const MAX_WRITE_VALUES: usize = (TX_FRAME_MAX_LEN - FRAME_OVERHEAD - 2) / 2;

/// Largest number of values whose read reply fits the receive buffer
///
/// The reply carries address (2) and count (1) ahead of the values.
pub const MAX_READ_VALUES: usize = (RX_DATA_CAPACITY - 3) / 2;

/// Requests sent from the controller to the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request<'a> {
    /// Write consecutive VPs starting at `address`
    WriteVp { address: u16, values: &'a [u16] },
    /// Read `count` consecutive VPs starting at `address`
    ReadVp { address: u16, count: u8 },
}

impl Request<'_> {
    /// Encode this request into a frame
    pub fn to_frame(&self) -> Result<TxFrame, FrameError> {
        match *self {
            Request::WriteVp { address, values } => {
                if values.is_empty() {
                    return Err(FrameError::EmptyPayload);
                }
                let frame_len = write_request_len(values.len());
                if frame_len > TX_FRAME_MAX_LEN {
                    return Err(FrameError::PayloadTooLarge);
                }

                let mut frame = TxFrame::new();
                push_header(&mut frame, (frame_len - 3) as u8, FN_WRITE_VP)?;
                extend(&mut frame, &address.to_be_bytes())?;
                for value in values {
                    extend(&mut frame, &value.to_be_bytes())?;
                }
                Ok(frame)
            }
            Request::ReadVp { address, count } => {
                if count == 0 {
                    return Err(FrameError::EmptyPayload);
                }
                if usize::from(count) > MAX_READ_VALUES {
                    return Err(FrameError::PayloadTooLarge);
                }

                let mut frame = TxFrame::new();
                push_header(&mut frame, (READ_REQUEST_LEN - 3) as u8, FN_READ_VP)?;
                extend(&mut frame, &address.to_be_bytes())?;
                extend(&mut frame, &[count])?;
                Ok(frame)
            }
        }
    }

    /// Number of VP words the request covers
    pub fn count(&self) -> usize {
        match self {
            Request::WriteVp { values, .. } => values.len(),
            Request::ReadVp { count, .. } => usize::from(*count),
        }
    }
}

fn push_header<const N: usize>(frame: &mut Vec<u8, N>, len: u8, function: u8) -> Result<(), FrameError> {
    extend(frame, &[HEADER_HIGH, HEADER_LOW, len, function])
}

fn extend<const N: usize>(frame: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), FrameError> {
    frame
        .extend_from_slice(bytes)
        .map_err(|_| FrameError::PayloadTooLarge)
}

/// Frames sent by the display, classified by content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayFrame<'a> {
    /// Write acknowledged ("OK")
    WriteAck,
    /// VP values, solicited or not
    ReadReply(VpUpdate<'a>),
    /// Any other well-formed frame
    Other { function_code: u8 },
}

impl<'a> DisplayFrame<'a> {
    /// Classify a completed frame
    ///
    /// A read reply must carry at least the address and count bytes. The
    /// payload handed on is sized by the declared count and clipped to the
    /// bytes actually held.
    pub fn from_frame(frame: &RxFrame<'a>) -> Result<Self, FrameError> {
        match frame.function_code {
            FN_READ_VP => {
                let data = frame.data;
                if data.len() < 3 {
                    return Err(FrameError::InvalidFrame);
                }
                let address = u16::from_be_bytes([data[0], data[1]]);
                let count = data[2];
                let end = (3 + usize::from(count) * 2).min(data.len());
                Ok(DisplayFrame::ReadReply(VpUpdate {
                    address,
                    count,
                    payload: &data[3..end],
                }))
            }
            FN_WRITE_VP if frame.data == WRITE_ACK_PAYLOAD => Ok(DisplayFrame::WriteAck),
            function_code => Ok(DisplayFrame::Other { function_code }),
        }
    }
}

/// Encode a read reply as the display would send it (for testing or simulation)
pub fn encode_read_reply(
    address: u16,
    values: &[u16],
) -> Result<Vec<u8, MAX_WIRE_FRAME_LEN>, FrameError> {
    let len = 4 + 2 * values.len();
    if values.len() > usize::from(u8::MAX) || len > usize::from(u8::MAX) {
        return Err(FrameError::PayloadTooLarge);
    }

    let mut frame = Vec::new();
    push_header(&mut frame, len as u8, FN_READ_VP)?;
    extend(&mut frame, &address.to_be_bytes())?;
    extend(&mut frame, &[values.len() as u8])?;
    for value in values {
        extend(&mut frame, &value.to_be_bytes())?;
    }
    Ok(frame)
}
