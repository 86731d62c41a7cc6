//! DWIN DGUS Serial Protocol
//!
//! This crate defines the UART frame format spoken by DWIN DGUS HMI
//! displays for exchanging VP (variable pointer) values: 16-bit words in
//! the display's own memory that back its widgets.
//!
//! # Protocol Overview
//!
//! All messages use a simple binary frame format:
//! ```text
//! ┌─────────┬────────┬──────────┬──────────────────┐
//! │ HEADER  │ LENGTH │ FUNCTION │ DATA             │
//! │ 5A A5   │ 1B     │ 1B       │ LENGTH - 1 bytes │
//! └─────────┴────────┴──────────┴──────────────────┘
//! ```
//!
//! The controller writes VPs (0x82) and reads them back (0x83). The
//! display acknowledges writes with "OK" and answers reads with the
//! requested words; it also sends unsolicited 0x83 frames when a watched
//! VP changes on screen.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

pub mod events;
pub mod frame;
pub mod messages;

pub use events::VpUpdate;
pub use frame::{
    FrameError, FrameParser, RxFrame, RxState, FN_READ_VP, FN_WRITE_VP, HEADER_HIGH, HEADER_LOW,
    RX_FRAME_MAX_LEN, TX_FRAME_MAX_LEN,
};
pub use messages::{
    DisplayFrame, Request, TxFrame, MAX_READ_VALUES, MAX_WRITE_VALUES, WRITE_ACK_FRAME,
};

/// Monotonic time value supplied by the host loop
///
/// Only differences between ticks matter; arithmetic wraps.
pub type Tick = u32;
