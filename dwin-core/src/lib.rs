//! Poll-driven link engine for DWIN DGUS displays
//!
//! This crate holds everything between the UART driver and application
//! code:
//!
//! - Receive ring shared with the interrupt side ([`Port`])
//! - Request/acknowledgement state machine
//! - Address-keyed callbacks for incoming VP values
//! - Timeouts and transport error recovery
//!
//! ```text
//!  UART ISR ──► Port (ring + signals) ──► Dwin::tick ──► FrameParser
//!                                             │               │
//!  UartTransport ◄── write_vp / read_vp ◄─────┤         DisplayFrame
//!                                             ▼               │
//!                                        Transaction ◄────────┤
//!                                                             ▼
//!                                                     CallbackRegistry
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod callbacks;
pub mod config;
pub mod engine;
pub mod error;
pub mod ring;
pub mod stats;
pub mod transaction;

pub use callbacks::{CallbackRegistry, VpCallback, MAX_CALLBACKS};
pub use config::{LinkConfig, DEFAULT_RING_CAPACITY};
pub use engine::{Dwin, LinkStatus};
pub use error::{Error, Result};
pub use ring::{Port, RxRing};
pub use stats::LinkStats;
pub use transaction::{Transaction, TxEvent, TxState};

pub use dwin_protocol::{RxState, Tick, VpUpdate};
