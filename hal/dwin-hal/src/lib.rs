//! DWIN Hardware Abstraction Layer
//!
//! This crate defines the boundary between the DWIN protocol engine and
//! the serial hardware underneath it. Chip-specific code (an STM32 UART
//! with DMA, an RP2040 PIO UART, a host serial port) implements
//! [`uart::UartTransport`]; the engine in `dwin-core` drives it.
//!
//! # Layers
//!
//! ```text
//!  application ──► dwin-core ──► UartTransport ──► UART + DMA / MockUart
//!                      ▲                               │
//!                      └──────── Port notifications ◄──┘
//! ```
//!
//! All transport operations are fire-and-forget. Their outcomes come back
//! later through the notification entry points on the engine's port
//! (receive progress, transmit complete, error).

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

#[cfg(feature = "mock")]
pub mod mock;
pub mod uart;

#[cfg(feature = "mock")]
pub use mock::MockUart;
pub use uart::{Parity, StopBits, UartBusError, UartConfig, UartTransport};
