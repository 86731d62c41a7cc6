//! Address-keyed notification callbacks
//!
//! Lookup is a linear scan in registration order and stops at the first
//! match, so registering the same address twice leaves the second entry
//! unreachable.

use heapless::Vec;

use dwin_protocol::VpUpdate;

use crate::error::{Error, Result};

/// Number of callback slots
pub const MAX_CALLBACKS: usize = 8;

/// Notification function for a watched VP address
pub type VpCallback = fn(VpUpdate<'_>);

#[derive(Clone, Copy)]
struct Entry {
    address: u16,
    callback: VpCallback,
}

/// Fixed-capacity table of watched addresses
pub struct CallbackRegistry<const CAP: usize = MAX_CALLBACKS> {
    entries: Vec<Entry, CAP>,
}

impl<const CAP: usize> Default for CallbackRegistry<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> core::fmt::Debug for CallbackRegistry<CAP> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.address))
            .finish()
    }
}

impl<const CAP: usize> CallbackRegistry<CAP> {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Watch `address`, taking the first free slot
    pub fn register(&mut self, address: u16, callback: VpCallback) -> Result<()> {
        self.entries
            .push(Entry { address, callback })
            .map_err(|_| Error::CallbackTableFull)
    }

    /// Deliver an update to the first callback watching its address
    ///
    /// Returns true if a callback was invoked.
    pub fn dispatch(&self, update: VpUpdate<'_>) -> bool {
        match self.entries.iter().find(|e| e.address == update.address) {
            Some(entry) => {
                (entry.callback)(update);
                true
            }
            None => false,
        }
    }

    /// True if some callback watches `address`
    pub fn watches(&self, address: u16) -> bool {
        self.entries.iter().any(|e| e.address == address)
    }

    /// Remove every registration
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if every slot is taken
    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }
}
