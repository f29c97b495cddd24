//! # Interrupt Module
//!
//! The external interrupt signal which ends an unbounded recording or a flow visualisation.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A flag raised when the process is interrupted. Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Interrupt {
    /// Create a flag that is only raised through [`Interrupt::raise`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a flag raised by Ctrl-C.
    ///
    /// Only one handler can be installed per process, if installing fails the flag still works
    /// but is never raised by a signal.
    pub fn install() -> Self {
        let interrupt = Self::new();
        let handle = interrupt.clone();

        if let Err(e) = ctrlc::set_handler(move || {
            info!("Interrupt received, stopping");
            handle.raise();
        }) {
            error!("Failed to set interrupt handler: {}", e);
        }

        interrupt
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------
