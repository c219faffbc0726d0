use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::error::{Error, Result};

/// Shared flag raised by SIGINT while a command is running.
///
/// Long-running work polls [`Interrupt::checkpoint`] and stops with
/// `Error::Interrupted` once the flag is up.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn checkpoint(&self) -> Result<()> {
        if self.is_triggered() {
            return Err(Error::Interrupted);
        }
        Ok(())
    }

    /// Routes the process's Ctrl-C handler to this flag. Can be installed once per process.
    pub fn install_handler(&self) -> Result<()> {
        let flag = self.clone();
        ctrlc::set_handler(move || flag.trigger())
            .map_err(|e| Error::Internal(format!("failed to install Ctrl-C handler: {}", e)))
    }
}
