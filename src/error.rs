//! Error types for EM5820 printer operations.
//!
//! This module defines all possible errors that can occur while decoding an
//! image, talking to the printer over USB, or framing a print job.

use thiserror::Error;

/// Main error type for printer operations.
///
/// Every transport failure aborts the current job. Nothing in this crate
/// retries on its own; a caller wanting another attempt starts the whole
/// job again from a fresh session.
#[derive(Error, Debug)]
pub enum Error {
    /// USB communication error.
    ///
    /// Wraps underlying rusb errors for device communication issues,
    /// timeouts, or permission problems.
    #[error(transparent)]
    Usb(#[from] rusb::Error),

    #[error("Can't read device list, permission issue ?")]
    DeviceListNotReadable,

    /// No device with the configured vendor/product identifier is attached.
    #[error("Device {vendor_id:04x}:{product_id:04x} not found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// Opening the session failed part way.
    ///
    /// `stage` names the step that failed: opening the handle, detaching the
    /// kernel driver or claiming the interface. Anything acquired before the
    /// failing step has already been released when this is returned.
    #[error("Failed to {stage}: {source}")]
    DeviceOpen {
        stage: &'static str,
        #[source]
        source: rusb::Error,
    },

    /// Invalid configuration parameter provided.
    ///
    /// Raised when a value read from the environment cannot be parsed.
    #[error("Invalid configuration parameter: {0}")]
    InvalidConfig(String),

    /// The device accepted fewer bytes than were sent.
    ///
    /// The device state is unknown after this, so the write is never resumed.
    #[error("Short transfer: {transferred} of {requested} bytes accepted")]
    ShortTransfer { requested: usize, transferred: usize },

    /// The image decoder rejected the input.
    #[error("Failed to load image: {0}")]
    Decode(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid bitmap: {0}")]
    InvalidBitmap(String),
}

impl Error {
    pub(crate) fn open(stage: &'static str) -> impl FnOnce(rusb::Error) -> Self {
        move |source| Error::DeviceOpen { stage, source }
    }
}
