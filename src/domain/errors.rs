use thiserror::Error;

/// Outcome of a failed connect-and-flash attempt.
///
/// Transport failures are converted into one of these before they reach the
/// wizard; the wizard never sees a raw transport error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlashError {
    /// No firmware exists for this hardware on the requested transport
    #[error("Device hardware is not supported by this transport")]
    MicrobitUnsupported,

    /// The bootloader rejected the write
    #[error("Device rejected the firmware")]
    BadFirmware,

    /// The device chooser was dismissed
    #[error("No device selected")]
    NoDeviceSelected,

    /// Another process already holds the device
    #[error("Unable to claim the USB interface")]
    UnableToClaimInterface,

    #[error("Flashing failed: {0}")]
    Failed(String),
}

impl FlashError {
    /// Whether the wizard can offer a retry for this failure
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FlashError::MicrobitUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(FlashError::NoDeviceSelected.to_string(), "No device selected");
        assert_eq!(
            FlashError::Failed("timeout".to_string()).to_string(),
            "Flashing failed: timeout"
        );
    }

    #[test]
    fn test_only_unsupported_is_fatal() {
        assert!(!FlashError::MicrobitUnsupported.is_recoverable());
        assert!(FlashError::BadFirmware.is_recoverable());
        assert!(FlashError::UnableToClaimInterface.is_recoverable());
        assert!(FlashError::Failed(String::new()).is_recoverable());
    }
}
