//! Firmware Resources
//!
//! Static table of firmware images keyed by hardware version and transport,
//! plus asynchronous loading of the image files.
//!
//! ```text
//!                  Wireless            RadioRemote          RadioBridge
//! V1               wireless-v1.hex     -                    -
//! V2               wireless-v2.hex     radio-remote-v2.hex  radio-bridge-v2.hex
//! universal        universal.hex       -                    -
//! ```
//!
//! Version 1 hardware cannot run the radio firmware at all.

use crate::domain::models::{BoardVersion, TransportKind};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Hardware version column of the firmware table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FirmwareVersion {
    Board(BoardVersion),
    /// Image that runs on every board version; offered for manual flashing
    Universal,
}

/// A firmware image file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareResource {
    pub version: FirmwareVersion,
    pub transport: TransportKind,
    pub file_name: &'static str,
}

const FIRMWARE_TABLE: &[FirmwareResource] = &[
    FirmwareResource {
        version: FirmwareVersion::Board(BoardVersion::V1),
        transport: TransportKind::Wireless,
        file_name: "wireless-v1.hex",
    },
    FirmwareResource {
        version: FirmwareVersion::Board(BoardVersion::V2),
        transport: TransportKind::Wireless,
        file_name: "wireless-v2.hex",
    },
    FirmwareResource {
        version: FirmwareVersion::Universal,
        transport: TransportKind::Wireless,
        file_name: "universal.hex",
    },
    FirmwareResource {
        version: FirmwareVersion::Board(BoardVersion::V2),
        transport: TransportKind::RadioRemote,
        file_name: "radio-remote-v2.hex",
    },
    FirmwareResource {
        version: FirmwareVersion::Board(BoardVersion::V2),
        transport: TransportKind::RadioBridge,
        file_name: "radio-bridge-v2.hex",
    },
];

/// Look up the image for a hardware version and transport
pub fn firmware_for(version: FirmwareVersion, transport: TransportKind) -> Option<FirmwareResource> {
    FIRMWARE_TABLE
        .iter()
        .find(|r| r.version == version && r.transport == transport)
        .copied()
}

/// Image offered when the user has to flash by hand
pub fn universal_firmware() -> FirmwareResource {
    FirmwareResource {
        version: FirmwareVersion::Universal,
        transport: TransportKind::Wireless,
        file_name: "universal.hex",
    }
}

/// Reads firmware images from a directory
#[derive(Debug, Clone)]
pub struct FirmwareStore {
    dir: PathBuf,
}

impl FirmwareStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, resource: &FirmwareResource) -> PathBuf {
        self.dir.join(resource.file_name)
    }

    pub async fn load(&self, resource: &FirmwareResource) -> Result<Vec<u8>> {
        let path = self.path_of(resource);
        let image = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read firmware image {}", path.display()))?;
        if image.is_empty() {
            anyhow::bail!("Firmware image {} is empty", path.display());
        }
        debug!("Loaded {} ({} bytes)", resource.file_name, image.len());
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_wireless_images_for_both_versions() {
        let v1 = firmware_for(FirmwareVersion::Board(BoardVersion::V1), TransportKind::Wireless);
        let v2 = firmware_for(FirmwareVersion::Board(BoardVersion::V2), TransportKind::Wireless);
        assert_eq!(v1.map(|r| r.file_name), Some("wireless-v1.hex"));
        assert_eq!(v2.map(|r| r.file_name), Some("wireless-v2.hex"));
    }

    #[test]
    fn test_radio_needs_v2() {
        for transport in [TransportKind::RadioRemote, TransportKind::RadioBridge] {
            assert!(firmware_for(FirmwareVersion::Board(BoardVersion::V1), transport).is_none());
            assert!(firmware_for(FirmwareVersion::Board(BoardVersion::V2), transport).is_some());
            assert!(firmware_for(FirmwareVersion::Universal, transport).is_none());
        }
    }

    #[test]
    fn test_universal_is_in_table() {
        assert_eq!(
            firmware_for(FirmwareVersion::Universal, TransportKind::Wireless),
            Some(universal_firmware())
        );
    }

    #[tokio::test]
    async fn test_store_loads_image() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("wireless-v2.hex"), b":00000001FF").unwrap();
        let store = FirmwareStore::new(dir.path());

        let resource =
            firmware_for(FirmwareVersion::Board(BoardVersion::V2), TransportKind::Wireless).unwrap();
        assert_eq!(store.load(&resource).await.unwrap(), b":00000001FF".to_vec());
    }

    #[tokio::test]
    async fn test_store_reports_missing_and_empty_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("universal.hex"), b"").unwrap();
        let store = FirmwareStore::new(dir.path());

        let missing =
            firmware_for(FirmwareVersion::Board(BoardVersion::V1), TransportKind::Wireless).unwrap();
        assert!(store.load(&missing).await.is_err());
        assert!(store.load(&universal_firmware()).await.is_err());
    }
}
