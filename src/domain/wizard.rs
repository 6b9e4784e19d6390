//! Pairing wizard state and navigation
//!
//! `WizardFlow` is the only place the wizard stage changes. It is pure: device
//! I/O happens in the connection service, which reports outcomes back here.

use crate::domain::errors::FlashError;
use crate::domain::models::{
    AppConnectionStatus, ConnectionState, HostCapabilities, TransportKind,
};
use crate::domain::pairing;
use crate::domain::steps::{radio_order, wireless_order, FlowStage, WizardStep};
use tracing::{debug, warn};

/// Wizard state
#[derive(Debug, Clone, PartialEq)]
pub struct WizardState {
    stage: FlowStage,
    open: bool,
    web_usb_supported: bool,
    web_wireless_supported: bool,
    /// User fell back to drag-and-drop flashing after a rejected write
    manual_flashing: bool,
    wireless_device_id: Option<u32>,
    wireless_device_name: Option<String>,
    radio_remote_device_id: Option<u32>,
    radio_bridge_device_id: Option<u32>,
    has_failed_reconnect_twice: bool,
}

impl WizardState {
    pub fn new(capabilities: HostCapabilities) -> Self {
        let transport = if capabilities.wireless || !capabilities.usb {
            TransportKind::Wireless
        } else {
            TransportKind::RadioRemote
        };
        Self {
            stage: FlowStage::start(transport),
            open: false,
            web_usb_supported: capabilities.usb,
            web_wireless_supported: capabilities.wireless,
            manual_flashing: false,
            wireless_device_id: None,
            wireless_device_name: None,
            radio_remote_device_id: None,
            radio_bridge_device_id: None,
            has_failed_reconnect_twice: false,
        }
    }

    pub fn stage(&self) -> FlowStage {
        self.stage
    }

    pub fn step(&self) -> WizardStep {
        self.stage.step()
    }

    pub fn transport(&self) -> TransportKind {
        self.stage.transport()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn web_usb_supported(&self) -> bool {
        self.web_usb_supported
    }

    pub fn web_wireless_supported(&self) -> bool {
        self.web_wireless_supported
    }

    pub fn wireless_device_id(&self) -> Option<u32> {
        self.wireless_device_id
    }

    pub fn wireless_device_name(&self) -> Option<&str> {
        self.wireless_device_name.as_deref()
    }

    pub fn radio_remote_device_id(&self) -> Option<u32> {
        self.radio_remote_device_id
    }

    pub fn radio_bridge_device_id(&self) -> Option<u32> {
        self.radio_bridge_device_id
    }

    pub fn has_failed_reconnect_twice(&self) -> bool {
        self.has_failed_reconnect_twice
    }

    fn capabilities(&self) -> HostCapabilities {
        HostCapabilities {
            usb: self.web_usb_supported,
            wireless: self.web_wireless_supported,
        }
    }
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new(HostCapabilities::default())
    }
}

/// Navigation result
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationResult {
    /// Navigation succeeded, now on new stage
    Moved(FlowStage),

    /// Navigation blocked (at boundary or not a navigable stage)
    Blocked { reason: String },
}

/// What the service should do after a successful flash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashSuccess {
    /// Wait for the user to power the device from the battery pack
    AwaitBattery,
    /// Bridge is flashed; connect the two devices right away
    ConnectBridge,
}

/// Where a failed flash leaves the wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashFailure {
    pub stage: FlowStage,
    /// Offer the universal firmware image for manual flashing
    pub download_universal_firmware: bool,
}

/// Wizard flow manager
#[derive(Debug, Clone, Default)]
pub struct WizardFlow {
    state: WizardState,
}

impl WizardFlow {
    pub fn new(capabilities: HostCapabilities) -> Self {
        Self {
            state: WizardState::new(capabilities),
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn stage(&self) -> FlowStage {
        self.state.stage
    }

    /// Happy-path order for the current transport
    pub fn order(&self) -> Vec<FlowStage> {
        if self.state.transport() == TransportKind::Wireless {
            wireless_order(!self.state.web_usb_supported || self.state.manual_flashing)
        } else {
            radio_order()
        }
    }

    /// Open the wizard at the start of a flow the host can run
    pub fn open(&mut self) -> FlowStage {
        self.state.open = true;
        let caps = self.state.capabilities();
        let transport = match self.state.transport() {
            TransportKind::Wireless if !caps.wireless => TransportKind::RadioRemote,
            TransportKind::RadioRemote | TransportKind::RadioBridge if !caps.usb => {
                TransportKind::Wireless
            }
            other => other,
        };
        let start = FlowStage::start(transport);
        self.state.stage = if !caps.usb && !caps.wireless {
            start
                .with_step(WizardStep::WebPlatformUnsupported)
                .unwrap_or(start)
        } else {
            start
        };
        self.state.stage
    }

    /// Hide the wizard and rewind it. Paired device identities are kept so a
    /// later reconnect can reach the same devices.
    pub fn close(&mut self) {
        self.state.open = false;
        self.state.manual_flashing = false;
        self.state.stage = FlowStage::start(self.state.transport());
    }

    /// Discard the whole session, keeping only what the host supports
    pub fn reset(&mut self) {
        self.state = WizardState::new(self.state.capabilities());
    }

    /// Navigate to next stage
    pub fn next(&mut self) -> NavigationResult {
        self.step_by(1)
    }

    /// Navigate to previous stage
    pub fn back(&mut self) -> NavigationResult {
        self.step_by(-1)
    }

    fn step_by(&mut self, delta: isize) -> NavigationResult {
        let order = self.order();
        let Some(index) = order.iter().position(|s| *s == self.state.stage) else {
            return NavigationResult::Blocked {
                reason: format!("{} is not a navigable stage", self.state.stage),
            };
        };
        let target = index as isize + delta;
        if target < 0 || target >= order.len() as isize {
            return NavigationResult::Blocked {
                reason: if delta < 0 {
                    "Already at first step".to_string()
                } else {
                    "Already at last step".to_string()
                },
            };
        }
        self.state.stage = order[target as usize];
        debug!("Wizard moved to {}", self.state.stage);
        NavigationResult::Moved(self.state.stage)
    }

    /// Toggle between the wireless and radio flows. Progress is not kept.
    pub fn switch_transport(&mut self) -> FlowStage {
        let transport = match self.state.transport() {
            TransportKind::Wireless => TransportKind::RadioRemote,
            TransportKind::RadioRemote | TransportKind::RadioBridge => TransportKind::Wireless,
        };
        self.state.manual_flashing = false;
        self.state.stage = FlowStage::start(transport);
        self.state.stage
    }

    /// Roll back to the last step able to produce what the failure was missing
    pub fn try_again(&mut self) -> NavigationResult {
        let step = self.state.step();
        if !step.is_recoverable_failure() {
            return NavigationResult::Blocked {
                reason: format!("Nothing to retry from {}", self.state.stage),
            };
        }
        let target = match step {
            WizardStep::RetryWirelessConnect => WizardStep::EnterPairingPattern,
            _ => WizardStep::ConnectCable,
        };
        match self.state.stage.with_step(target) {
            Some(stage) => {
                self.state.stage = stage;
                NavigationResult::Moved(stage)
            }
            None => NavigationResult::Blocked {
                reason: format!("{:?} has no {:?} step", self.state.transport(), target),
            },
        }
    }

    /// Name typed in or decoded from the pairing pattern
    pub fn set_device_name(&mut self, name: &str) {
        self.state.wireless_device_name = Some(name.to_string());
    }

    pub fn choose_device(&mut self) -> FlowStage {
        self.go_to(WizardStep::ChooseDeviceDialog)
    }

    pub fn flashing_started(&mut self) -> FlowStage {
        self.go_to(WizardStep::FlashingInProgress)
    }

    pub fn connecting_wireless(&mut self) -> FlowStage {
        self.go_to(WizardStep::ConnectingWireless)
    }

    /// Enter the bridge connection stage from either radio leg
    pub fn connecting_bridge(&mut self) -> FlowStage {
        if let Some(stage) = FlowStage::new(WizardStep::ConnectingBridge, TransportKind::RadioBridge)
        {
            self.state.stage = stage;
        }
        self.state.stage
    }

    /// The wireless device refused the link because its firmware is too old
    pub fn wireless_firmware_rejected(&mut self) -> FlowStage {
        self.go_to(WizardStep::BadFirmware)
    }

    pub fn flash_succeeded(&mut self, device_id: u32) -> FlashSuccess {
        match self.state.transport() {
            TransportKind::Wireless => {
                self.state.wireless_device_id = Some(device_id);
                self.state.wireless_device_name = Some(pairing::name_from_device_id(device_id));
                self.go_to(WizardStep::ConnectBattery);
                FlashSuccess::AwaitBattery
            }
            TransportKind::RadioRemote => {
                self.state.radio_remote_device_id = Some(device_id);
                self.go_to(WizardStep::ConnectBattery);
                FlashSuccess::AwaitBattery
            }
            TransportKind::RadioBridge => {
                self.state.radio_bridge_device_id = Some(device_id);
                self.go_to(WizardStep::ConnectingBridge);
                FlashSuccess::ConnectBridge
            }
        }
    }

    pub fn flash_failed(&mut self, error: &FlashError) -> FlashFailure {
        let wireless = self.state.transport() == TransportKind::Wireless;
        let step = match error {
            FlashError::MicrobitUnsupported => WizardStep::DeviceUnsupported,
            // radio depends on working USB, so there is no manual fallback
            FlashError::BadFirmware if wireless => WizardStep::ManualFlashingTutorial,
            FlashError::BadFirmware => WizardStep::RetryReplug,
            FlashError::NoDeviceSelected => WizardStep::RetrySelectDevice,
            FlashError::UnableToClaimInterface => WizardStep::RetryCloseTabs,
            FlashError::Failed(_) => WizardStep::RetryReplug,
        };
        let download_universal_firmware = step == WizardStep::ManualFlashingTutorial;
        if download_universal_firmware {
            self.state.manual_flashing = true;
        }
        FlashFailure {
            stage: self.go_to(step),
            download_universal_firmware,
        }
    }

    /// React to a new application connection status.
    ///
    /// Returns the new stage when the wizard moved.
    pub fn status_changed(&mut self, state: ConnectionState) -> Option<FlowStage> {
        let before = (self.state.stage, self.state.open);
        match state.status {
            AppConnectionStatus::Connected => {
                self.state.has_failed_reconnect_twice = false;
                self.close();
            }
            AppConnectionStatus::FailedToConnect | AppConnectionStatus::FailedToSelectDevice => {
                self.state.open = true;
                if self.state.transport() == TransportKind::Wireless {
                    self.go_to(WizardStep::RetryWirelessConnect);
                } else {
                    self.go_to(WizardStep::RetryReplug);
                }
            }
            AppConnectionStatus::FailedToReconnectTwice => {
                self.state.has_failed_reconnect_twice = true;
                self.state.open = true;
                self.state.manual_flashing = false;
                self.state.stage = FlowStage::start(self.state.transport());
            }
            _ => {}
        }
        ((self.state.stage, self.state.open) != before).then_some(self.state.stage)
    }

    fn go_to(&mut self, step: WizardStep) -> FlowStage {
        match self.state.stage.with_step(step) {
            Some(stage) => self.state.stage = stage,
            None => warn!(
                "Ignoring {:?}: not reachable from {}",
                step, self.state.stage
            ),
        }
        self.state.stage
    }
}
