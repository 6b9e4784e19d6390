//! Wizard step definitions
//!
//! Defines every step of the pairing wizard and which transports may show it.

use crate::domain::models::TransportKind;

/// Wizard step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WizardStep {
    // User-navigable steps
    Start,
    ConnectCable,
    UsbFlashingTutorial,
    ManualFlashingTutorial,
    ConnectBattery,
    EnterPairingPattern,
    WirelessConnectTutorial,

    // Driven by the system, not by Next/Back
    ChooseDeviceDialog,
    ConnectingWireless,
    ConnectingBridge,
    FlashingInProgress,

    // Failure branches
    RetryReplug,
    RetryCloseTabs,
    RetrySelectDevice,
    RetryWirelessConnect,
    BadFirmware,
    DeviceUnsupported,
    WebPlatformUnsupported,
}

impl WizardStep {
    /// Get step title
    pub fn title(&self) -> &'static str {
        match self {
            WizardStep::Start => "Connect your device",
            WizardStep::ConnectCable => "Connect the USB cable",
            WizardStep::UsbFlashingTutorial => "Install the firmware",
            WizardStep::ManualFlashingTutorial => "Install the firmware manually",
            WizardStep::ConnectBattery => "Connect the battery pack",
            WizardStep::EnterPairingPattern => "Copy the pattern",
            WizardStep::WirelessConnectTutorial => "Pair over wireless",
            WizardStep::ChooseDeviceDialog => "Select your device",
            WizardStep::ConnectingWireless => "Connecting",
            WizardStep::ConnectingBridge => "Connecting the two devices",
            WizardStep::FlashingInProgress => "Installing firmware",
            WizardStep::RetryReplug => "Unplug and reconnect the device",
            WizardStep::RetryCloseTabs => "Close other windows using the device",
            WizardStep::RetrySelectDevice => "No device was selected",
            WizardStep::RetryWirelessConnect => "Wireless pairing failed",
            WizardStep::BadFirmware => "The device firmware needs updating",
            WizardStep::DeviceUnsupported => "This device is not supported",
            WizardStep::WebPlatformUnsupported => "This host cannot connect to devices",
        }
    }

    /// Steps the user moves through with Next/Back
    pub fn is_user_navigable(&self) -> bool {
        matches!(
            self,
            WizardStep::Start
                | WizardStep::ConnectCable
                | WizardStep::UsbFlashingTutorial
                | WizardStep::ManualFlashingTutorial
                | WizardStep::ConnectBattery
                | WizardStep::EnterPairingPattern
                | WizardStep::WirelessConnectTutorial
        )
    }

    /// Failure steps that offer a TryAgain action
    pub fn is_recoverable_failure(&self) -> bool {
        matches!(
            self,
            WizardStep::RetryReplug
                | WizardStep::RetryCloseTabs
                | WizardStep::RetrySelectDevice
                | WizardStep::RetryWirelessConnect
                | WizardStep::BadFirmware
        )
    }

    /// Whether `transport` can ever show this step
    pub fn allowed_for(&self, transport: TransportKind) -> bool {
        use TransportKind::*;
        match self {
            WizardStep::Start | WizardStep::ConnectBattery | WizardStep::WebPlatformUnsupported => {
                matches!(transport, Wireless | RadioRemote)
            }
            WizardStep::ManualFlashingTutorial
            | WizardStep::EnterPairingPattern
            | WizardStep::WirelessConnectTutorial
            | WizardStep::ConnectingWireless
            | WizardStep::RetryWirelessConnect
            | WizardStep::BadFirmware => transport == Wireless,
            WizardStep::ConnectingBridge => transport == RadioBridge,
            WizardStep::ConnectCable
            | WizardStep::UsbFlashingTutorial
            | WizardStep::ChooseDeviceDialog
            | WizardStep::FlashingInProgress
            | WizardStep::RetryReplug
            | WizardStep::RetryCloseTabs
            | WizardStep::RetrySelectDevice
            | WizardStep::DeviceUnsupported => true,
        }
    }
}

impl Default for WizardStep {
    fn default() -> Self {
        WizardStep::Start
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// A step paired with the transport showing it.
///
/// Only legal combinations can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowStage {
    step: WizardStep,
    transport: TransportKind,
}

impl FlowStage {
    pub fn new(step: WizardStep, transport: TransportKind) -> Option<Self> {
        step.allowed_for(transport)
            .then_some(Self { step, transport })
    }

    /// First stage of a transport's flow. The bridge leg has no Start of its
    /// own, so it begins at the radio flow's Start.
    pub fn start(transport: TransportKind) -> Self {
        let transport = match transport {
            TransportKind::RadioBridge => TransportKind::RadioRemote,
            other => other,
        };
        Self {
            step: WizardStep::Start,
            transport,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Same transport, different step
    pub fn with_step(&self, step: WizardStep) -> Option<Self> {
        Self::new(step, self.transport)
    }
}

impl Default for FlowStage {
    fn default() -> Self {
        Self::start(TransportKind::Wireless)
    }
}

impl std::fmt::Display for FlowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}/{:?}", self.transport, self.step)
    }
}

/// Happy-path order for the wireless flow
pub fn wireless_order(manual_flashing: bool) -> Vec<FlowStage> {
    let flashing = if manual_flashing {
        WizardStep::ManualFlashingTutorial
    } else {
        WizardStep::UsbFlashingTutorial
    };
    [
        WizardStep::Start,
        WizardStep::ConnectCable,
        flashing,
        WizardStep::ConnectBattery,
        WizardStep::EnterPairingPattern,
        WizardStep::WirelessConnectTutorial,
    ]
    .into_iter()
    .map(|step| FlowStage {
        step,
        transport: TransportKind::Wireless,
    })
    .collect()
}

/// Happy-path order for the radio flow: remote device leg, then bridge leg
pub fn radio_order() -> Vec<FlowStage> {
    let remote = [
        WizardStep::Start,
        WizardStep::ConnectCable,
        WizardStep::UsbFlashingTutorial,
        WizardStep::ConnectBattery,
    ]
    .into_iter()
    .map(|step| FlowStage {
        step,
        transport: TransportKind::RadioRemote,
    });
    let bridge = [WizardStep::ConnectCable, WizardStep::UsbFlashingTutorial]
        .into_iter()
        .map(|step| FlowStage {
            step,
            transport: TransportKind::RadioBridge,
        });
    remote.chain(bridge).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_illegal_stages_rejected() {
        assert!(FlowStage::new(WizardStep::Start, TransportKind::RadioBridge).is_none());
        assert!(FlowStage::new(WizardStep::EnterPairingPattern, TransportKind::RadioRemote).is_none());
        assert!(FlowStage::new(WizardStep::ConnectingBridge, TransportKind::Wireless).is_none());
        assert!(FlowStage::new(WizardStep::BadFirmware, TransportKind::RadioBridge).is_none());
        assert!(FlowStage::new(WizardStep::ManualFlashingTutorial, TransportKind::RadioRemote).is_none());
        assert!(FlowStage::new(WizardStep::ConnectingBridge, TransportKind::RadioBridge).is_some());
        assert!(FlowStage::new(WizardStep::RetryReplug, TransportKind::RadioBridge).is_some());
    }

    #[test]
    fn test_orders_only_contain_legal_navigable_stages() {
        for stage in wireless_order(false)
            .into_iter()
            .chain(wireless_order(true))
            .chain(radio_order())
        {
            assert!(stage.step().allowed_for(stage.transport()), "{stage}");
            assert!(stage.step().is_user_navigable(), "{stage}");
        }
    }

    #[test]
    fn test_wireless_order() {
        let usb = wireless_order(false);
        assert_eq!(usb.len(), 6);
        assert_eq!(usb[2].step(), WizardStep::UsbFlashingTutorial);

        let manual = wireless_order(true);
        assert_eq!(manual[2].step(), WizardStep::ManualFlashingTutorial);
        assert_eq!(manual[5].step(), WizardStep::WirelessConnectTutorial);
    }

    #[test]
    fn test_radio_order_chains_legs() {
        let order = radio_order();
        assert_eq!(order.len(), 6);
        assert_eq!(order[0], FlowStage::start(TransportKind::RadioRemote));
        assert_eq!(order[3].step(), WizardStep::ConnectBattery);
        assert_eq!(order[4].transport(), TransportKind::RadioBridge);
        assert_eq!(order[4].step(), WizardStep::ConnectCable);
    }

    #[test]
    fn test_bridge_start_maps_to_radio_start() {
        let start = FlowStage::start(TransportKind::RadioBridge);
        assert_eq!(start.transport(), TransportKind::RadioRemote);
        assert_eq!(start.step(), WizardStep::Start);
    }

    #[test]
    fn test_step_categories() {
        assert!(WizardStep::ConnectCable.is_user_navigable());
        assert!(!WizardStep::FlashingInProgress.is_user_navigable());
        assert!(WizardStep::RetryCloseTabs.is_recoverable_failure());
        assert!(!WizardStep::DeviceUnsupported.is_recoverable_failure());
    }
}
