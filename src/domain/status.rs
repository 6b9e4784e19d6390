//! Device Status Classifier
//!
//! Turns noisy driver status transitions into the application-level
//! [`AppConnectionStatus`]. The classifier is a pure transition
//! `(HandshakeState, StatusInput) -> (HandshakeState, Option<ConnectionState>)`;
//! the caller owns the handshake state between calls.

use crate::domain::models::{
    AppConnectionStatus, ConnectionState, DeviceKind, RawDeviceStatus, TransportKind,
};

/// Retry bookkeeping carried across successive status events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandshakeState {
    /// One reconnect already failed; the next failure gives up
    pub has_attempted_reconnect: bool,
    /// No connection has succeeded since the flow (re)started
    pub on_first_connect_attempt: bool,
}

/// A single raw status event plus the context needed to classify it
#[derive(Debug, Clone, Copy)]
pub struct StatusInput {
    /// Transport of the current connection flow
    pub transport: TransportKind,
    pub current: AppConnectionStatus,
    pub raw: RawDeviceStatus,
    /// Previous raw status from the same device, if any
    pub prev_raw: Option<RawDeviceStatus>,
    pub device: DeviceKind,
}

/// Classify a raw status event.
///
/// Returns the updated handshake state and the new connection state, or
/// `None` when the event does not change what the application should see.
pub fn next_status(
    input: &StatusInput,
    handshake: HandshakeState,
) -> (HandshakeState, Option<ConnectionState>) {
    let mut state = handshake;
    use AppConnectionStatus as App;
    use RawDeviceStatus as Raw;

    // Explicit disconnects stay put until the user reconnects
    if input.current == App::Disconnected {
        return (state, None);
    }

    if input.device == DeviceKind::UsbBridge {
        return classify_bridge_proxy(input, state);
    }

    let transport = match input.device {
        DeviceKind::Wireless => TransportKind::Wireless,
        _ => TransportKind::RadioRemote,
    };
    let emit = |status: App| Some(ConnectionState::new(status, transport));

    let has_started_over = input.current.is_fresh_start();
    if has_started_over {
        state.has_attempted_reconnect = false;
        state.on_first_connect_attempt = true;
    }

    if input.raw == Raw::Connected {
        state.has_attempted_reconnect = false;
        state.on_first_connect_attempt = false;
        return (state, emit(App::Connected));
    }

    if input.raw == Raw::Disconnected && state.on_first_connect_attempt {
        return (state, emit(App::FailedToConnect));
    }

    if input.device == DeviceKind::Wireless
        && input.raw == Raw::NoAuthorizedDevice
        && input.prev_raw == Some(Raw::NoAuthorizedDevice)
    {
        return (state, emit(App::FailedToSelectDevice));
    }

    if input.raw == Raw::Disconnected {
        if state.has_attempted_reconnect {
            state.has_attempted_reconnect = false;
            return (state, emit(App::FailedToReconnectTwice));
        }
        state.has_attempted_reconnect = true;
        if input.current == App::ReconnectingAutomatically {
            return (state, emit(App::ConnectionLost));
        }
        return (state, emit(App::FailedToReconnect));
    }

    if input.raw == Raw::Connecting && has_started_over {
        return (state, emit(App::Connecting));
    }

    if input.raw == Raw::Reconnecting && !state.on_first_connect_attempt {
        return (state, emit(App::ReconnectingAutomatically));
    }

    (state, None)
}

/// The USB relay's status is a proxy for the remote device it forwards for.
fn classify_bridge_proxy(
    input: &StatusInput,
    mut state: HandshakeState,
) -> (HandshakeState, Option<ConnectionState>) {
    // Relay is only relevant to the radio flow. During the first attempt the
    // relay goes through its own handshake and may drop briefly.
    if input.transport == TransportKind::Wireless
        || input.raw != RawDeviceStatus::Disconnected
        || input.current.is_fresh_start()
        || state.on_first_connect_attempt
    {
        return (state, None);
    }

    if state.has_attempted_reconnect {
        state.has_attempted_reconnect = false;
        return (
            state,
            Some(ConnectionState::new(
                AppConnectionStatus::FailedToReconnectTwice,
                TransportKind::RadioRemote,
            )),
        );
    }

    state.has_attempted_reconnect = true;
    let status = if input.current == AppConnectionStatus::Connected {
        AppConnectionStatus::ConnectionLost
    } else {
        AppConnectionStatus::FailedToReconnect
    };
    (
        state,
        Some(ConnectionState::new(status, TransportKind::RadioBridge)),
    )
}
