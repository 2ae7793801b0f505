//! Unified event stream for the bridge
//!
//! Everything observable about the bridge (connection status, traffic,
//! routing changes, protocol complaints) is broadcast as a [`BridgeEvent`].
//! A feedback layer re-evaluates its queries whenever
//! [`BridgeEvent::affects_feedback`] is true.

use crate::endpoint::DeviceEndpoint;
use crate::state::ConnectionStatus;

/// Unified event enum for all bridge activity
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    // -------------------------------------------------------------------------
    // Lifecycle events
    // -------------------------------------------------------------------------
    /// The bridge was started or reconfigured
    Configured {
        /// Endpoint now in use
        endpoint: DeviceEndpoint,
    },

    /// The bridge was stopped; no connection or poll task remains
    Stopped,

    /// The transport reported a status change
    ConnectionStatusChanged {
        /// New status
        status: ConnectionStatus,
        /// Optional detail (error text, peer address)
        message: Option<String>,
    },

    // -------------------------------------------------------------------------
    // Traffic events
    // -------------------------------------------------------------------------
    /// Data received from the matrix
    DataIn {
        /// Raw data bytes
        data: Vec<u8>,
    },

    /// Data written to the matrix
    DataOut {
        /// Raw data bytes
        data: Vec<u8>,
    },

    // -------------------------------------------------------------------------
    // State events
    // -------------------------------------------------------------------------
    /// An output's source changed
    RouteChanged {
        /// New source input
        input: u8,
        /// Output that changed
        output: u8,
    },

    /// The locally selected input changed
    SelectedInputChanged {
        /// Newly selected input
        input: u8,
    },

    /// A response token was rejected by the parser
    MalformedResponse {
        /// Parser's description of the problem
        message: String,
    },

    /// An error occurred
    Error {
        /// Source of the error
        source: String,
        /// Error message
        message: String,
    },
}

impl BridgeEvent {
    /// Check if this is a traffic event
    pub fn is_traffic(&self) -> bool {
        matches!(self, BridgeEvent::DataIn { .. } | BridgeEvent::DataOut { .. })
    }

    /// Check if feedback queries may now answer differently
    pub fn affects_feedback(&self) -> bool {
        matches!(
            self,
            BridgeEvent::RouteChanged { .. } | BridgeEvent::SelectedInputChanged { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_classification() {
        let data_in = BridgeEvent::DataIn {
            data: b"s00".to_vec(),
        };
        assert!(data_in.is_traffic());
        assert!(!data_in.affects_feedback());

        let route = BridgeEvent::RouteChanged {
            input: 1,
            output: 2,
        };
        assert!(!route.is_traffic());
        assert!(route.affects_feedback());

        assert!(BridgeEvent::SelectedInputChanged { input: 4 }.affects_feedback());
    }
}
