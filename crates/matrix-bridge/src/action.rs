//! Actions and feedback queries exposed to host adapters
//!
//! Port indices here are 0-based, matching the wire protocol. Adapters that
//! present 1-based numbering to users convert with [`port_from_user`].

use std::fmt;

use matrix_protocol::PORT_COUNT;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::state::RoutingState;

/// Which side of the matrix a port index refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortKind {
    /// Source port
    Input,
    /// Destination port
    Output,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Check a 0-based port index against the matrix size
pub fn check_port(kind: PortKind, index: u8) -> Result<u8, BridgeError> {
    if (index as usize) < PORT_COUNT {
        Ok(index)
    } else {
        Err(BridgeError::PortOutOfRange { kind, index })
    }
}

/// Convert a 1-based user-facing port number to a 0-based index
pub fn port_from_user(kind: PortKind, number: u8) -> Result<u8, BridgeError> {
    match number.checked_sub(1) {
        Some(index) if (index as usize) < PORT_COUNT => Ok(index),
        _ => Err(BridgeError::PortOutOfRange {
            kind,
            index: number,
        }),
    }
}

/// Things a host can ask the bridge to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Arm an input as the source for later switches (local only)
    SelectInput { input: u8 },
    /// Route the selected input to one output
    SwitchOutput { output: u8 },
    /// Route the selected input to every output
    AllOutputsToSelected,
    /// Feed text straight into the response parser (diagnostics)
    InjectTestResponse { text: String },
}

impl Action {
    /// Check port bounds
    pub fn validate(&self) -> Result<(), BridgeError> {
        match self {
            Self::SelectInput { input } => check_port(PortKind::Input, *input).map(|_| ()),
            Self::SwitchOutput { output } => check_port(PortKind::Output, *output).map(|_| ()),
            Self::AllOutputsToSelected | Self::InjectTestResponse { .. } => Ok(()),
        }
    }
}

/// Boolean questions a feedback layer can ask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feedback {
    /// Is this input the selected one?
    InputSelected { input: u8 },
    /// Is this output fed by the selected input?
    OutputFedBySelected { output: u8 },
}

impl Feedback {
    /// Evaluate against a routing table
    pub fn evaluate(&self, routing: &RoutingState) -> bool {
        match self {
            Self::InputSelected { input } => routing.is_input_selected(*input),
            Self::OutputFedBySelected { output } => routing.is_output_fed_by_selected(*output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_from_user() {
        assert_eq!(port_from_user(PortKind::Input, 1).unwrap(), 0);
        assert_eq!(port_from_user(PortKind::Output, 8).unwrap(), 7);
        assert!(matches!(
            port_from_user(PortKind::Output, 0),
            Err(BridgeError::PortOutOfRange {
                kind: PortKind::Output,
                index: 0
            })
        ));
        assert!(port_from_user(PortKind::Input, 9).is_err());
    }

    #[test]
    fn test_action_validation() {
        assert!(Action::SelectInput { input: 7 }.validate().is_ok());
        assert!(Action::SelectInput { input: 8 }.validate().is_err());
        assert!(Action::SwitchOutput { output: 8 }.validate().is_err());
        assert!(Action::AllOutputsToSelected.validate().is_ok());
        assert!(Action::InjectTestResponse {
            text: "99".into()
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn test_feedback_evaluation() {
        let mut routing = RoutingState::new();
        routing.select_input(3);
        assert!(Feedback::InputSelected { input: 3 }.evaluate(&routing));
        assert!(!Feedback::InputSelected { input: 0 }.evaluate(&routing));
        assert!(Feedback::OutputFedBySelected { output: 3 }.evaluate(&routing));
        assert!(!Feedback::OutputFedBySelected { output: 4 }.evaluate(&routing));
        // Outputs beyond the matrix are never fed
        assert!(!Feedback::OutputFedBySelected { output: 12 }.evaluate(&routing));
    }

    #[test]
    fn test_error_message() {
        let err = check_port(PortKind::Input, 8).unwrap_err();
        assert_eq!(err.to_string(), "input 8 is out of range");
    }
}
