//! Bridge engine
//!
//! The synchronous core of the bridge: it owns the routing table, turns
//! actions into wire commands and folds matrix responses back into the
//! table. It does no I/O. The actor feeds it bytes and ships the commands
//! it returns.

use matrix_protocol::{parse_response, MatrixCommand};
use tracing::{debug, warn};

use crate::action::{Action, Feedback};
use crate::events::BridgeEvent;
use crate::state::{ApplyOutcome, RoutingState};

/// The bridge engine
#[derive(Debug, Default)]
pub struct MatrixBridge {
    routing: RoutingState,
    event_buffer: Vec<BridgeEvent>,
}

impl MatrixBridge {
    /// Create an engine with the initial identity routing
    pub fn new() -> Self {
        Self::default()
    }

    /// Current routing table
    pub fn routing(&self) -> &RoutingState {
        &self.routing
    }

    /// Arm an input; sends nothing to the matrix
    pub fn select_input(&mut self, input: u8) {
        if self.routing.select_input(input) {
            debug!("Selected input {}", input);
            self.event_buffer
                .push(BridgeEvent::SelectedInputChanged { input });
        }
    }

    /// Command routing the selected input to `output`
    ///
    /// The routing table is not touched; it changes when the matrix echoes
    /// the route or the next poll reports it.
    pub fn switch_output(&self, output: u8) -> MatrixCommand {
        MatrixCommand::Route {
            input: self.routing.selected_input(),
            output,
        }
    }

    /// Commands routing the selected input to every output, ascending
    pub fn all_outputs_to_selected(&self) -> Vec<MatrixCommand> {
        MatrixCommand::route_all(self.routing.selected_input()).collect()
    }

    /// The command sent on every poll tick
    pub fn status_request(&self) -> MatrixCommand {
        MatrixCommand::StatusRequest
    }

    /// Apply an action, returning the commands to send in order
    pub fn handle_action(&mut self, action: &Action) -> Vec<MatrixCommand> {
        match action {
            Action::SelectInput { input } => {
                self.select_input(*input);
                Vec::new()
            }
            Action::SwitchOutput { output } => vec![self.switch_output(*output)],
            Action::AllOutputsToSelected => self.all_outputs_to_selected(),
            Action::InjectTestResponse { text } => {
                self.process_response(text.as_bytes());
                Vec::new()
            }
        }
    }

    /// Answer a feedback query
    pub fn query(&self, feedback: Feedback) -> bool {
        feedback.evaluate(&self.routing)
    }

    /// Whether `input` is the selected input
    pub fn is_input_selected(&self, input: u8) -> bool {
        self.routing.is_input_selected(input)
    }

    /// Whether `output` is fed by the selected input
    pub fn is_output_fed_by_selected(&self, output: u8) -> bool {
        self.routing.is_output_fed_by_selected(output)
    }

    /// Parse one chunk of matrix output and apply it left to right
    ///
    /// Returns the number of records applied to the table, changed or not.
    /// Malformed tokens are logged, reported as events and skipped; records
    /// naming an output the matrix lacks are logged and skipped.
    pub fn process_response(&mut self, data: &[u8]) -> usize {
        let mut applied = 0;

        for result in parse_response(data) {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Matrix response rejected: {}", e);
                    self.event_buffer.push(BridgeEvent::MalformedResponse {
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            match self.routing.apply_mapping(record) {
                ApplyOutcome::Changed { previous } => {
                    debug!(
                        "Output {} now fed by input {} (was {})",
                        record.output, record.input, previous
                    );
                    self.event_buffer.push(BridgeEvent::RouteChanged {
                        input: record.input,
                        output: record.output,
                    });
                    applied += 1;
                }
                ApplyOutcome::Unchanged => applied += 1,
                ApplyOutcome::OutputOutOfRange => {
                    warn!(
                        "Matrix reported output {} which this matrix does not have",
                        record.output
                    );
                }
            }
        }

        applied
    }

    /// Drain buffered events
    pub fn drain_events(&mut self) -> Vec<BridgeEvent> {
        std::mem::take(&mut self.event_buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matrix_protocol::EncodeCommand;

    fn encoded(cmds: &[MatrixCommand]) -> Vec<String> {
        cmds.iter()
            .map(|c| String::from_utf8(c.encode()).unwrap())
            .collect()
    }

    #[test]
    fn test_select_then_switch() {
        let mut bridge = MatrixBridge::new();
        let cmds = bridge.handle_action(&Action::SelectInput { input: 3 });
        assert!(cmds.is_empty());

        let cmds = bridge.handle_action(&Action::SwitchOutput { output: 5 });
        assert_eq!(encoded(&cmds), vec!["cir 35"]);

        // Switching does not touch the table until the matrix answers
        assert_eq!(bridge.routing().input_for_output(5), Some(5));
    }

    #[test]
    fn test_all_outputs_to_selected() {
        let mut bridge = MatrixBridge::new();
        bridge.select_input(2);
        let cmds = bridge.handle_action(&Action::AllOutputsToSelected);
        assert_eq!(
            encoded(&cmds),
            vec!["cir 20", "cir 21", "cir 22", "cir 23", "cir 24", "cir 25", "cir 26", "cir 27"]
        );
    }

    #[test]
    fn test_status_request() {
        let bridge = MatrixBridge::new();
        assert_eq!(bridge.status_request().encode(), b"bc ");
    }

    #[test]
    fn test_process_response_in_order() {
        let mut bridge = MatrixBridge::new();
        assert_eq!(bridge.process_response(b"12s34s"), 2);
        assert_eq!(bridge.routing().input_for_output(2), Some(1));
        assert_eq!(bridge.routing().input_for_output(4), Some(3));

        // Later tokens overwrite earlier ones
        bridge.process_response(b"s50s60s");
        assert_eq!(bridge.routing().input_for_output(0), Some(6));
    }

    #[test]
    fn test_empty_response_changes_nothing() {
        let mut bridge = MatrixBridge::new();
        assert_eq!(bridge.process_response(b""), 0);
        assert_eq!(bridge.routing(), &RoutingState::new());
        assert!(bridge.drain_events().is_empty());
    }

    #[test]
    fn test_malformed_tokens_are_reported_and_skipped() {
        let mut bridge = MatrixBridge::new();
        assert_eq!(bridge.process_response(b"s123s4s71s"), 1);
        assert_eq!(bridge.routing().input_for_output(1), Some(7));

        let events = bridge.drain_events();
        let malformed = events
            .iter()
            .filter(|e| matches!(e, BridgeEvent::MalformedResponse { .. }))
            .count();
        assert_eq!(malformed, 2);
        assert!(events
            .iter()
            .any(|e| matches!(e, BridgeEvent::RouteChanged { input: 7, output: 1 })));
    }

    #[test]
    fn test_injected_99_is_accepted_literally() {
        // "99" is syntactically valid, so it is accepted even though neither
        // port exists. Output 9 has no slot, so the table stays as it was.
        let mut bridge = MatrixBridge::new();
        assert_eq!(bridge.process_response(b"99"), 0);
        bridge.handle_action(&Action::InjectTestResponse { text: "99".into() });
        assert_eq!(bridge.routing(), &RoutingState::new());
        assert!(!bridge
            .drain_events()
            .iter()
            .any(|e| matches!(e, BridgeEvent::MalformedResponse { .. })));

        // An out-of-range input on a real output is stored as reported
        bridge.handle_action(&Action::InjectTestResponse { text: "s93".into() });
        assert_eq!(bridge.routing().input_for_output(3), Some(9));

        // Only the record that landed in the table counts
        let mut bridge = MatrixBridge::new();
        assert_eq!(bridge.process_response(b"s99s93s33"), 2);
    }

    #[test]
    fn test_feedback_queries() {
        let mut bridge = MatrixBridge::new();
        assert!(bridge.query(Feedback::InputSelected { input: 0 }));
        assert!(bridge.query(Feedback::OutputFedBySelected { output: 0 }));

        bridge.select_input(2);
        bridge.process_response(b"s20s26");
        assert!(bridge.is_input_selected(2));
        assert!(bridge.is_output_fed_by_selected(0));
        assert!(bridge.is_output_fed_by_selected(2));
        assert!(bridge.is_output_fed_by_selected(6));
        assert!(!bridge.is_output_fed_by_selected(1));
    }

    #[test]
    fn test_events_only_on_change() {
        let mut bridge = MatrixBridge::new();
        bridge.select_input(0);
        bridge.process_response(b"s00s11");
        assert!(bridge.drain_events().is_empty());

        bridge.select_input(1);
        bridge.process_response(b"s10");
        let events = bridge.drain_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            BridgeEvent::SelectedInputChanged { input: 1 }
        ));
        assert!(matches!(
            events[1],
            BridgeEvent::RouteChanged {
                input: 1,
                output: 0
            }
        ));
    }
}
