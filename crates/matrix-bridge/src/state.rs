//! Routing and connection state tracking

use matrix_protocol::{RouteRecord, PORT_COUNT};
use serde::{Deserialize, Serialize};

/// Local model of the matrix routing table
///
/// `output_map[o]` is the input currently feeding output `o`. The table
/// starts out as identity routing, which is only a guess until the matrix
/// reports otherwise.
///
/// The selected input is purely local: it is the implicit source for the
/// next switch command and is never confirmed by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingState {
    selected_input: u8,
    output_map: [u8; PORT_COUNT],
}

/// Result of applying one reported mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The output's source changed
    Changed {
        /// Input that fed the output before
        previous: u8,
    },
    /// The output already had this source
    Unchanged,
    /// The output index does not exist on this matrix; nothing was stored
    OutputOutOfRange,
}

impl Default for RoutingState {
    fn default() -> Self {
        Self {
            selected_input: 0,
            output_map: std::array::from_fn(|o| o as u8),
        }
    }
}

impl RoutingState {
    /// Create the initial identity routing with input 0 selected
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently selected input
    pub fn selected_input(&self) -> u8 {
        self.selected_input
    }

    /// The full output table
    pub fn output_map(&self) -> &[u8; PORT_COUNT] {
        &self.output_map
    }

    /// Input routed to `output`, if the output exists
    pub fn input_for_output(&self, output: u8) -> Option<u8> {
        self.output_map.get(output as usize).copied()
    }

    /// Record that `record.input` now feeds `record.output`
    ///
    /// Last writer wins. The input value is stored as reported, even if it
    /// names a port this matrix does not have.
    pub fn apply_mapping(&mut self, record: RouteRecord) -> ApplyOutcome {
        let Some(slot) = self.output_map.get_mut(record.output as usize) else {
            return ApplyOutcome::OutputOutOfRange;
        };

        let previous = *slot;
        *slot = record.input;
        if previous == record.input {
            ApplyOutcome::Unchanged
        } else {
            ApplyOutcome::Changed { previous }
        }
    }

    /// Arm `input` as the source for subsequent switch commands
    ///
    /// Returns true if the selection changed.
    pub fn select_input(&mut self, input: u8) -> bool {
        let changed = self.selected_input != input;
        self.selected_input = input;
        changed
    }

    /// Whether `input` is the selected input
    pub fn is_input_selected(&self, input: u8) -> bool {
        self.selected_input == input
    }

    /// Whether `output` is currently fed by the selected input
    pub fn is_output_fed_by_selected(&self, output: u8) -> bool {
        self.input_for_output(output) == Some(self.selected_input)
    }

    /// Outputs currently fed by the selected input
    pub fn outputs_fed_by_selected(&self) -> Vec<u8> {
        (0..PORT_COUNT as u8)
            .filter(|o| self.is_output_fed_by_selected(*o))
            .collect()
    }
}

/// Connection state as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// No socket
    #[default]
    Disconnected,
    /// TCP connect in progress
    Connecting,
    /// Socket established; commands are written
    Connected,
}

impl ConnectionStatus {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
        }
    }

    /// Whether commands can be written
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Snapshot of the resources owned by the bridge actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSummary {
    /// Configuration generation (incremented on every start/reconfigure)
    pub generation: u64,
    /// Whether a poll task is scheduled
    pub poll_task_active: bool,
    /// Whether a connection task exists
    pub connection_active: bool,
    /// Last status reported by the current connection
    pub connection_status: ConnectionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_initial_state() {
        let state = RoutingState::new();
        assert_eq!(state.selected_input(), 0);
        assert_eq!(state.output_map(), &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert!(state.is_input_selected(0));
        // Identity routing: only output 0 is fed by input 0
        assert_eq!(state.outputs_fed_by_selected(), vec![0]);
    }

    #[test]
    fn test_apply_mapping_last_writer_wins() {
        let mut state = RoutingState::new();
        assert_eq!(
            state.apply_mapping(RouteRecord { input: 3, output: 1 }),
            ApplyOutcome::Changed { previous: 1 }
        );
        assert_eq!(
            state.apply_mapping(RouteRecord { input: 3, output: 1 }),
            ApplyOutcome::Unchanged
        );
        state.apply_mapping(RouteRecord { input: 6, output: 1 });
        assert_eq!(state.input_for_output(1), Some(6));
    }

    #[test]
    fn test_out_of_range_output_is_not_stored() {
        let mut state = RoutingState::new();
        assert_eq!(
            state.apply_mapping(RouteRecord { input: 9, output: 9 }),
            ApplyOutcome::OutputOutOfRange
        );
        assert_eq!(state, RoutingState::new());
    }

    #[test]
    fn test_out_of_range_input_is_stored_literally() {
        let mut state = RoutingState::new();
        state.apply_mapping(RouteRecord { input: 9, output: 2 });
        assert_eq!(state.input_for_output(2), Some(9));
        assert!(!state.is_output_fed_by_selected(2));

        state.select_input(9);
        assert!(state.is_output_fed_by_selected(2));
    }

    #[test]
    fn test_select_input_leaves_outputs_alone() {
        let mut state = RoutingState::new();
        assert!(state.select_input(4));
        assert!(!state.select_input(4));
        assert_eq!(state.output_map(), &[0, 1, 2, 3, 4, 5, 6, 7]);
        assert!(state.is_output_fed_by_selected(4));
        assert!(!state.is_output_fed_by_selected(0));
    }

    #[test]
    fn test_status_names() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
        assert!(ConnectionStatus::Connected.is_connected());
        assert!(!ConnectionStatus::Connecting.is_connected());
        assert_eq!(ConnectionStatus::Connecting.name(), "Connecting");
    }

    fn any_record() -> impl Strategy<Value = RouteRecord> {
        (0u8..10, 0u8..10).prop_map(|(input, output)| RouteRecord { input, output })
    }

    proptest! {
        #[test]
        fn fed_by_selected_matches_table(
            records in proptest::collection::vec(any_record(), 0..32),
            selected in 0u8..8,
        ) {
            let mut state = RoutingState::new();
            for record in records {
                state.apply_mapping(record);
            }
            state.select_input(selected);

            prop_assert_eq!(state.output_map().len(), PORT_COUNT);
            for output in 0..PORT_COUNT as u8 {
                let expected = state.output_map()[output as usize] == selected;
                prop_assert_eq!(state.is_output_fed_by_selected(output), expected);
            }
        }
    }
}
