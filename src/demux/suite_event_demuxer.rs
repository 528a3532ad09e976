use std::collections::{BTreeMap, HashMap};

use crate::actors::{Event, MessageConsumer};
use crate::events::{RunId, SuiteEvent, SuiteListener, TestId};

use super::errors::DemuxError;

// ============================================================================
// Suite Event Demuxer - Per-Run Views of One Event Stream
// ============================================================================
//
// All runs of a suite share one ordered delivery channel. The demuxer files
// every run-scoped event under its RunId so each run can be replayed on its
// own, in its original order, as often as needed.
//
// Run lifecycle: absent → active (RunStarted) → finished (RunFinished).
// A finished run stays queryable.
//
// ============================================================================

/// Key for test names: one test within one test class
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalTestId {
    pub test_class: String,
    pub test_id: TestId,
}

impl GlobalTestId {
    pub fn new(test_class: impl Into<String>, test_id: TestId) -> Self {
        Self {
            test_class: test_class.into(),
            test_id,
        }
    }
}

/// Append-only event log of one run
#[derive(Debug, Default)]
struct RunState {
    events: Vec<SuiteEvent>,
    finished: bool,
}

#[derive(Debug, Default)]
pub struct SuiteEventDemuxer {
    test_names: HashMap<GlobalTestId, String>,
    runs: BTreeMap<RunId, RunState>,
    suite_finished: bool,
}

impl SuiteEventDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_suite_finished(&self) -> bool {
        self.suite_finished
    }

    /// Replay every known run. Runs are visited in ascending RunId order;
    /// only the order within a run is part of the contract.
    pub fn visit_all_runs(&self, visitor: &mut dyn SuiteListener) {
        for state in self.runs.values() {
            replay(state, visitor);
        }
    }

    /// Replay one run's events in their original order
    pub fn visit_run(&self, run_id: RunId, visitor: &mut dyn SuiteListener) -> Result<(), DemuxError> {
        let state = self.runs.get(&run_id).ok_or(DemuxError::RunNotFound(run_id))?;
        replay(state, visitor);
        Ok(())
    }

    pub fn get_test_name(&self, test_class: &str, test_id: &TestId) -> Result<&str, DemuxError> {
        self.test_names
            .get(&GlobalTestId::new(test_class, test_id.clone()))
            .map(String::as_str)
            .ok_or_else(|| DemuxError::TestNameNotFound {
                test_class: test_class.to_string(),
                test_id: test_id.clone(),
            })
    }

    pub fn run_ids(&self) -> impl Iterator<Item = RunId> + '_ {
        self.runs.keys().copied()
    }

    pub fn is_run_finished(&self, run_id: RunId) -> Result<bool, DemuxError> {
        self.runs
            .get(&run_id)
            .map(|state| state.finished)
            .ok_or(DemuxError::RunNotFound(run_id))
    }

    /// Classify one incoming event and file it where it belongs.
    ///
    /// The event being filed is passed in explicitly; the demuxer keeps no
    /// notion of a "current" message between calls.
    fn file_event(&mut self, event: SuiteEvent) {
        match &event {
            SuiteEvent::SuiteStarted => {}
            SuiteEvent::TestFound {
                test_class,
                test_id,
                name,
            } => {
                self.test_names
                    .insert(GlobalTestId::new(test_class.clone(), test_id.clone()), name.clone());
            }
            SuiteEvent::RunStarted { run_id, .. } => {
                let run_id = *run_id;
                // A repeated RunStarted is appended to the existing run. Its
                // earlier events are kept, never replaced by a restarted run.
                if self.runs.contains_key(&run_id) {
                    tracing::warn!(run_id = %run_id, "Run started twice; appending to existing run");
                }
                self.runs.entry(run_id).or_default().events.push(event);
            }
            SuiteEvent::TestStarted { run_id, .. }
            | SuiteEvent::Failure { run_id, .. }
            | SuiteEvent::TestFinished { run_id } => {
                let run_id = *run_id;
                self.append_to_run(run_id, event);
            }
            SuiteEvent::RunFinished { run_id } => {
                let run_id = *run_id;
                if self.append_to_run(run_id, event) {
                    if let Some(state) = self.runs.get_mut(&run_id) {
                        state.finished = true;
                    }
                }
            }
            SuiteEvent::SuiteFinished => {
                self.suite_finished = true;
            }
        }
    }

    fn append_to_run(&mut self, run_id: RunId, event: SuiteEvent) -> bool {
        match self.runs.get_mut(&run_id) {
            Some(state) => {
                if state.finished {
                    tracing::warn!(run_id = %run_id, event = ?event, "Event after run finished");
                }
                state.events.push(event);
                true
            }
            None => {
                tracing::warn!(run_id = %run_id, event = ?event, "Dropping event for unknown run");
                false
            }
        }
    }
}

fn replay(state: &RunState, visitor: &mut dyn SuiteListener) {
    for event in &state.events {
        event.fire_on(visitor);
    }
}

impl MessageConsumer<SuiteEvent> for SuiteEventDemuxer {
    fn consume(&mut self, message: SuiteEvent) {
        self.file_event(message);
    }
}
