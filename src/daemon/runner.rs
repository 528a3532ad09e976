use std::process::{Command, Stdio};

use crate::events::{FailureCause, RunIdSequence, SuiteListener, TestId};

/// Runs the tests of one test class, reporting everything through `listener`
pub trait TestClassRunner: Send + Sync {
    fn run_test_class(&self, test_class: &str, run_ids: &RunIdSequence, listener: &mut dyn SuiteListener);
}

/// Treats a test class as a command line. The whole class is a single test
/// in a single run, and it fails when the command exits unsuccessfully.
///
/// Class names arrive over the launcher connection and are executed as
/// given, split on whitespace without a shell. Whoever sends `RunTests` can
/// run any program as the daemon's user, so the daemon must only connect to
/// the loopback port of a launcher that started it.
#[derive(Debug, Default, Clone)]
pub struct ProcessTestClassRunner;

impl ProcessTestClassRunner {
    pub fn new() -> Self {
        Self
    }

    fn execute(test_class: &str) -> Result<(), FailureCause> {
        let mut words = test_class.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| FailureCause::new("EmptyCommand", "test class names no command"))?;

        let output = Command::new(program)
            .args(words)
            .stdin(Stdio::null())
            .output()
            .map_err(|error| FailureCause::new("SpawnError", error.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(
                FailureCause::new("NonZeroExit", format!("{program} {}", output.status))
                    .with_details(String::from_utf8_lossy(&output.stderr).trim_end().to_string()),
            )
        }
    }
}

impl TestClassRunner for ProcessTestClassRunner {
    fn run_test_class(&self, test_class: &str, run_ids: &RunIdSequence, listener: &mut dyn SuiteListener) {
        let test_id = TestId::root();
        listener.on_test_found(test_class.to_string(), test_id.clone(), test_class.to_string());

        let run_id = run_ids.next_run_id();
        listener.on_run_started(run_id, test_class.to_string());
        listener.on_test_started(run_id, test_id);

        tracing::debug!(test_class, run_id = %run_id, "Running test class");
        if let Err(cause) = Self::execute(test_class) {
            tracing::debug!(test_class, run_id = %run_id, cause = %cause, "Test class failed");
            listener.on_failure(run_id, cause);
        }

        listener.on_test_finished(run_id);
        listener.on_run_finished(run_id);
    }
}
