use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossbeam_channel::{self as cb, RecvTimeoutError, TryRecvError};

use crate::actors::MessageConsumer;
use crate::demux::SuiteEventDemuxer;
use crate::events::{FailureCause, RunId, SuiteEvent, SuiteListener, TestId};

// ============================================================================
// Text UI - Per-Run Report of an Interleaved Suite
// ============================================================================

/// Totals printed at the end of a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub runs: usize,
    pub passed: usize,
    pub failed: usize,
}

pub struct TextUi<W> {
    events: cb::Receiver<SuiteEvent>,
    demuxer: SuiteEventDemuxer,
    out: W,
    disconnected: bool,
}

impl<W: Write> TextUi<W> {
    pub fn new(events: cb::Receiver<SuiteEvent>, out: W) -> Self {
        Self {
            events,
            demuxer: SuiteEventDemuxer::new(),
            out,
            disconnected: false,
        }
    }

    /// File every event that has already arrived. Returns how many there were.
    pub fn update(&mut self) -> usize {
        let mut received = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.demuxer.consume(event);
                    received += 1;
                }
                Err(TryRecvError::Empty) => return received,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    return received;
                }
            }
        }
    }

    /// Keep filing events until the suite finishes, the daemon goes away or
    /// `timeout` expires. Returns whether the suite finished.
    pub fn update_until_finished(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            match self.events.recv_deadline(deadline) {
                Ok(event) => self.demuxer.consume(event),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        self.is_finished()
    }

    pub fn is_finished(&self) -> bool {
        self.demuxer.is_suite_finished()
    }

    /// The daemon connection closed
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn demuxer(&self) -> &SuiteEventDemuxer {
        &self.demuxer
    }

    /// Print every run on its own, then the totals
    pub fn render(&mut self) -> io::Result<Summary> {
        let mut summary = Summary::default();
        let run_ids: Vec<RunId> = self.demuxer.run_ids().collect();

        for run_id in run_ids {
            let mut printer = RunPrinter::new(&self.demuxer);
            if let Err(error) = self.demuxer.visit_run(run_id, &mut printer) {
                tracing::warn!(run_id = %run_id, error = %error, "Run vanished while rendering");
                continue;
            }

            summary.runs += 1;
            if printer.failed {
                summary.failed += 1;
            } else {
                summary.passed += 1;
            }
            for line in &printer.lines {
                writeln!(self.out, "{line}")?;
            }
        }

        writeln!(
            self.out,
            "Runs: {}, Passed: {}, Failed: {}",
            summary.runs, summary.passed, summary.failed
        )?;
        self.out.flush()?;
        Ok(summary)
    }

    pub fn into_output(self) -> W {
        self.out
    }
}

/// Formats one replayed run, resolving test names through the demuxer
struct RunPrinter<'a> {
    demuxer: &'a SuiteEventDemuxer,
    test_class: String,
    open_tests: Vec<TestId>,
    lines: Vec<String>,
    failed: bool,
}

impl<'a> RunPrinter<'a> {
    fn new(demuxer: &'a SuiteEventDemuxer) -> Self {
        Self {
            demuxer,
            test_class: String::new(),
            open_tests: Vec::new(),
            lines: Vec::new(),
            failed: false,
        }
    }

    fn indent(depth: usize) -> String {
        "  ".repeat(depth)
    }
}

impl SuiteListener for RunPrinter<'_> {
    fn on_suite_started(&mut self) {}

    fn on_test_found(&mut self, _test_class: String, _test_id: TestId, _name: String) {}

    fn on_run_started(&mut self, run_id: RunId, test_class: String) {
        self.lines.push(format!("Run #{} in {}", run_id.value(), test_class));
        self.test_class = test_class;
    }

    fn on_test_started(&mut self, _run_id: RunId, test_id: TestId) {
        let name = match self.demuxer.get_test_name(&self.test_class, &test_id) {
            Ok(name) => name.to_string(),
            Err(error) => format!("<{error}>"),
        };
        let indent = Self::indent(test_id.path().len() + 1);
        self.lines.push(format!("{indent}> {name}"));
        self.open_tests.push(test_id);
    }

    fn on_failure(&mut self, _run_id: RunId, cause: FailureCause) {
        self.failed = true;
        let depth = self
            .open_tests
            .last()
            .map_or(0, |test_id| test_id.path().len() + 1);
        let indent = Self::indent(depth + 1);
        self.lines.push(format!("{indent}✗ {cause}"));
        if let Some(details) = &cause.details {
            for line in details.lines() {
                self.lines.push(format!("{indent}  {line}"));
            }
        }
    }

    fn on_test_finished(&mut self, _run_id: RunId) {
        self.open_tests.pop();
    }

    fn on_run_finished(&mut self, _run_id: RunId) {}

    fn on_suite_finished(&mut self) {}
}
