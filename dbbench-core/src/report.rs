//! Timing accumulator and human-readable suite report.
//!
//! The harness records one [`StepRecord`] per executed step. A [`Report`]
//! groups durations by step name, sorts names lexically, renders each as
//! `"<name>: <ms> ms (<s.sss> s)"` and closes with a grand total. Steps that
//! passed in zero whole milliseconds (or were skipped outright) render as
//! `SKIPPED`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepOutcome {
    Passed,
    Skipped,
    Failed,
}

/// One timed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub name: String,
    pub elapsed: Duration,
    pub outcome: StepOutcome,
}

/// Accumulates step durations for one suite run.
#[derive(Debug, Clone, Default)]
pub struct Timings {
    steps: BTreeMap<String, (Duration, StepOutcome)>,
}

impl Timings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step. Repeated names accumulate elapsed time and keep the
    /// worst outcome.
    pub fn record(&mut self, record: StepRecord) {
        let entry = self
            .steps
            .entry(record.name)
            .or_insert((Duration::ZERO, StepOutcome::Passed));
        entry.0 += record.elapsed;
        entry.1 = entry.1.max(record.outcome);
    }

    /// Record a step from its start instant to now.
    pub fn record_since(&mut self, name: impl Into<String>, start: Instant, outcome: StepOutcome) {
        self.record(StepRecord {
            name: name.into(),
            elapsed: start.elapsed(),
            outcome,
        });
    }

    /// Record a step that was not executed.
    pub fn record_skipped(&mut self, name: impl Into<String>) {
        self.record(StepRecord {
            name: name.into(),
            elapsed: Duration::ZERO,
            outcome: StepOutcome::Skipped,
        });
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn outcome(&self, name: &str) -> Option<StepOutcome> {
        self.steps.get(name).map(|(_, outcome)| *outcome)
    }

    /// Build the sorted report for this suite.
    pub fn report(&self, suite: impl Into<String>) -> Report {
        let steps: Vec<ReportLine> = self
            .steps
            .iter()
            .map(|(name, (elapsed, outcome))| ReportLine::new(name, *elapsed, *outcome))
            .collect();
        let total_seconds = self.steps.values().map(|(d, _)| d.as_secs_f64()).sum();

        Report {
            suite: suite.into(),
            steps,
            total_seconds,
        }
    }
}

/// One rendered step of a [`Report`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLine {
    pub name: String,
    pub millis: u64,
    pub seconds: f64,
    pub outcome: StepOutcome,
}

impl ReportLine {
    fn new(name: &str, elapsed: Duration, outcome: StepOutcome) -> Self {
        Self {
            name: name.to_string(),
            millis: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            seconds: elapsed.as_secs_f64(),
            outcome,
        }
    }

    /// Skipped steps and passed steps under one millisecond render as SKIPPED.
    pub fn is_skipped(&self) -> bool {
        match self.outcome {
            StepOutcome::Skipped => true,
            StepOutcome::Passed => self.millis == 0,
            StepOutcome::Failed => false,
        }
    }
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_skipped() {
            write!(f, "{}: SKIPPED", self.name)
        } else if self.outcome == StepOutcome::Failed {
            write!(f, "{}: FAILED after {} ms ({:.3} s)", self.name, self.millis, self.seconds)
        } else {
            write!(f, "{}: {} ms ({:.3} s)", self.name, self.millis, self.seconds)
        }
    }
}

/// Sorted per-step timings with a grand total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub suite: String,
    pub steps: Vec<ReportLine>,
    pub total_seconds: f64,
}

impl Report {
    /// Rendered lines, header first and total last.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.steps.len() + 2);
        lines.push(format!("=== {}", self.suite));
        lines.extend(self.steps.iter().map(ToString::to_string));
        lines.push(format!("total: {:.3} s", self.total_seconds));
        lines
    }

    pub fn failed(&self) -> impl Iterator<Item = &ReportLine> {
        self.steps.iter().filter(|s| s.outcome == StepOutcome::Failed)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn step(name: &str, millis: u64, outcome: StepOutcome) -> StepRecord {
        StepRecord {
            name: name.to_string(),
            elapsed: Duration::from_millis(millis),
            outcome,
        }
    }

    #[test]
    fn test_report_sorts_and_formats() {
        let mut timings = Timings::new();
        timings.record(step("02_create_100", 1500, StepOutcome::Passed));
        timings.record(step("01_create_10", 12, StepOutcome::Passed));

        let report = timings.report("postgres");
        let lines = report.lines();
        assert_eq!(lines[0], "=== postgres");
        assert_eq!(lines[1], "01_create_10: 12 ms (0.012 s)");
        assert_eq!(lines[2], "02_create_100: 1500 ms (1.500 s)");
        assert_eq!(lines[3], "total: 1.512 s");
    }

    #[test]
    fn test_zero_duration_pass_is_skipped() {
        let mut timings = Timings::new();
        timings.record(step("06_read_10000", 0, StepOutcome::Passed));
        timings.record_skipped("07_bulk_read_10000");

        let lines = timings.report("neo4j").lines();
        assert_eq!(lines[1], "06_read_10000: SKIPPED");
        assert_eq!(lines[2], "07_bulk_read_10000: SKIPPED");
        assert_eq!(lines[3], "total: 0.000 s");
    }

    #[test]
    fn test_failed_step_marked() {
        let mut timings = Timings::new();
        timings.record(step("14_query_pairs_10000", 0, StepOutcome::Failed));
        let report = timings.report("arango");
        assert_eq!(report.lines()[1], "14_query_pairs_10000: FAILED after 0 ms (0.000 s)");
        assert_eq!(report.failed().count(), 1);
    }

    #[test]
    fn test_repeated_names_accumulate() {
        let mut timings = Timings::new();
        timings.record(step("x", 10, StepOutcome::Passed));
        timings.record(step("x", 15, StepOutcome::Failed));
        timings.record(step("x", 5, StepOutcome::Passed));
        assert_eq!(timings.len(), 1);
        assert_eq!(timings.outcome("x"), Some(StepOutcome::Failed));
        assert_eq!(timings.report("s").steps[0].millis, 30);
    }

    #[test]
    fn test_report_json_roundtrip() {
        let mut timings = Timings::new();
        timings.record(step("01_create_10", 3, StepOutcome::Passed));
        let report = timings.report("memory");
        let json = report.to_json().unwrap();
        let back: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    proptest! {
        #[test]
        fn prop_total_is_sum_of_steps(millis in prop::collection::vec(0u64..5_000, 0..40)) {
            let mut timings = Timings::new();
            for (i, ms) in millis.iter().enumerate() {
                timings.record(step(&format!("{:02}_step", i), *ms, StepOutcome::Passed));
            }
            let report = timings.report("p");
            let expected: f64 = millis.iter().map(|ms| *ms as f64 / 1000.0).sum();
            prop_assert!((report.total_seconds - expected).abs() < 1e-9);
            prop_assert_eq!(report.steps.len(), millis.len());
        }

        #[test]
        fn prop_lines_are_sorted(names in prop::collection::hash_set("[a-z]{1,8}", 1..20)) {
            let mut timings = Timings::new();
            for name in &names {
                timings.record(step(name, 1, StepOutcome::Passed));
            }
            let report = timings.report("p");
            let rendered: Vec<&str> = report.steps.iter().map(|s| s.name.as_str()).collect();
            let mut sorted = rendered.clone();
            sorted.sort();
            prop_assert_eq!(rendered, sorted);
        }
    }
}
