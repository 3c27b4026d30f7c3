//! Problems an analysis ran into, graded by severity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

pub const MAX_SEVERITY: u8 = 10;

/// Meaning of each severity, indexed by `severity - 1`.
pub const SEVERITY_SCALE: [&str; 10] = [
    "minor warning",
    "warning",
    "stern warning",
    "serious warning",
    "error in secondary method",
    "error in important method due to inputs",
    "error in important method",
    "partial failure in setup/init",
    "serious failure in setup; even minor methods of a dummy instance will not work",
    "catastrophic failure",
];

pub const SEVERITY_QUALITATIVE: [&str; 10] = [
    "minor", "minor", "minor", "moderate", "moderate", "moderate", "serious", "serious", "serious",
    "serious",
];

fn table_entry(table: &'static [&'static str; 10], severity: u8) -> &'static str {
    match severity {
        0 => "",
        s => table[usize::from(s.min(MAX_SEVERITY)) - 1],
    }
}

/// Description of a severity level; empty for 0.
pub fn describe_severity(severity: u8) -> &'static str {
    table_entry(&SEVERITY_SCALE, severity)
}

/// `minor`, `moderate` or `serious`; empty for 0.
pub fn qualitative(severity: u8) -> &'static str {
    table_entry(&SEVERITY_QUALITATIVE, severity)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComplaintLevel {
    Info,
    Plain,
    Warn,
    Error,
}

impl ComplaintLevel {
    pub fn for_severity(severity: u8) -> Self {
        match severity {
            0..2 => ComplaintLevel::Info,
            2..4 => ComplaintLevel::Plain,
            4..7 => ComplaintLevel::Warn,
            _ => ComplaintLevel::Error,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Complaint {
    pub report: String,
    /// Worst recorded severity, 0 with no problems
    pub severity: u8,
    pub level: ComplaintLevel,
}

/// Description → severity in `1..=10`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemLedger {
    problems: BTreeMap<String, u8>,
}

impl ProblemLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem; severity is clamped into `1..=10`.
    pub fn record(&mut self, desc: impl Into<String>, severity: u8) {
        self.problems
            .insert(desc.into(), severity.clamp(1, MAX_SEVERITY));
    }

    pub fn clear(&mut self, desc: &str) -> Option<u8> {
        self.problems.remove(desc)
    }

    pub fn get(&self, desc: &str) -> Option<u8> {
        self.problems.get(desc).copied()
    }

    pub fn contains(&self, desc: &str) -> bool {
        self.problems.contains_key(desc)
    }

    pub fn worst(&self) -> u8 {
        self.problems.values().copied().max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        self.problems.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Entries, worst first.
    pub fn sorted(&self) -> Vec<(&str, u8)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        entries
    }

    /// Format the ledger and, unless `quiet`, log it at a level set by the
    /// worst severity. With `no_good_news` an empty ledger is not logged.
    pub fn summarize(&self, quiet: bool, no_good_news: bool, class_name: &str) -> Complaint {
        let severity = self.worst();
        let report = if self.is_empty() {
            format!("No problems in {class_name} so far")
        } else {
            let header = format!("Problems encountered in {class_name}:");
            let width = self.problems.keys().map(|k| k.chars().count()).max().unwrap_or(0);
            let mut lines = vec![header.clone(), "-".repeat(header.chars().count())];
            for (desc, sev) in self.sorted() {
                lines.push(format!("{desc:width$}: {sev} ({})", describe_severity(sev)));
            }
            lines.join("\n")
        };
        let level = ComplaintLevel::for_severity(severity);
        if !quiet {
            match level {
                ComplaintLevel::Info if no_good_news && severity == 0 => {}
                ComplaintLevel::Info | ComplaintLevel::Plain => info!("{report}"),
                ComplaintLevel::Warn => warn!("{report}"),
                ComplaintLevel::Error => error!("{report}"),
            }
        }
        Complaint {
            report,
            severity,
            level,
        }
    }

    /// One-line status: `Okay`, or the count and the worst severity.
    pub fn status_line(&self) -> String {
        if self.is_empty() {
            return "Okay".to_string();
        }
        let w = self.worst();
        format!(
            "{} problem(s)! Severity = {w}/{MAX_SEVERITY} ({}): {}",
            self.len(),
            qualitative(w),
            describe_severity(w)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn severities_are_clamped() {
        let mut l = ProblemLedger::new();
        l.record("too low", 0);
        l.record("too high", 42);
        assert_eq!(l.get("too low"), Some(1));
        assert_eq!(l.get("too high"), Some(10));
    }

    #[test]
    fn report_is_sorted_and_aligned() {
        let mut l = ProblemLedger::new();
        l.record("a", 2);
        l.record("longer problem", 8);
        let c = l.summarize(true, true, "ControlQuality");
        assert_eq!(c.severity, 8);
        assert_eq!(c.level, ComplaintLevel::Error);
        let lines: Vec<&str> = c.report.lines().collect();
        assert_eq!(lines[0], "Problems encountered in ControlQuality:");
        assert_eq!(lines[1].len(), lines[0].len());
        assert_eq!(lines[2], "longer problem: 8 (partial failure in setup/init)");
        assert_eq!(lines[3], "a             : 2 (warning)");
    }

    #[test]
    fn empty_ledger_is_good_news() {
        let l = ProblemLedger::new();
        let c = l.summarize(true, true, "SystemIdentification");
        assert_eq!(c.report, "No problems in SystemIdentification so far");
        assert_eq!(c.severity, 0);
        assert_eq!(c.level, ComplaintLevel::Info);
        assert_eq!(l.status_line(), "Okay");
    }

    #[test]
    fn status_line_names_the_worst() {
        let mut l = ProblemLedger::new();
        l.record("Missing basic data", 8);
        l.record("minor thing", 1);
        assert_eq!(
            l.status_line(),
            "2 problem(s)! Severity = 8/10 (serious): partial failure in setup/init"
        );
        l.clear("Missing basic data");
        assert_eq!(l.worst(), 1);
    }

    #[test]
    fn levels() {
        assert_eq!(ComplaintLevel::for_severity(1), ComplaintLevel::Info);
        assert_eq!(ComplaintLevel::for_severity(3), ComplaintLevel::Plain);
        assert_eq!(ComplaintLevel::for_severity(6), ComplaintLevel::Warn);
        assert_eq!(ComplaintLevel::for_severity(7), ComplaintLevel::Error);
    }

    proptest! {
        #[test]
        fn worst_is_the_max(entries in proptest::collection::vec(("[a-z]{1,6}", 0u8..20), 0..12)) {
            let mut l = ProblemLedger::new();
            let mut expected = BTreeMap::new();
            for (desc, sev) in &entries {
                l.record(desc.clone(), *sev);
                expected.insert(desc.clone(), (*sev).clamp(1, 10));
            }
            prop_assert_eq!(l.worst(), expected.values().copied().max().unwrap_or(0));
            prop_assert_eq!(l.len(), expected.len());
        }
    }
}
