use std::fmt;

use serde::{Deserialize, Serialize};

/// How a single save event is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Nothing to do.
    Idle,
    /// Processed synchronously before the save returns.
    Inline,
    /// Left to the deferred-processing collaborator.
    Deferred,
    /// Handed to the background job backend.
    Enqueued,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Idle => "idle",
            Strategy::Inline => "inline",
            Strategy::Deferred => "deferred",
            Strategy::Enqueued => "enqueued",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job backend wins over deferred processing, which wins over inline.
pub fn select_strategy(should_process: bool, job_backend: bool, deferred: bool) -> Strategy {
    match (should_process, job_backend, deferred) {
        (false, _, _) => Strategy::Idle,
        (true, true, _) => Strategy::Enqueued,
        (true, false, true) => Strategy::Deferred,
        (true, false, false) => Strategy::Inline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_covers_every_combination() {
        let cases = [
            ((false, false, false), Strategy::Idle),
            ((false, true, false), Strategy::Idle),
            ((false, false, true), Strategy::Idle),
            ((false, true, true), Strategy::Idle),
            ((true, false, false), Strategy::Inline),
            ((true, false, true), Strategy::Deferred),
            ((true, true, false), Strategy::Enqueued),
            ((true, true, true), Strategy::Enqueued),
        ];
        for ((process, jobs, deferred), expected) in cases {
            assert_eq!(
                select_strategy(process, jobs, deferred),
                expected,
                "should_process={process} job_backend={jobs} deferred={deferred}"
            );
        }
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(Strategy::Enqueued.to_string(), "enqueued");
        assert_eq!(Strategy::Idle.to_string(), "idle");
    }
}
