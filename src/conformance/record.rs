use std::fmt;

use crate::{conformance::Expect, Frame, LResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Passed,
    Failed,
    /// Not attempted because a step it depends on did not pass.
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Passed => "PASS",
            Outcome::Failed => "FAIL",
            Outcome::Skipped => "SKIP",
        })
    }
}

/// What actually came back for a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actual {
    Reply(Frame),
    /// The round-trip failed; holds the rendered error.
    Error(String),
    NotSent,
}

impl fmt::Display for Actual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actual::Reply(frame) => write!(f, "{frame}"),
            Actual::Error(e) => write!(f, "<{e}>"),
            Actual::NotSent => write!(f, "<not sent>"),
        }
    }
}

/// The outcome of one conformance assertion. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionRecord {
    group: &'static str,
    name: &'static str,
    command: String,
    expected: Expect,
    actual: Actual,
    outcome: Outcome,
}

impl AssertionRecord {
    /// Records a completed round-trip, deciding pass or fail from `expected`.
    pub fn new(
        group: &'static str,
        name: &'static str,
        command: impl fmt::Display,
        expected: Expect,
        result: &LResult<Frame>,
    ) -> Self {
        let outcome = if expected.check(result) {
            Outcome::Passed
        } else {
            Outcome::Failed
        };
        let actual = match result {
            Ok(frame) => Actual::Reply(frame.clone()),
            Err(e) => Actual::Error(e.to_string()),
        };
        Self {
            group,
            name,
            command: command.to_string(),
            expected,
            actual,
            outcome,
        }
    }

    pub fn skipped(
        group: &'static str,
        name: &'static str,
        command: impl fmt::Display,
        expected: Expect,
    ) -> Self {
        Self {
            group,
            name,
            command: command.to_string(),
            expected,
            actual: Actual::NotSent,
            outcome: Outcome::Skipped,
        }
    }

    pub fn group(&self) -> &'static str {
        self.group
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// `group/name`, unique within a suite run.
    pub fn id(&self) -> String {
        format!("{}/{}", self.group, self.name)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn expected(&self) -> &Expect {
        &self.expected
    }

    pub fn actual(&self) -> &Actual {
        &self.actual
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use bytes::Bytes;

    #[test]
    fn test_record_outcomes() {
        let pass = AssertionRecord::new(
            "strings",
            "get",
            "GET k",
            Expect::bulk("v"),
            &Ok(Frame::BulkString(Bytes::from("v"))),
        );
        assert!(pass.passed());
        assert_eq!(pass.id(), "strings/get");

        let fail = AssertionRecord::new(
            "strings",
            "get",
            "GET k",
            Expect::bulk("v"),
            &Err(Error::ConnectionClosed),
        );
        assert_eq!(fail.outcome(), Outcome::Failed);
        assert_eq!(fail.actual().to_string(), "<connection closed by peer>");

        let skip = AssertionRecord::skipped("transactions", "exec", "EXEC", Expect::ok());
        assert_eq!(skip.outcome(), Outcome::Skipped);
        assert_eq!(skip.actual(), &Actual::NotSent);
    }
}
