use crate::error::{Error, Result};

/// What a monitoring session watches for: a process name and the handle
/// name pattern to close inside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetSpec {
    process: String,
    pattern: String,
}

impl TargetSpec {
    /// Builds a target from user input.
    ///
    /// `process` may be given as a listed entry such as `App (PID: 1234)`;
    /// everything from the first `(` on is dropped. Both parts are trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTarget`] if either part is blank.
    pub fn new(process: &str, pattern: &str) -> Result<Self> {
        let process = process
            .split_once('(')
            .map_or(process, |(name, _)| name)
            .trim();
        let pattern = pattern.trim();

        if process.is_empty() {
            return Err(Error::InvalidTarget("process name"));
        }
        if pattern.is_empty() {
            return Err(Error::InvalidTarget("handle pattern"));
        }

        Ok(Self {
            process: process.to_owned(),
            pattern: pattern.to_owned(),
        })
    }

    pub fn process(&self) -> &str {
        &self.process
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}
