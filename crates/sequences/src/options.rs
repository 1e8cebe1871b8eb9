use phasegraph_core::ConfigurationError;

#[cfg(feature = "serde-derive")]
use serde::{Deserialize, Serialize};

use crate::Parameter;

/// Simulation options.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-derive", derive(Serialize, Deserialize))]
pub struct Options {
    nstates: usize,
    max_chunk_size: Option<usize>,
    diff: Vec<Parameter>,
    verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            nstates: 10,
            max_chunk_size: None,
            diff: Vec::new(),
            verbose: false,
        }
    }
}

impl Options {
    /// Creates options with the number of retained dephasing orders and an
    /// optional bound on lanes simulated at once.
    ///
    /// # Errors
    ///
    /// Returns an error if `nstates` or `max_chunk_size` is zero.
    pub fn new(nstates: usize, max_chunk_size: Option<usize>) -> Result<Self, ConfigurationError> {
        if nstates == 0 {
            return Err(ConfigurationError::OutOfRange {
                name: "nstates",
                reason: "at least one dephasing order is required".into(),
            });
        }
        if max_chunk_size == Some(0) {
            return Err(ConfigurationError::OutOfRange {
                name: "max_chunk_size",
                reason: "chunks must hold at least one lane".into(),
            });
        }

        Ok(Self {
            nstates,
            max_chunk_size,
            ..Self::default()
        })
    }

    /// Requests the Jacobian with respect to `parameters`, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter is listed twice.
    pub fn with_diff(
        mut self,
        parameters: impl IntoIterator<Item = Parameter>,
    ) -> Result<Self, ConfigurationError> {
        let mut diff: Vec<Parameter> = Vec::new();
        for parameter in parameters {
            if diff.contains(&parameter) {
                return Err(ConfigurationError::OutOfRange {
                    name: "diff",
                    reason: format!("`{parameter}` is listed more than once"),
                });
            }
            diff.push(parameter);
        }
        self.diff = diff;
        Ok(self)
    }

    /// Like [`Options::with_diff`], parsing conventional parameter names.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown or repeated names.
    pub fn with_diff_names<'a>(
        self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ConfigurationError> {
        let parameters = names
            .into_iter()
            .map(str::parse)
            .collect::<Result<Vec<Parameter>, _>>()?;
        self.with_diff(parameters)
    }

    /// Requests timing and truncation diagnostics.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub fn nstates(&self) -> usize {
        self.nstates
    }

    #[must_use]
    pub fn max_chunk_size(&self) -> Option<usize> {
        self.max_chunk_size
    }

    #[must_use]
    pub fn diff(&self) -> &[Parameter] {
        &self.diff
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }
}
