//! Solver-kind dependent field mapping for the solver trace.
//!
//! Different solver algorithms park their iteration count and precision at
//! different indices of the options arrays. The mapping is a fixed lookup
//! keyed by [`SolverKind`]; kinds outside the two explicitly handled fall
//! back to a default mapping that is best-effort only -- its offsets are not
//! authoritative for any particular solver, and samples read through it say
//! so via [`SolverTraceSample::best_effort`].

use serde::{Deserialize, Serialize};

use crate::engine::{QueryError, SolverOptions};

// ---------------------------------------------------------------------------
// SolverKind
// ---------------------------------------------------------------------------

/// The solver algorithm that produced a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverKind {
    /// Generic mechanical nonsmooth Gauss-Seidel.
    GenericMechanicalNsgs,
    /// 3-D frictional contact nonsmooth Gauss-Seidel.
    FrictionalContact3dNsgs,
    /// Anything else, tagged with the backend's numeric solver id.
    Other(i32),
}

// ---------------------------------------------------------------------------
// SolverFieldMap
// ---------------------------------------------------------------------------

/// Where to find iterations and precision inside the options arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverFieldMap {
    /// Index of the iteration count in `iparam`.
    pub iterations: usize,
    /// Index of the global precision in `dparam`.
    pub precision: usize,
    /// Index of the local precision in `dparam`; `None` means the solver has
    /// no such notion and 0 is recorded.
    pub local_precision: Option<usize>,
    /// Whether these offsets are known-correct for the kind, as opposed to
    /// the fallback guess.
    pub authoritative: bool,
}

impl SolverFieldMap {
    /// The mapping for a solver kind.
    pub fn for_kind(kind: SolverKind) -> Self {
        match kind {
            SolverKind::GenericMechanicalNsgs => Self {
                iterations: 3,
                precision: 2,
                local_precision: Some(3),
                authoritative: true,
            },
            SolverKind::FrictionalContact3dNsgs => Self {
                iterations: 7,
                precision: 1,
                local_precision: None,
                authoritative: true,
            },
            SolverKind::Other(_) => Self {
                iterations: 1,
                precision: 1,
                local_precision: Some(2),
                authoritative: false,
            },
        }
    }

    /// Read a trace sample out of raw solver options.
    ///
    /// Out-of-range indices mean the engine handed over arrays the mapping
    /// does not fit; that is a query failure for the current record call,
    /// not corruption.
    pub fn read(&self, options: &SolverOptions) -> Result<SolverTraceSample, QueryError> {
        let iterations = *options.iparam.get(self.iterations).ok_or_else(|| {
            QueryError::Backend(format!(
                "solver iparam has {} entries, mapping needs index {}",
                options.iparam.len(),
                self.iterations
            ))
        })?;
        let precision = *options.dparam.get(self.precision).ok_or_else(|| {
            QueryError::Backend(format!(
                "solver dparam has {} entries, mapping needs index {}",
                options.dparam.len(),
                self.precision
            ))
        })?;
        let local_precision = match self.local_precision {
            Some(index) => *options.dparam.get(index).ok_or_else(|| {
                QueryError::Backend(format!(
                    "solver dparam has {} entries, mapping needs index {index}",
                    options.dparam.len()
                ))
            })?,
            None => 0.0,
        };
        Ok(SolverTraceSample {
            iterations: iterations.max(0) as u64,
            precision,
            local_precision,
            best_effort: !self.authoritative,
        })
    }
}

// ---------------------------------------------------------------------------
// SolverTraceSample
// ---------------------------------------------------------------------------

/// A mapped solver trace for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverTraceSample {
    /// Iterations spent on the step.
    pub iterations: u64,
    /// Global precision reached.
    pub precision: f64,
    /// Local precision reached, or 0 where the solver has none.
    pub local_precision: f64,
    /// Set when the sample came through the fallback mapping and the offsets
    /// may not mean what the columns claim.
    pub best_effort: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
