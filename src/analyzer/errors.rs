//! Fatal analysis errors
//!
//! Ordinary semantic problems are reported to the diagnostics sink and do
//! not stop analysis. The errors here do: no pruned tree is produced.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// No `void main()` method
    MissingEntryPoint,

    /// The tree has unfilled child slots (the parse did not complete)
    IncompleteTree,
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::MissingEntryPoint => {
                write!(f, "Main method not detected: expected 'void main()'")
            }
            AnalysisError::IncompleteTree => {
                write!(f, "Cannot analyze an incomplete syntax tree")
            }
        }
    }
}

impl std::error::Error for AnalysisError {}
