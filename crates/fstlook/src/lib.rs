//! Lookup engine for finite state transducers in the AT&T text format.
//!
//! The crate compiles an AT&T transducer description into a dense in-memory
//! model and enumerates all analyses (output tapes) of an input word by
//! depth-first traversal, honoring weights and flag diacritics.
//!
//! # Architecture
//!
//! - [`encoding`] -- code-unit streams, BOM handling, character stepping
//! - [`symbols`] -- interned alphabet over a packed string arena
//! - [`flags`] -- flag diacritic parsing, compilation and application
//! - [`transition`] -- transition records and intra-state sort groups
//! - [`loader`] -- AT&T text parsing and model construction
//! - [`snapshot`] -- binary snapshot of a compiled model
//! - [`lookup`] -- recursive lookup over an encoded input word
//! - [`matrix`] -- sparse transition-histogram sink for FSA training

pub mod encoding;
pub mod flags;
pub mod loader;
pub mod lookup;
pub mod matrix;
pub mod snapshot;
pub mod symbols;
pub mod transition;

pub use encoding::Encoding;
pub use loader::{LoadOptions, Transducer};
pub use lookup::{Lookup, PathValue};

/// Error type for model loading and snapshot IO.
///
/// Lookup itself never fails: malformed input characters become
/// unknown-symbol tape positions and bound exceedance returns silently.
#[derive(Debug, thiserror::Error)]
pub enum FstError {
    #[error("AT&T file at line {line}: {msg}")]
    Parse { line: usize, msg: String },
    #[error("AT&T file at line {line}: state {state:?} was already closed, transitions of a state must be contiguous")]
    StateOrder { line: usize, state: String },
    #[error("{0}")]
    Overflow(String),
    #[error("snapshot mismatch: {0}")]
    SnapshotMismatch(String),
    #[error("invalid byte sequence near offset {at}")]
    Encoding { at: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// How flag diacritics are treated during lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlagStrategy {
    /// Skip every flag check and take the transition unconditionally.
    Ignore,
    /// Enforce flag constraints; a failed check prunes the branch.
    #[default]
    Obey,
    /// Return only paths on which at least one flag check failed.
    Negative,
}

/// Storage width of the compiled model: governs the flag-state bit budget
/// and the field width of the binary snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Width {
    #[default]
    W32,
    W64,
}

impl Width {
    /// Number of bits available to the packed flag state.
    pub fn bits(self) -> u8 {
        match self {
            Width::W32 => 32,
            Width::W64 => 64,
        }
    }

    /// The value of the width word in a binary snapshot.
    pub fn tag(self) -> u32 {
        self.bits() as u32
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            32 => Some(Width::W32),
            64 => Some(Width::W64),
            _ => None,
        }
    }
}
