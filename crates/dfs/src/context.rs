//! Per-call operation context.
//!
//! The engine keeps no global state; every knob that used to be ambient is
//! carried explicitly in an [`OpContext`] passed through the calls that need
//! it.

/// How validation findings are surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WarnMode {
    /// Suppress warnings entirely.
    None,
    /// Report the first warning, then stop checking.
    #[default]
    First,
    /// Enumerate every warning.
    All,
}

/// Context record threaded through engine calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpContext {
    pub warn_mode: WarnMode,
    /// Batch callers keep going after a recoverable per-file failure.
    pub continue_on_error: bool,
    /// Tolerate missing files on delete and similar soft lookups.
    pub silent: bool,
}
