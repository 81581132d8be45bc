//! # Outcome of a body or cleanup action.
//!
//! Bodies and cleanups may return `()` or `Result<(), E>`; [`Outcome`] folds both
//! into `Result<(), String>` so the runner can record failures uniformly.

use std::fmt::Display;

/// Values a test body or cleanup action may produce.
///
/// # Example
/// ```
/// use depscope::Outcome;
///
/// assert!(().into_result().is_ok());
/// assert_eq!(Err::<(), _>("boom").into_result(), Err("boom".to_string()));
/// ```
pub trait Outcome {
    /// `Ok(())` on success, the rendered error otherwise.
    fn into_result(self) -> Result<(), String>;
}

impl Outcome for () {
    fn into_result(self) -> Result<(), String> {
        Ok(())
    }
}

impl<E: Display> Outcome for Result<(), E> {
    fn into_result(self) -> Result<(), String> {
        self.map_err(|e| e.to_string())
    }
}
