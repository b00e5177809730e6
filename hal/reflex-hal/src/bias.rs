//! Bias-voltage oscillator

/// Free-running square-wave generator for the panel bias lines
///
/// Once started it must keep running undisturbed while frames are in
/// flight; only power sequencing starts and stops it.
pub trait BiasOscillator {
    /// Start the oscillator with the configured phase relationship
    fn start(&mut self);

    /// Stop the oscillator and force its outputs low
    fn stop(&mut self);

    /// Whether the oscillator is currently running
    fn is_running(&self) -> bool;
}
