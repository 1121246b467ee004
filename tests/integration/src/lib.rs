//! Cross-crate scenario tests for the skysentry platform.
//!
//! Drives the real patrol controller against the simulated vehicle, a
//! scripted detector, and a recording transport double.

pub mod test_utils;

#[cfg(test)]
mod patrol_scenarios;

#[cfg(test)]
mod tamper_scenarios;
