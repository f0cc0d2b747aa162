// crates/chronicle-loader/src/state.rs
//
// Phase machine for a load run.
//
// Valid transitions:
//   Opening -> Seeding -> Ingesting -> Closing
//   Any phase -> Closing

use std::fmt;

use thiserror::Error;

/// Lifecycle phases of a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    /// Session is being opened and bootstrap concepts seeded.
    Opening,
    /// Starter data is being published.
    Seeding,
    /// Release files are being ingested.
    Ingesting,
    /// Session is closing.
    Closing,
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadPhase::Opening => write!(f, "Opening"),
            LoadPhase::Seeding => write!(f, "Seeding"),
            LoadPhase::Ingesting => write!(f, "Ingesting"),
            LoadPhase::Closing => write!(f, "Closing"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid phase transition: {from} -> {to}")]
pub struct PhaseError {
    pub from: LoadPhase,
    pub to: LoadPhase,
}

/// Tracks the current phase of a load.
pub struct LoadStateMachine {
    pub current: LoadPhase,
}

impl LoadStateMachine {
    pub fn new() -> Self {
        Self {
            current: LoadPhase::Opening,
        }
    }

    /// Attempt to move to `next`.
    pub fn transition(&mut self, next: LoadPhase) -> Result<(), PhaseError> {
        let valid = matches!(
            (self.current, next),
            (_, LoadPhase::Closing)
                | (LoadPhase::Opening, LoadPhase::Seeding)
                | (LoadPhase::Seeding, LoadPhase::Ingesting)
        );
        if !valid {
            return Err(PhaseError {
                from: self.current,
                to: next,
            });
        }
        tracing::info!("Phase transition: {} -> {}", self.current, next);
        self.current = next;
        Ok(())
    }
}

impl Default for LoadStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
