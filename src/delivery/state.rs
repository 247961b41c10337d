// src/delivery/state.rs
//! The delivery state machine.
//!
//! Strictly linear: each step either advances to the next state or moves
//! straight to `Failed`, remembering where it was. There is no way back.

use crate::error::{AppError, FailureKind};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryState {
    Init,
    SessionReady,
    Authenticated,
    ComposerOpen,
    ContentFilled,
    Submitted,
    Delivered,
    Failed,
}

impl DeliveryState {
    /// The state a successful step moves to. Terminal states have none.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::SessionReady),
            Self::SessionReady => Some(Self::Authenticated),
            Self::Authenticated => Some(Self::ComposerOpen),
            Self::ComposerOpen => Some(Self::ContentFilled),
            Self::ContentFilled => Some(Self::Submitted),
            Self::Submitted => Some(Self::Delivered),
            Self::Delivered | Self::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::SessionReady => "SESSION_READY",
            Self::Authenticated => "AUTHENTICATED",
            Self::ComposerOpen => "COMPOSER_OPEN",
            Self::ContentFilled => "CONTENT_FILLED",
            Self::Submitted => "SUBMITTED",
            Self::Delivered => "DELIVERED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a delivery run ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryFailure {
    /// Last state reached before the failing step.
    pub failed_in: DeliveryState,
    pub kind: FailureKind,
    pub message: String,
}

/// Record of one delivery run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryReport {
    /// Every state visited, in order, ending with the terminal state.
    pub visited: Vec<DeliveryState>,
    pub failure: Option<DeliveryFailure>,
}

impl DeliveryReport {
    pub fn terminal(&self) -> DeliveryState {
        self.visited.last().copied().unwrap_or(DeliveryState::Init)
    }

    pub fn is_delivered(&self) -> bool {
        self.terminal() == DeliveryState::Delivered
    }
}

/// Tracks progress through [`DeliveryState`].
#[derive(Debug)]
pub struct DeliveryMachine {
    state: DeliveryState,
    visited: Vec<DeliveryState>,
}

impl Default for DeliveryMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryMachine {
    pub fn new() -> Self {
        Self {
            state: DeliveryState::Init,
            visited: vec![DeliveryState::Init],
        }
    }

    pub fn state(&self) -> DeliveryState {
        self.state
    }

    /// Moves to the next state after a successful step.
    pub fn advance(&mut self) -> DeliveryState {
        if let Some(next) = self.state.next() {
            log::info!("Delivery: {} -> {}", self.state, next);
            self.state = next;
            self.visited.push(next);
        }
        self.state
    }

    /// Ends the run in `Failed`, recording where the failure happened.
    pub fn fail(mut self, error: &AppError) -> DeliveryReport {
        let failed_in = match error {
            AppError::StepFailure { state, .. } => *state,
            _ => self.state,
        };
        log::error!("Delivery failed in {}: {}", failed_in, error);

        self.visited.push(DeliveryState::Failed);
        DeliveryReport {
            visited: self.visited,
            failure: Some(DeliveryFailure {
                failed_in,
                kind: error.kind(),
                message: error.to_string(),
            }),
        }
    }

    /// Ends the run; only a machine that reached `Delivered` succeeds.
    pub fn finish(self) -> DeliveryReport {
        if self.state == DeliveryState::Delivered {
            return DeliveryReport {
                visited: self.visited,
                failure: None,
            };
        }
        let error = AppError::step_failure(self.state, "delivery sequence ended early");
        self.fail(&error)
    }
}
