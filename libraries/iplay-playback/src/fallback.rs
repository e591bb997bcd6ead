//! Remote start fallback chain
//!
//! ```text
//! TryingRemote --NoActiveDevice--> TransferRetry --NoActiveDevice--> DeviceListRetry
//!      |                                |                                  |
//!      | ok                             | ok                  NoActiveDevice|   ok
//!      v                                v                                  v
//!     Done                             Done            FallbackLocal ---> Done
//!                                                            |
//!                                                            +--err--> Failed
//! ```
//!
//! Any error other than `NoActiveDevice` on a remote step ends the chain
//! immediately; auth and rate-limit problems are not device problems.

use crate::error::PlaybackError;
use crate::types::DeviceInfo;

/// Where the start sequence currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackStep {
    /// Transfer to our device if needed, then start
    TryingRemote,

    /// Transfer to our device again and retry once
    TransferRetry,

    /// Pick the best listed device, transfer with play, retry once
    DeviceListRetry,

    /// Play the preview clip instead
    FallbackLocal,

    /// Playback started
    Done,

    /// Sequence gave up with this error
    Failed(PlaybackError),
}

impl FallbackStep {
    /// Transition on the outcome of the current step
    pub fn advance(self, outcome: Result<(), PlaybackError>) -> FallbackStep {
        match (self, outcome) {
            (step @ (FallbackStep::Done | FallbackStep::Failed(_)), _) => step,
            (_, Ok(())) => FallbackStep::Done,
            (FallbackStep::TryingRemote, Err(PlaybackError::NoActiveDevice)) => {
                FallbackStep::TransferRetry
            }
            (FallbackStep::TransferRetry, Err(PlaybackError::NoActiveDevice)) => {
                FallbackStep::DeviceListRetry
            }
            (FallbackStep::DeviceListRetry, Err(PlaybackError::NoActiveDevice)) => {
                FallbackStep::FallbackLocal
            }
            (_, Err(err)) => FallbackStep::Failed(err),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            FallbackStep::TryingRemote | FallbackStep::TransferRetry | FallbackStep::DeviceListRetry
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FallbackStep::Done | FallbackStep::Failed(_))
    }
}

/// Choose a device to transfer to: ours, else the active one, else the first
pub fn pick_best_device<'a>(devices: &'a [DeviceInfo], own_id: Option<&str>) -> Option<&'a str> {
    let with_id = || devices.iter().filter_map(|d| d.id.as_deref().map(|id| (d, id)));

    own_id
        .and_then(|own| with_id().find(|(_, id)| *id == own))
        .or_else(|| with_id().find(|(d, _)| d.is_active))
        .or_else(|| with_id().next())
        .map(|(_, id)| id)
}
