// SPDX-License-Identifier: MIT
//! Error taxonomy shared by every fallible path in the client core.

use thiserror::Error;

/// What went wrong, from the caller's point of view.
///
/// Snapshot failures surface as a terminal loading error; mutation failures
/// go back to the submit caller with the store untouched; channel failures
/// below [`ClientError::ChannelLost`] are recovered internally and never
/// reach presentation code.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network failure, connection refusal, or a non-success response that
    /// is not a validation reject.
    #[error("transport error: {0}")]
    Transport(String),

    /// A payload arrived but could not be interpreted.
    #[error("decode error: {0}")]
    Decode(String),

    /// The server rejected the submitted input.
    #[error("rejected by server: {0}")]
    Validation(String),

    /// The live channel exhausted its reconnect budget and gave up.
    /// Already-loaded tasks stay valid; only new live updates are missed.
    #[error("live channel lost after {attempts} failed connection attempts")]
    ChannelLost { attempts: u32 },
}

impl ClientError {
    pub(crate) fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
