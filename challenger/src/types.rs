// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! General types used throughout the harness.

use std::convert;

use common::{ObjectType, Status};
use sal::SalError;

pub type ChallengerResult<T> = Result<T, ChallengerError>;

#[derive(Debug, thiserror::Error)]
pub enum ChallengerError {
    #[error("I/O error: {ctx}: {err}")]
    Io { ctx: String, err: std::io::Error },
    #[error("Transport error: {0}")]
    Transport(SalError),
    /// A `$alias` reference named neither a registered object nor a
    /// default.
    #[error("Unresolved reference \"${alias}\"")]
    Substitution { alias: String },
    #[error(
        "Alias \"{alias}\" already names a {existing}, cannot create a \
         {requested}"
    )]
    AliasConflict {
        alias: String,
        existing: ObjectType,
        requested: ObjectType,
    },
    #[error("No such alias: {0}")]
    NoSuchAlias(String),
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error("Line {line}: malformed record: {reason}")]
    MalformedRecord { line: usize, reason: String },
    /// A record refers to a device handle that no earlier record created or
    /// reported.
    #[error("Line {line}: unknown handle {handle}")]
    UnknownHandle { line: usize, handle: String },
    #[error(
        "Line {line}: response reports {found} handles, but {expected} \
         were queued"
    )]
    ResponseMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },
}

impl ChallengerError {
    /// Was this raised while resolving a `$alias` reference?
    pub fn is_substitution(&self) -> bool {
        matches!(self, ChallengerError::Substitution { .. })
    }

    /// Was this raised by the object registry?
    pub fn is_registry(&self) -> bool {
        matches!(
            self,
            ChallengerError::AliasConflict { .. }
                | ChallengerError::NoSuchAlias(_)
        )
    }

    /// Is this a consistency failure found while replaying a log?
    pub fn is_replay(&self) -> bool {
        matches!(
            self,
            ChallengerError::MalformedRecord { .. }
                | ChallengerError::UnknownHandle { .. }
                | ChallengerError::ResponseMismatch { .. }
        )
    }

    /// The device status behind this error, if the device reported one.
    pub fn status(&self) -> Option<Status> {
        match self {
            ChallengerError::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// Did the device report the operation as unsupported or not
    /// implemented?  Callers typically skip rather than fail on these.
    pub fn is_skippable(&self) -> bool {
        self.status().is_some_and(|s| s.is_skippable())
    }
}

impl convert::From<SalError> for ChallengerError {
    fn from(err: SalError) -> Self {
        ChallengerError::Transport(err)
    }
}
