// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Vocabulary shared by every crate in the workspace: object types, status
//! codes and the logging setup.

use thiserror::Error;

pub mod logging;
mod object_type;
mod status;

pub use object_type::{ObjectType, OBJECT_TYPE_PREFIX};
pub use status::Status;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown object type: {0}")]
    ObjectType(String),
    #[error("Unknown status: {0}")]
    Status(String),
}
