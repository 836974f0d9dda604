// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};

use common::Status;
use sal::{Attr, Attrs, SalError, SalResult};

/// The operations understood by the responder, as named on the broker.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr,
)]
pub enum Op {
    #[strum(serialize = "Screate")]
    Create,
    #[strum(serialize = "Dremove")]
    Remove,
    #[strum(serialize = "Sset")]
    Set,
    #[strum(serialize = "Sget")]
    Get,
    #[strum(serialize = "Sbulkcreate")]
    BulkCreate,
    #[strum(serialize = "Dbulkremove")]
    BulkRemove,
    #[strum(serialize = "Sbulkset")]
    BulkSet,
    #[strum(serialize = "Sget_stats")]
    GetStats,
    #[strum(serialize = "Sclear_stats")]
    ClearStats,
    #[strum(serialize = "Sflush")]
    Flush,
}

impl Op {
    /// The op name the responder answers with, e.g. `getresponse`.
    pub fn response(&self) -> String {
        let name: &'static str = self.into();
        format!("{}response", &name[1..])
    }
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> SalResult<String> {
    serde_json::to_string(value)
        .map_err(|e| SalError::Internal(format!("encoding request: {e}")))
}

pub fn string_list(data: &str) -> SalResult<Vec<String>> {
    serde_json::from_str(data)
        .map_err(|e| SalError::Parse(format!("bad value list {data}: {e}")))
}

pub fn encode_statuses(statuses: &[Status]) -> SalResult<String> {
    let names: Vec<String> = statuses.iter().map(Status::to_string).collect();
    to_json(&names)
}

pub fn decode_statuses(data: &str) -> SalResult<Vec<Status>> {
    string_list(data)?
        .iter()
        .map(|s| {
            s.parse::<Status>()
                .map_err(|e| SalError::Parse(e.to_string()))
        })
        .collect()
}

pub fn parse_attr(text: &str) -> SalResult<Attr> {
    text.split_once('=')
        .map(|(name, value)| Attr::new(name, value))
        .ok_or_else(|| SalError::Parse(format!("bad attribute: {text}")))
}

/// Parse the `a=v|b=w` form.
pub fn parse_piped(text: &str) -> SalResult<Attrs> {
    if text.is_empty() {
        return Ok(Attrs::new());
    }
    text.split('|').map(parse_attr).collect()
}
