// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use common::Status;

use crate::{Handle, SalError, SalResult, HANDLE_PREFIX};

/// A decoded device response, e.g. `["SAI_SWITCH_ATTR_CPU_PORT",
/// "oid:0x1000000000003"]`.  The payload is kept as received and decoded on
/// demand by the accessors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultValue {
    raw: String,
}

impl ResultValue {
    pub fn new(raw: impl Into<String>) -> Self {
        ResultValue { raw: raw.into() }
    }

    /// Build a response from its already-decoded fields.
    pub fn from_fields<S: AsRef<str>>(fields: &[S]) -> Self {
        let fields: Vec<&str> = fields.iter().map(|f| f.as_ref()).collect();
        ResultValue {
            raw: Value::from(fields).to_string(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn json(&self) -> SalResult<Value> {
        serde_json::from_str(&self.raw).map_err(|e| {
            SalError::Parse(format!("malformed response {}: {e}", self.raw))
        })
    }

    /// The response as a list of strings.
    pub fn fields(&self) -> SalResult<Vec<String>> {
        serde_json::from_str(&self.raw).map_err(|e| {
            SalError::Parse(format!("malformed response {}: {e}", self.raw))
        })
    }

    fn field(&self, idx: usize) -> SalResult<String> {
        self.fields()?.into_iter().nth(idx).ok_or_else(|| {
            SalError::Parse(format!("response {} has no field {idx}", self.raw))
        })
    }

    /// The value of a single-attribute response.  Booleans are normalized to
    /// lower case.
    pub fn value(&self) -> SalResult<String> {
        let v = self.field(1)?;
        match v.as_str() {
            "True" | "TRUE" => Ok("true".to_string()),
            "False" | "FALSE" => Ok("false".to_string()),
            _ => Ok(v),
        }
    }

    pub fn uint32(&self) -> SalResult<u32> {
        let v = self.value()?;
        v.parse::<u32>().map_err(|_| {
            SalError::Parse(format!("{v} is not an unsigned 32-bit value"))
        })
    }

    /// The handle at field `idx`.  A field that is not in handle notation
    /// yields the null handle.
    pub fn handle(&self, idx: usize) -> SalResult<Handle> {
        let v = self.field(idx)?;
        if v.contains(HANDLE_PREFIX) {
            v.parse()
        } else {
            Ok(Handle::NULL)
        }
    }

    /// The elements of an `N:a,b,...` list at field `idx`.  A zero or
    /// malformed count yields an empty list.
    pub fn to_list(&self, idx: usize) -> SalResult<Vec<String>> {
        Ok(parse_list(&self.field(idx)?))
    }

    /// The handles of an `N:oid:..,oid:..` list at field `idx`.  Returns an
    /// empty list if the elements are not handles.
    pub fn handles(&self, idx: usize) -> SalResult<Vec<Handle>> {
        let elems = self.to_list(idx)?;
        match elems.first() {
            Some(first) if first.contains(HANDLE_PREFIX) => {
                elems.iter().map(|e| e.parse()).collect()
            }
            _ => Ok(Vec::new()),
        }
    }

    /// A `[name, count, name, count, ...]` response as a map.
    pub fn counters(&self) -> SalResult<BTreeMap<String, u64>> {
        let fields = self.fields()?;
        fields
            .chunks(2)
            .map(|pair| match pair {
                [name, count] => count
                    .parse::<u64>()
                    .map(|c| (name.clone(), c))
                    .map_err(|_| {
                        SalError::Parse(format!("bad counter {name}={count}"))
                    }),
                _ => Err(SalError::Parse(format!(
                    "counter list {} has odd length",
                    self.raw
                ))),
            })
            .collect()
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split an `N:a,b,...` list value into its elements.
pub fn parse_list(value: &str) -> Vec<String> {
    let Some((count, elems)) = value.split_once(':') else {
        return Vec::new();
    };
    match count.parse::<usize>() {
        Ok(0) | Err(_) => Vec::new(),
        Ok(_) => elems.split(',').map(str::to_string).collect(),
    }
}

/// What to do when the device reports a failure status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPolicy {
    /// Turn any non-success status into an error.
    #[default]
    Assert,
    /// Hand the status back to the caller.
    Tolerate,
}

/// The status of a device operation together with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<T> {
    pub status: Status,
    pub value: T,
}

impl<T> Reply<T> {
    pub fn new(status: Status, value: T) -> Self {
        Reply { status, value }
    }

    pub fn success(value: T) -> Self {
        Reply {
            status: Status::Success,
            value,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Apply `policy` to the reply for operation `op` on `target`.
    pub fn check(
        self,
        policy: StatusPolicy,
        op: &str,
        target: impl fmt::Display,
    ) -> SalResult<Self> {
        match policy {
            StatusPolicy::Assert if !self.status.is_success() => {
                Err(SalError::Status {
                    op: op.to_string(),
                    target: target.to_string(),
                    status: self.status,
                })
            }
            _ => Ok(self),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        Reply {
            status: self.status,
            value: f(self.value),
        }
    }
}

/// The outcome of a bulk operation: an overall status plus one status per
/// member, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkReply {
    pub status: Status,
    pub statuses: Vec<Status>,
}

impl BulkReply {
    /// Derive the overall status from the member statuses.
    pub fn from_statuses(statuses: Vec<Status>) -> Self {
        let status = if statuses.iter().all(Status::is_success) {
            Status::Success
        } else {
            Status::Failure
        };
        BulkReply { status, statuses }
    }

    pub fn check(
        self,
        policy: StatusPolicy,
        op: &str,
        target: impl fmt::Display,
    ) -> SalResult<Self> {
        match policy {
            StatusPolicy::Assert if !self.status.is_success() => {
                Err(SalError::Status {
                    op: op.to_string(),
                    target: target.to_string(),
                    status: self.status,
                })
            }
            _ => Ok(self),
        }
    }
}
