// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use common::ObjectType;

use crate::{SalError, SalResult};

/// Prefix of the textual handle notation, e.g. `oid:0x21000000000000`.
pub const HANDLE_PREFIX: &str = "oid:";

const TYPE_SHIFT: u32 = 48;
const SEQUENCE_MASK: u64 = (1 << TYPE_SHIFT) - 1;

/// An opaque object handle.  The object type lives in the upper 16 bits and
/// a sequence number in the rest.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Handle(u64);

impl Handle {
    /// The null handle, `oid:0x0`.
    pub const NULL: Handle = Handle(0);

    pub fn new(ty: ObjectType, sequence: u64) -> Self {
        Handle(((ty.value() as u64) << TYPE_SHIFT) | (sequence & SEQUENCE_MASK))
    }

    pub fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// The sequence number, without the type bits.
    pub fn sequence(&self) -> u64 {
        self.0 & SEQUENCE_MASK
    }

    /// Decode the object type carried in the upper bits of the handle.
    pub fn object_type(&self) -> SalResult<ObjectType> {
        let value = (self.0 >> TYPE_SHIFT) as u16;
        ObjectType::from_value(value).ok_or_else(|| {
            SalError::Parse(format!("{self} has no valid object type"))
        })
    }

    /// Returns true if `s` looks like handle notation.
    pub fn is_handle(s: &str) -> bool {
        s.starts_with(HANDLE_PREFIX)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{HANDLE_PREFIX}{:#x}", self.0)
    }
}

impl FromStr for Handle {
    type Err = SalError;

    /// Accepts `oid:0x1f`, `0x1f` and plain decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bare = s.strip_prefix(HANDLE_PREFIX).unwrap_or(s);
        let parsed = match bare.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => bare.parse::<u64>(),
        };
        parsed
            .map(Handle)
            .map_err(|_| SalError::Parse(format!("invalid handle: {s}")))
    }
}

impl TryFrom<String> for Handle {
    type Error = SalError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Handle> for String {
    fn from(h: Handle) -> Self {
        h.to_string()
    }
}

fn handle_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"oid:0x[0-9a-fA-F]+").expect("handle pattern is valid")
    })
}

/// Find every handle embedded in `text`, e.g. in a list value
/// `2:oid:0x1,oid:0x2` or in the JSON rendering of a composite key.  A token
/// that looks like a handle but does not fit in 64 bits is an error.
pub fn scan_handles(text: &str) -> SalResult<Vec<(Range<usize>, Handle)>> {
    handle_pattern()
        .find_iter(text)
        .map(|m| Ok((m.range(), m.as_str().parse::<Handle>()?)))
        .collect()
}

/// Replace every non-null handle embedded in `text` with the result of `f`.
/// The null handle is left alone.
pub fn rewrite_handles<E: From<SalError>>(
    text: &str,
    mut f: impl FnMut(Handle) -> Result<Handle, E>,
) -> Result<String, E> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (range, handle) in scan_handles(text)? {
        out.push_str(&text[last..range.start]);
        if handle.is_null() {
            out.push_str(&text[range.clone()]);
        } else {
            out.push_str(&f(handle)?.to_string());
        }
        last = range.end;
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// The ordered field/value mapping that identifies an entry-style object,
/// such as a route or a neighbor.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeKey(Map<String, Value>);

impl CompositeKey {
    pub fn new(fields: Map<String, Value>) -> Self {
        CompositeKey(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }
}

impl fmt::Display for CompositeKey {
    /// The compact JSON rendering used on the wire.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rendered =
            serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl FromStr for CompositeKey {
    type Err = SalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
            .map(CompositeKey)
            .map_err(|e| SalError::Parse(format!("invalid key {s}: {e}")))
    }
}

/// How a created object is addressed.  Exactly one form is ever active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectRef {
    Handle(Handle),
    Key(CompositeKey),
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObjectRef::Handle(h) => h.fmt(f),
            ObjectRef::Key(k) => k.fmt(f),
        }
    }
}

impl FromStr for ObjectRef {
    type Err = SalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('{') {
            s.parse().map(ObjectRef::Key)
        } else {
            s.parse().map(ObjectRef::Handle)
        }
    }
}

impl From<Handle> for ObjectRef {
    fn from(h: Handle) -> Self {
        ObjectRef::Handle(h)
    }
}

impl From<CompositeKey> for ObjectRef {
    fn from(k: CompositeKey) -> Self {
        ObjectRef::Key(k)
    }
}

/// The target of a transport call: either a bare type, for creates that let
/// the device pick the handle, or a specific object of that type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectId {
    Type(ObjectType),
    Object { ty: ObjectType, object: ObjectRef },
}

impl ObjectId {
    pub fn new(ty: ObjectType, object: impl Into<ObjectRef>) -> Self {
        ObjectId::Object {
            ty,
            object: object.into(),
        }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectId::Type(ty) => *ty,
            ObjectId::Object { ty, .. } => *ty,
        }
    }

    pub fn object(&self) -> Option<&ObjectRef> {
        match self {
            ObjectId::Type(_) => None,
            ObjectId::Object { object, .. } => Some(object),
        }
    }

    pub fn handle(&self) -> Option<Handle> {
        match self.object() {
            Some(ObjectRef::Handle(h)) => Some(*h),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ObjectId::Type(ty) => write!(f, "{ty}"),
            ObjectId::Object { ty, object } => write!(f, "{ty}:{object}"),
        }
    }
}

impl FromStr for ObjectId {
    type Err = SalError;

    /// Parses `TYPE`, `TYPE:oid:0x..` or `TYPE:{json}`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ty, rest) = match s.split_once(':') {
            Some((ty, rest)) => (ty, Some(rest)),
            None => (s, None),
        };
        let ty = ty
            .parse::<ObjectType>()
            .map_err(|e| SalError::Parse(e.to_string()))?;
        match rest {
            None => Ok(ObjectId::Type(ty)),
            Some(object) => Ok(ObjectId::Object {
                ty,
                object: object.parse()?,
            }),
        }
    }
}
