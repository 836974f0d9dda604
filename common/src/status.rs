// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ParseError;

const STATUS_PREFIX: &str = "SAI_STATUS_";

// Attribute-indexed statuses occupy a range of 0x10000 codes each, starting
// at these bases and counting downward with the attribute index.
const INVALID_ATTRIBUTE_BASE: i32 = -0x10000;
const INVALID_ATTR_VALUE_BASE: i32 = -0x20000;
const ATTR_NOT_IMPLEMENTED_BASE: i32 = -0x30000;
const UNKNOWN_ATTRIBUTE_BASE: i32 = -0x40000;
const ATTR_NOT_SUPPORTED_BASE: i32 = -0x50000;
const ATTR_RANGE: i32 = 0x10000;

/// Completion status of a single device operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Status {
    Success,
    Failure,
    NotSupported,
    NoMemory,
    InsufficientResources,
    InvalidParameter,
    ItemAlreadyExists,
    ItemNotFound,
    BufferOverflow,
    InvalidPortNumber,
    InvalidPortMember,
    InvalidVlanId,
    Uninitialized,
    TableFull,
    MandatoryAttributeMissing,
    NotImplemented,
    AddrNotFound,
    ObjectInUse,
    InvalidObjectType,
    InvalidObjectId,
    InvalidNvStorage,
    NvStorageFull,
    SwUpgradeVersionMismatch,
    NotExecuted,
    /// The attribute at the given index of the request is invalid.
    InvalidAttribute(u16),
    /// The value of the attribute at the given index is invalid.
    InvalidAttrValue(u16),
    AttrNotImplemented(u16),
    UnknownAttribute(u16),
    AttrNotSupported(u16),
}

// Statuses without an attribute index, in code order starting from zero.
const SIMPLE: [(Status, &str); 24] = [
    (Status::Success, "SUCCESS"),
    (Status::Failure, "FAILURE"),
    (Status::NotSupported, "NOT_SUPPORTED"),
    (Status::NoMemory, "NO_MEMORY"),
    (Status::InsufficientResources, "INSUFFICIENT_RESOURCES"),
    (Status::InvalidParameter, "INVALID_PARAMETER"),
    (Status::ItemAlreadyExists, "ITEM_ALREADY_EXISTS"),
    (Status::ItemNotFound, "ITEM_NOT_FOUND"),
    (Status::BufferOverflow, "BUFFER_OVERFLOW"),
    (Status::InvalidPortNumber, "INVALID_PORT_NUMBER"),
    (Status::InvalidPortMember, "INVALID_PORT_MEMBER"),
    (Status::InvalidVlanId, "INVALID_VLAN_ID"),
    (Status::Uninitialized, "UNINITIALIZED"),
    (Status::TableFull, "TABLE_FULL"),
    (Status::MandatoryAttributeMissing, "MANDATORY_ATTRIBUTE_MISSING"),
    (Status::NotImplemented, "NOT_IMPLEMENTED"),
    (Status::AddrNotFound, "ADDR_NOT_FOUND"),
    (Status::ObjectInUse, "OBJECT_IN_USE"),
    (Status::InvalidObjectType, "INVALID_OBJECT_TYPE"),
    (Status::InvalidObjectId, "INVALID_OBJECT_ID"),
    (Status::InvalidNvStorage, "INVALID_NV_STORAGE"),
    (Status::NvStorageFull, "NV_STORAGE_FULL"),
    (Status::SwUpgradeVersionMismatch, "SW_UPGRADE_VERSION_MISMATCH"),
    (Status::NotExecuted, "NOT_EXECUTED"),
];

const INDEXED: [(&str, i32, fn(u16) -> Status); 5] = [
    ("INVALID_ATTRIBUTE_", INVALID_ATTRIBUTE_BASE, Status::InvalidAttribute),
    ("INVALID_ATTR_VALUE_", INVALID_ATTR_VALUE_BASE, Status::InvalidAttrValue),
    (
        "ATTR_NOT_IMPLEMENTED_",
        ATTR_NOT_IMPLEMENTED_BASE,
        Status::AttrNotImplemented,
    ),
    ("UNKNOWN_ATTRIBUTE_", UNKNOWN_ATTRIBUTE_BASE, Status::UnknownAttribute),
    ("ATTR_NOT_SUPPORTED_", ATTR_NOT_SUPPORTED_BASE, Status::AttrNotSupported),
];

impl Status {
    /// The numeric status code as defined by the device API.
    pub fn code(&self) -> i32 {
        match self {
            Status::InvalidAttribute(i) => INVALID_ATTRIBUTE_BASE - *i as i32,
            Status::InvalidAttrValue(i) => INVALID_ATTR_VALUE_BASE - *i as i32,
            Status::AttrNotImplemented(i) => {
                ATTR_NOT_IMPLEMENTED_BASE - *i as i32
            }
            Status::UnknownAttribute(i) => UNKNOWN_ATTRIBUTE_BASE - *i as i32,
            Status::AttrNotSupported(i) => ATTR_NOT_SUPPORTED_BASE - *i as i32,
            simple => {
                let idx = SIMPLE
                    .iter()
                    .position(|(s, _)| s == simple)
                    .unwrap_or_default();
                -(idx as i32)
            }
        }
    }

    pub fn from_code(code: i32) -> Option<Status> {
        if code <= 0 && code > -(SIMPLE.len() as i32) {
            return Some(SIMPLE[(-code) as usize].0);
        }
        INDEXED.iter().find_map(|(_, base, build)| {
            let offset = base - code;
            (0..ATTR_RANGE)
                .contains(&offset)
                .then(|| build(offset as u16))
        })
    }

    pub fn is_success(&self) -> bool {
        *self == Status::Success
    }

    /// The operation was refused because the device does not support or
    /// implement it.  Test harnesses skip instead of failing on these.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Status::NotSupported
                | Status::NotImplemented
                | Status::AttrNotSupported(_)
                | Status::AttrNotImplemented(_)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let indexed = |prefix: &str, i: &u16| format!("{prefix}{i}");
        let name = match self {
            Status::InvalidAttribute(i) => indexed("INVALID_ATTRIBUTE_", i),
            Status::InvalidAttrValue(i) => indexed("INVALID_ATTR_VALUE_", i),
            Status::AttrNotImplemented(i) => {
                indexed("ATTR_NOT_IMPLEMENTED_", i)
            }
            Status::UnknownAttribute(i) => indexed("UNKNOWN_ATTRIBUTE_", i),
            Status::AttrNotSupported(i) => indexed("ATTR_NOT_SUPPORTED_", i),
            simple => SIMPLE
                .iter()
                .find(|(s, _)| s == simple)
                .map(|(_, n)| n.to_string())
                .unwrap_or_default(),
        };
        write!(f, "{STATUS_PREFIX}{name}")
    }
}

impl FromStr for Status {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::Status(s.to_string());
        let name = s.strip_prefix(STATUS_PREFIX).unwrap_or(s);
        if let Some((status, _)) = SIMPLE.iter().find(|(_, n)| *n == name) {
            return Ok(*status);
        }
        for (prefix, _, build) in INDEXED.iter() {
            if let Some(idx) = name.strip_prefix(prefix) {
                return idx.parse::<u16>().map(build).map_err(|_| err());
            }
        }
        Err(err())
    }
}

impl TryFrom<String> for Status {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Status> for String {
    fn from(s: Status) -> Self {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_strings() {
        assert_eq!(Status::Success.to_string(), "SAI_STATUS_SUCCESS");
        assert_eq!(
            Status::AttrNotSupported(0).to_string(),
            "SAI_STATUS_ATTR_NOT_SUPPORTED_0"
        );
        assert_eq!(
            "SAI_STATUS_ITEM_NOT_FOUND".parse::<Status>().unwrap(),
            Status::ItemNotFound
        );
        assert_eq!(
            "SAI_STATUS_INVALID_ATTR_VALUE_3".parse::<Status>().unwrap(),
            Status::InvalidAttrValue(3)
        );
        assert!("SAI_STATUS_BOGUS".parse::<Status>().is_err());
        assert!("SAI_STATUS_UNKNOWN_ATTRIBUTE_x".parse::<Status>().is_err());
    }

    #[test]
    fn test_codes() {
        assert_eq!(Status::Success.code(), 0);
        assert_eq!(Status::Failure.code(), -1);
        assert_eq!(Status::InvalidPortMember.code(), -0xa);
        assert_eq!(Status::NotExecuted.code(), -0x17);
        assert_eq!(Status::InvalidAttribute(0).code(), -0x10000);
        assert_eq!(Status::AttrNotSupported(2).code(), -0x50002);

        assert_eq!(Status::from_code(-0x11), Some(Status::ObjectInUse));
        assert_eq!(
            Status::from_code(-0x30005),
            Some(Status::AttrNotImplemented(5))
        );
        assert_eq!(Status::from_code(-0x18), None);
        assert_eq!(Status::from_code(1), None);
    }

    #[test]
    fn test_skippable() {
        assert!(Status::NotSupported.is_skippable());
        assert!(Status::NotImplemented.is_skippable());
        assert!(Status::AttrNotSupported(4).is_skippable());
        assert!(Status::AttrNotImplemented(0).is_skippable());
        assert!(!Status::Failure.is_skippable());
        assert!(!Status::InvalidAttribute(0).is_skippable());
        assert!(!Status::Success.is_skippable());
    }
}
