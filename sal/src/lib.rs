// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! The switch abstraction layer: the object model shared by every transport
//! and the `Transport` trait the core drives them through.

use std::time::Duration;

use thiserror::Error;

use common::{ObjectType, Status};

mod attr;
pub use attr::*;

mod handle;
pub use handle::*;

mod reply;
pub use reply::*;

/// A specialized Result type for transport operations
pub type SalResult<T> = Result<T, SalError>;

/// Error type conveying additional information about transport errors
#[derive(Error, Debug)]
pub enum SalError {
    /// The device completed the operation with a non-success status, and the
    /// caller asked for failures to be asserted.
    #[error("{op} {target} failed: {status}")]
    Status {
        op: String,
        target: String,
        status: Status,
    },
    /// No response arrived within the polling budget.
    #[error("{op} timed out after {waited:?}")]
    Timeout { op: String, waited: Duration },
    /// The far side of the transport has gone away.
    #[error("Transport disconnected: {}", .0)]
    Disconnected(String),
    /// An argument passed to the transport layer is invalid or inappropriate.
    /// This indicates misbehavior from the caller.
    #[error("Invalid argument: {}", .0)]
    InvalidArg(String),
    /// A handle, key or response could not be decoded.
    #[error("Parse error: {}", .0)]
    Parse(String),
    /// The transport layer detected some internal inconsistency
    #[error("Internal error: {}", .0)]
    Internal(String),
    /// An error derived from a purposely triggered synthetic fault for testing
    /// purposes.
    #[error("Synthetic transport error: {}", .0)]
    Synthetic(String),
}

impl SalError {
    /// The device status behind this error, if it came from the device.
    pub fn status(&self) -> Option<Status> {
        match self {
            SalError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The `Transport` trait contains the operations the harness needs from a
/// switch, whatever sits between the harness and the device.  Every
/// operation reports the device's status alongside its payload; failures of
/// the transport itself are reported as errors.
pub trait Transport {
    /// Create an object.  If `id` names only a type, the device picks the
    /// handle and returns it.  Otherwise the handle or key in `id` is used.
    fn create(
        &self,
        id: &ObjectId,
        attrs: &Attrs,
    ) -> SalResult<Reply<Option<ObjectRef>>>;

    /// Remove an existing object.
    fn remove(&self, id: &ObjectId) -> SalResult<Reply<()>>;

    /// Update a single attribute of an existing object.
    fn set(&self, id: &ObjectId, attr: &Attr) -> SalResult<Reply<()>>;

    /// Read the attributes named in `attrs`.  The values in `attrs` carry
    /// hints such as the capacity of list attributes.
    fn get(&self, id: &ObjectId, attrs: &Attrs)
        -> SalResult<Reply<ResultValue>>;

    /// Create several objects of one type.  `attrs` holds either one list
    /// per key, or a single list applied to every key.
    fn bulk_create(
        &self,
        ty: ObjectType,
        keys: &[ObjectRef],
        attrs: &[Attrs],
    ) -> SalResult<BulkReply>;

    fn bulk_remove(
        &self,
        ty: ObjectType,
        keys: &[ObjectRef],
    ) -> SalResult<BulkReply>;

    /// Set one attribute on each of several objects.  `attrs[i]` applies to
    /// `keys[i]`.
    fn bulk_set(
        &self,
        ty: ObjectType,
        keys: &[ObjectRef],
        attrs: &[Attr],
    ) -> SalResult<BulkReply>;

    /// Read the named counters of an object.
    fn get_stats(
        &self,
        id: &ObjectId,
        counters: &[String],
    ) -> SalResult<Reply<ResultValue>>;

    fn clear_stats(
        &self,
        id: &ObjectId,
        counters: &[String],
    ) -> SalResult<Reply<()>>;

    /// Report the type of the object behind `handle`.
    fn vid_to_type(&self, handle: Handle) -> SalResult<ObjectType> {
        handle.object_type()
    }

    /// Return the device to its pristine state, dropping every object.
    fn flush(&self) -> SalResult<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn create(
        &self,
        id: &ObjectId,
        attrs: &Attrs,
    ) -> SalResult<Reply<Option<ObjectRef>>> {
        (**self).create(id, attrs)
    }

    fn remove(&self, id: &ObjectId) -> SalResult<Reply<()>> {
        (**self).remove(id)
    }

    fn set(&self, id: &ObjectId, attr: &Attr) -> SalResult<Reply<()>> {
        (**self).set(id, attr)
    }

    fn get(
        &self,
        id: &ObjectId,
        attrs: &Attrs,
    ) -> SalResult<Reply<ResultValue>> {
        (**self).get(id, attrs)
    }

    fn bulk_create(
        &self,
        ty: ObjectType,
        keys: &[ObjectRef],
        attrs: &[Attrs],
    ) -> SalResult<BulkReply> {
        (**self).bulk_create(ty, keys, attrs)
    }

    fn bulk_remove(
        &self,
        ty: ObjectType,
        keys: &[ObjectRef],
    ) -> SalResult<BulkReply> {
        (**self).bulk_remove(ty, keys)
    }

    fn bulk_set(
        &self,
        ty: ObjectType,
        keys: &[ObjectRef],
        attrs: &[Attr],
    ) -> SalResult<BulkReply> {
        (**self).bulk_set(ty, keys, attrs)
    }

    fn get_stats(
        &self,
        id: &ObjectId,
        counters: &[String],
    ) -> SalResult<Reply<ResultValue>> {
        (**self).get_stats(id, counters)
    }

    fn clear_stats(
        &self,
        id: &ObjectId,
        counters: &[String],
    ) -> SalResult<Reply<()>> {
        (**self).clear_stats(id, counters)
    }

    fn vid_to_type(&self, handle: Handle) -> SalResult<ObjectType> {
        (**self).vid_to_type(handle)
    }

    fn flush(&self) -> SalResult<()> {
        (**self).flush()
    }
}

/// Expand a bulk attribute argument to one attribute list per key.
pub fn broadcast_attrs<'a>(
    keys: &[ObjectRef],
    attrs: &'a [Attrs],
) -> SalResult<Vec<&'a Attrs>> {
    match attrs.len() {
        n if n == keys.len() => Ok(attrs.iter().collect()),
        1 => Ok(vec![&attrs[0]; keys.len()]),
        n => Err(SalError::InvalidArg(format!(
            "{n} attribute lists supplied for {} keys",
            keys.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast() {
        let keys = vec![
            ObjectRef::Handle(Handle::new(ObjectType::Port, 1)),
            ObjectRef::Handle(Handle::new(ObjectType::Port, 2)),
        ];
        let one = vec![Attrs::new().with("SAI_PORT_ATTR_MTU", "9100")];
        assert_eq!(broadcast_attrs(&keys, &one).unwrap().len(), 2);

        let three = vec![Attrs::new(), Attrs::new(), Attrs::new()];
        assert!(broadcast_attrs(&keys, &three).is_err());
    }

    #[test]
    fn test_error_status() {
        let e = SalError::Status {
            op: "create".into(),
            target: "SAI_OBJECT_TYPE_VLAN".into(),
            status: Status::ItemAlreadyExists,
        };
        assert_eq!(e.status(), Some(Status::ItemAlreadyExists));
        assert_eq!(
            e.to_string(),
            "create SAI_OBJECT_TYPE_VLAN failed: SAI_STATUS_ITEM_ALREADY_EXISTS"
        );
        assert_eq!(SalError::Internal("x".into()).status(), None);
    }
}
