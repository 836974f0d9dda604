// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

/// Virtual handles are the harness's own names for device objects.  They
/// encode the object type in the upper 16 bits, like device handles, and
/// draw the lower bits from a single sequence shared by every type.  Handles
/// are never reused for the life of the allocator, even across a `clear()`.
use std::collections::BTreeMap;

use slog::{debug, o, trace};

use common::ObjectType;
use sal::Handle;

pub struct VidAllocator {
    log: slog::Logger,
    // The sequence number of the most recently issued handle
    last: u64,
    // Has a SWITCH handle been issued yet?  The first one gets sequence 0.
    switch_issued: bool,
    // Handles previously issued for a (type, key) pair
    cache: BTreeMap<ObjectType, BTreeMap<String, Handle>>,
}

impl VidAllocator {
    pub fn new(log: &slog::Logger) -> Self {
        let log = log.new(o!("unit" => "vid"));
        debug!(log, "created new virtual handle allocator");
        VidAllocator {
            log,
            last: 0,
            switch_issued: false,
            cache: BTreeMap::new(),
        }
    }

    /// Issue a handle that has never been issued before.
    pub fn allocate(&mut self, ty: ObjectType) -> Handle {
        let sequence = if ty == ObjectType::Switch && !self.switch_issued {
            0
        } else {
            self.last += 1;
            self.last
        };
        if ty == ObjectType::Switch {
            self.switch_issued = true;
        }
        let handle = Handle::new(ty, sequence);
        trace!(self.log, "allocated {handle} for {ty}");
        handle
    }

    /// Return the handle already issued for `key`, allocating one on first
    /// use.
    pub fn get_or_allocate(&mut self, ty: ObjectType, key: &str) -> Handle {
        if let Some(handle) = self.lookup(ty, key) {
            return handle;
        }
        let handle = self.allocate(ty);
        self.cache
            .entry(ty)
            .or_default()
            .insert(key.to_string(), handle);
        handle
    }

    pub fn lookup(&self, ty: ObjectType, key: &str) -> Option<Handle> {
        self.cache.get(&ty).and_then(|m| m.get(key)).copied()
    }

    /// Every cached key of `ty` and its handle.
    pub fn cached(&self, ty: ObjectType) -> BTreeMap<String, Handle> {
        self.cache.get(&ty).cloned().unwrap_or_default()
    }

    /// Forget the handle cached for `key`.  The handle itself is not
    /// returned to the pool.
    pub fn pop(&mut self, ty: ObjectType, key: &str) -> Option<Handle> {
        let handle = self.cache.get_mut(&ty)?.remove(key);
        if let Some(h) = handle {
            trace!(self.log, "dropped {h} for {ty} {key}");
        }
        handle
    }

    /// Drop the whole cache.
    pub fn clear(&mut self) {
        debug!(self.log, "cleared handle cache"; "last" => self.last);
        self.cache.clear();
    }

    /// The number of handles issued so far.
    pub fn issued(&self) -> u64 {
        self.last + u64::from(self.switch_issued)
    }
}

#[cfg(test)]
fn new_allocator() -> VidAllocator {
    let log = crate::test_log();
    VidAllocator::new(&log)
}

#[test]
fn test_first_switch() {
    let mut vids = new_allocator();
    let switch = vids.allocate(ObjectType::Switch);
    assert_eq!(switch.to_string(), "oid:0x21000000000000");
    assert_eq!(switch.sequence(), 0);

    let port = vids.allocate(ObjectType::Port);
    assert_eq!(port.to_string(), "oid:0x1000000000001");

    // Only the first switch gets the zero sequence
    let second = vids.allocate(ObjectType::Switch);
    assert_eq!(second.sequence(), 2);
    assert_eq!(vids.issued(), 3);
}

#[test]
fn test_shared_sequence() {
    let mut vids = new_allocator();
    let a = vids.allocate(ObjectType::Vlan);
    let b = vids.allocate(ObjectType::VlanMember);
    let c = vids.allocate(ObjectType::Vlan);
    assert_eq!(a.sequence(), 1);
    assert_eq!(b.sequence(), 2);
    assert_eq!(c.sequence(), 3);
    assert_eq!(a.object_type().unwrap(), ObjectType::Vlan);
    assert_eq!(b.object_type().unwrap(), ObjectType::VlanMember);
}

#[test]
fn test_idempotent() {
    let mut vids = new_allocator();
    let a = vids.get_or_allocate(ObjectType::Vlan, "oid:0x26000000000640");
    let b = vids.get_or_allocate(ObjectType::Vlan, "oid:0x26000000000640");
    assert_eq!(a, b);
    assert_eq!(vids.issued(), 1);

    // The same key under another type is a different object
    let c = vids.get_or_allocate(ObjectType::Port, "oid:0x26000000000640");
    assert_ne!(a, c);

    let cached = vids.cached(ObjectType::Vlan);
    assert_eq!(cached.len(), 1);
    assert_eq!(cached.get("oid:0x26000000000640"), Some(&a));

    // Introspection never allocates
    assert!(vids.cached(ObjectType::Lag).is_empty());
    assert_eq!(vids.issued(), 2);
}

#[test]
fn test_pop_and_clear() {
    let mut vids = new_allocator();
    let a = vids.get_or_allocate(ObjectType::Vlan, "10");
    assert_eq!(vids.pop(ObjectType::Vlan, "10"), Some(a));
    assert_eq!(vids.pop(ObjectType::Vlan, "10"), None);
    assert_eq!(vids.pop(ObjectType::Lag, "10"), None);

    let b = vids.get_or_allocate(ObjectType::Vlan, "10");
    assert_ne!(a, b);

    vids.clear();
    assert_eq!(vids.lookup(ObjectType::Vlan, "10"), None);
    let c = vids.get_or_allocate(ObjectType::Vlan, "10");
    assert!(c.sequence() > b.sequence());
}
