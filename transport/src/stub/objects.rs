// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! The object store behind the stub device.

use std::collections::BTreeMap;

use common::{ObjectType, Status};
use sal::{
    parse_list, scan_handles, Attr, Attrs, CompositeKey, Handle,
    ObjectId, ObjectRef, ResultValue,
};

// Handles picked by the device come from a range well above anything a
// harness-side allocator will reach, so the two never collide.
const DEVICE_SEQUENCE_BASE: u64 = 0x1000_0000;

pub const DEFAULT_VLAN_ID: &str = "1";

/// Where an object lives in the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Slot {
    Handle(Handle),
    Key(ObjectType, String),
}

impl Slot {
    fn from_ref(ty: ObjectType, object: &ObjectRef) -> Self {
        match object {
            ObjectRef::Handle(h) => Slot::Handle(*h),
            ObjectRef::Key(k) => Slot::Key(ty, k.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub ty: ObjectType,
    pub attrs: BTreeMap<String, String>,
    pub counters: BTreeMap<String, u64>,
    // The handles mentioned by the object's composite key, if any.
    key_refs: Vec<Handle>,
}

impl StoredObject {
    fn new(ty: ObjectType, key_refs: Vec<Handle>) -> Self {
        StoredObject {
            ty,
            attrs: BTreeMap::new(),
            counters: BTreeMap::new(),
            key_refs,
        }
    }

    fn references(&self, target: Handle) -> bool {
        self.key_refs.contains(&target)
            || self
                .attrs
                .values()
                .any(|v| {
                    scan_handles(v).is_ok_and(|found| {
                        found.iter().any(|(_, h)| *h == target)
                    })
                })
    }
}

#[derive(Debug)]
pub struct ObjectData {
    pub objects: BTreeMap<Slot, StoredObject>,
    pub switch: Option<Handle>,
    next_sequence: u64,
}

fn status_of<T>(r: Result<T, Status>) -> Status {
    match r {
        Ok(_) => Status::Success,
        Err(s) => s,
    }
}

impl ObjectData {
    pub fn new() -> Self {
        ObjectData {
            objects: BTreeMap::new(),
            switch: None,
            next_sequence: DEVICE_SEQUENCE_BASE,
        }
    }

    fn allocate(&mut self, ty: ObjectType) -> Handle {
        loop {
            let h = Handle::new(ty, self.next_sequence);
            self.next_sequence += 1;
            if !self.objects.contains_key(&Slot::Handle(h)) {
                return h;
            }
        }
    }

    fn exists(&self, h: Handle) -> bool {
        self.objects.contains_key(&Slot::Handle(h))
    }

    fn check_refs(&self, text: &str) -> bool {
        scan_handles(text).is_ok_and(|found| {
            found.iter().all(|(_, h)| h.is_null() || self.exists(*h))
        })
    }

    fn check_attrs(&self, attrs: &Attrs) -> Result<(), Status> {
        for (idx, attr) in attrs.iter().enumerate() {
            if !self.check_refs(&attr.value) {
                return Err(Status::InvalidAttrValue(idx as u16));
            }
        }
        Ok(())
    }

    fn lookup(&self, id: &ObjectId) -> Result<Slot, Status> {
        let ObjectId::Object { ty, object } = id else {
            return Err(Status::InvalidParameter);
        };
        let slot = Slot::from_ref(*ty, object);
        match self.objects.get(&slot) {
            Some(o) if o.ty == *ty => Ok(slot),
            Some(_) => Err(Status::InvalidObjectType),
            None => Err(Status::ItemNotFound),
        }
    }

    fn insert(
        &mut self,
        slot: Slot,
        ty: ObjectType,
        key_refs: Vec<Handle>,
        attrs: &Attrs,
    ) {
        let mut obj = StoredObject::new(ty, key_refs);
        for a in attrs {
            obj.attrs.insert(a.name.clone(), a.value.clone());
        }
        self.objects.insert(slot, obj);
    }

    /// Create an object, returning how it is addressed.
    pub fn create(
        &mut self,
        id: &ObjectId,
        attrs: &Attrs,
        ports: usize,
    ) -> Result<ObjectRef, Status> {
        let ty = id.object_type();
        if ty == ObjectType::Switch && self.switch.is_some() {
            return Err(Status::ItemAlreadyExists);
        }
        self.check_attrs(attrs)?;
        let (slot, object, key_refs) = match id {
            ObjectId::Type(ty) if ty.is_entry() => {
                return Err(Status::InvalidParameter)
            }
            ObjectId::Type(ty) => {
                let h = self.allocate(*ty);
                (Slot::Handle(h), ObjectRef::Handle(h), Vec::new())
            }
            ObjectId::Object {
                object: ObjectRef::Handle(h),
                ..
            } => {
                if h.is_null() {
                    return Err(Status::InvalidObjectId);
                }
                if h.object_type().ok() != Some(ty) {
                    return Err(Status::InvalidObjectType);
                }
                (Slot::Handle(*h), ObjectRef::Handle(*h), Vec::new())
            }
            ObjectId::Object {
                object: ObjectRef::Key(k),
                ..
            } => {
                let rendered = k.to_string();
                if !self.check_refs(&rendered) {
                    return Err(Status::InvalidObjectId);
                }
                let refs: Vec<Handle> = scan_handles(&rendered)
                    .map_err(|_| Status::InvalidObjectId)?
                    .into_iter()
                    .map(|(_, h)| h)
                    .filter(|h| !h.is_null())
                    .collect();
                (Slot::Key(ty, rendered), ObjectRef::Key(k.clone()), refs)
            }
        };
        if self.objects.contains_key(&slot) {
            return Err(Status::ItemAlreadyExists);
        }
        self.insert(slot, ty, key_refs, attrs);
        if let (ObjectType::Switch, ObjectRef::Handle(h)) = (ty, &object) {
            self.switch = Some(*h);
            self.populate_switch(*h, ports);
        }
        Ok(object)
    }

    fn add_default(&mut self, ty: ObjectType, attrs: &Attrs) -> Handle {
        let h = self.allocate(ty);
        self.insert(Slot::Handle(h), ty, Vec::new(), attrs);
        h
    }

    // A freshly created switch comes with the objects every switch has: a
    // default virtual router, .1Q bridge and VLAN, a CPU port, and the
    // front-panel ports each attached to the bridge.
    fn populate_switch(&mut self, switch: Handle, ports: usize) {
        let vr = self.add_default(ObjectType::VirtualRouter, &Attrs::new());
        let bridge = self.add_default(
            ObjectType::Bridge,
            &Attrs::new().with("SAI_BRIDGE_ATTR_TYPE", "SAI_BRIDGE_TYPE_1Q"),
        );
        let vlan = self.add_default(
            ObjectType::Vlan,
            &Attrs::new().with("SAI_VLAN_ATTR_VLAN_ID", DEFAULT_VLAN_ID),
        );

        let port_attrs = Attrs::new()
            .with("SAI_PORT_ATTR_ADMIN_STATE", "false")
            .with("SAI_PORT_ATTR_MTU", "1514");
        let cpu = self.add_default(ObjectType::Port, &port_attrs);
        let front: Vec<Handle> = (0..ports)
            .map(|_| self.add_default(ObjectType::Port, &port_attrs))
            .collect();
        let bridge_ports: Vec<Handle> = front
            .iter()
            .map(|port| {
                let attrs = Attrs::new()
                    .with(
                        "SAI_BRIDGE_PORT_ATTR_TYPE",
                        "SAI_BRIDGE_PORT_TYPE_PORT",
                    )
                    .with("SAI_BRIDGE_PORT_ATTR_PORT_ID", port.to_string())
                    .with(
                        "SAI_BRIDGE_PORT_ATTR_BRIDGE_ID",
                        bridge.to_string(),
                    );
                self.add_default(ObjectType::BridgePort, &attrs)
            })
            .collect();
        if let Some(obj) = self.objects.get_mut(&Slot::Handle(bridge)) {
            obj.attrs.insert(
                "SAI_BRIDGE_ATTR_PORT_LIST".to_string(),
                handle_list(&bridge_ports),
            );
        }
        let port_list = handle_list(&front);

        if let Some(obj) = self.objects.get_mut(&Slot::Handle(switch)) {
            let defaults = [
                ("SAI_SWITCH_ATTR_DEFAULT_VIRTUAL_ROUTER_ID", vr.to_string()),
                ("SAI_SWITCH_ATTR_DEFAULT_1Q_BRIDGE_ID", bridge.to_string()),
                ("SAI_SWITCH_ATTR_DEFAULT_VLAN_ID", vlan.to_string()),
                ("SAI_SWITCH_ATTR_CPU_PORT", cpu.to_string()),
                ("SAI_SWITCH_ATTR_NUMBER_OF_ACTIVE_PORTS", ports.to_string()),
                ("SAI_SWITCH_ATTR_PORT_NUMBER", ports.to_string()),
                ("SAI_SWITCH_ATTR_PORT_LIST", port_list),
            ];
            for (name, value) in defaults {
                obj.attrs.entry(name.to_string()).or_insert(value);
            }
        }
    }

    pub fn remove(&mut self, id: &ObjectId) -> Status {
        status_of(self.try_remove(id))
    }

    fn try_remove(&mut self, id: &ObjectId) -> Result<(), Status> {
        let slot = self.lookup(id)?;
        if let Slot::Handle(h) = slot {
            if Some(h) == self.switch {
                // Removing the switch tears down everything on it.
                self.objects.clear();
                self.switch = None;
                return Ok(());
            }
            let in_use = self.objects.iter().any(|(s, o)| {
                *s != slot
                    && *s != Slot::Handle(self.switch.unwrap_or_default())
                    && o.references(h)
            });
            if in_use {
                return Err(Status::ObjectInUse);
            }
        }
        self.objects.remove(&slot);
        Ok(())
    }

    pub fn set(&mut self, id: &ObjectId, attr: &Attr) -> Status {
        status_of(self.try_set(id, attr))
    }

    fn try_set(&mut self, id: &ObjectId, attr: &Attr) -> Result<(), Status> {
        let slot = self.lookup(id)?;
        if !self.check_refs(&attr.value) {
            return Err(Status::InvalidAttrValue(0));
        }
        if let Some(obj) = self.objects.get_mut(&slot) {
            obj.attrs.insert(attr.name.clone(), attr.value.clone());
        }
        Ok(())
    }

    /// Read attributes.  A request value of the form `N:...` states the
    /// capacity the caller has for a list; a longer list is refused with
    /// `BUFFER_OVERFLOW` and the required count in its place.
    pub fn get(&self, id: &ObjectId, attrs: &Attrs) -> (Status, ResultValue) {
        let obj = match self.lookup(id) {
            Ok(slot) => &self.objects[&slot],
            Err(s) => return (s, ResultValue::default()),
        };
        let mut fields = Vec::new();
        let mut status = Status::Success;
        for (idx, attr) in attrs.iter().enumerate() {
            let Some(stored) = obj.attrs.get(&attr.name) else {
                return (
                    Status::AttrNotImplemented(idx as u16),
                    ResultValue::default(),
                );
            };
            let value = match (list_capacity(&attr.value), list_len(stored)) {
                (Some(capacity), Some(len)) if len > capacity => {
                    status = Status::BufferOverflow;
                    len.to_string()
                }
                _ => stored.clone(),
            };
            fields.push(attr.name.clone());
            fields.push(value);
        }
        (status, ResultValue::from_fields(&fields))
    }

    pub fn get_stats(
        &self,
        id: &ObjectId,
        counters: &[String],
    ) -> (Status, ResultValue) {
        match self.lookup(id) {
            Ok(slot) => {
                let obj = &self.objects[&slot];
                let fields: Vec<String> = counters
                    .iter()
                    .flat_map(|c| {
                        let v = obj.counters.get(c).copied().unwrap_or(0);
                        [c.clone(), v.to_string()]
                    })
                    .collect();
                (Status::Success, ResultValue::from_fields(&fields))
            }
            Err(s) => (s, ResultValue::default()),
        }
    }

    pub fn clear_stats(
        &mut self,
        id: &ObjectId,
        counters: &[String],
    ) -> Status {
        let slot = match self.lookup(id) {
            Ok(slot) => slot,
            Err(s) => return s,
        };
        if let Some(obj) = self.objects.get_mut(&slot) {
            for c in counters {
                obj.counters.insert(c.clone(), 0);
            }
        }
        Status::Success
    }

    pub fn add_to_counter(
        &mut self,
        id: &ObjectId,
        counter: &str,
        delta: u64,
    ) -> Status {
        let slot = match self.lookup(id) {
            Ok(slot) => slot,
            Err(s) => return s,
        };
        if let Some(obj) = self.objects.get_mut(&slot) {
            *obj.counters.entry(counter.to_string()).or_default() += delta;
        }
        Status::Success
    }

    /// Every stored object of the given type.
    pub fn of_type(&self, ty: ObjectType) -> Vec<ObjectRef> {
        self.objects
            .iter()
            .filter(|(_, o)| o.ty == ty)
            .filter_map(|(slot, _)| match slot {
                Slot::Handle(h) => Some(ObjectRef::Handle(*h)),
                Slot::Key(_, k) => {
                    k.parse::<CompositeKey>().ok().map(ObjectRef::Key)
                }
            })
            .collect()
    }
}

fn handle_list(handles: &[Handle]) -> String {
    let elems: Vec<String> = handles.iter().map(Handle::to_string).collect();
    format!("{}:{}", handles.len(), elems.join(","))
}

// The capacity stated by a list request value such as `4:oid:0x0,...`.
fn list_capacity(value: &str) -> Option<usize> {
    let (count, _) = value.split_once(':')?;
    count.parse().ok()
}

fn list_len(value: &str) -> Option<usize> {
    list_capacity(value)?;
    Some(parse_list(value).len())
}
