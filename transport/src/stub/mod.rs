// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! An in-memory switch.  It keeps just enough state to behave like a device
//! would towards the harness: handles are unique, references between objects
//! must resolve, and a new switch comes with its default objects.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use slog::{debug, info, o};

use common::{ObjectType, Status};
use sal::{
    broadcast_attrs, Attr, Attrs, BulkReply, ObjectId, ObjectRef, Reply,
    ResultValue, SalResult, Transport,
};

mod objects;
pub use objects::DEFAULT_VLAN_ID;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StubConfig {
    /// Number of front-panel ports a new switch is created with.
    pub ports: usize,
}

impl Default for StubConfig {
    fn default() -> Self {
        StubConfig { ports: 4 }
    }
}

pub struct StubHandle {
    log: slog::Logger,
    config: StubConfig,
    objects: Mutex<objects::ObjectData>,
}

impl StubHandle {
    pub fn new(log: &slog::Logger, config: &StubConfig) -> Self {
        StubHandle {
            log: log.new(o!("unit" => "stub")),
            config: config.clone(),
            objects: Mutex::new(objects::ObjectData::new()),
        }
    }

    /// Number of objects currently present on the device.
    pub fn object_count(&self) -> usize {
        self.objects.lock().objects.len()
    }

    /// Every object of the given type currently present on the device.
    pub fn objects_of_type(&self, ty: ObjectType) -> Vec<ObjectRef> {
        self.objects.lock().of_type(ty)
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        let (status, _) = self.objects.lock().get(id, &Attrs::new());
        status.is_success()
    }

    /// Advance one of an object's counters, as traffic would.
    pub fn add_to_counter(
        &self,
        id: &ObjectId,
        counter: &str,
        delta: u64,
    ) -> Status {
        self.objects.lock().add_to_counter(id, counter, delta)
    }
}

impl Transport for StubHandle {
    fn create(
        &self,
        id: &ObjectId,
        attrs: &Attrs,
    ) -> SalResult<Reply<Option<ObjectRef>>> {
        let mut objects = self.objects.lock();
        let reply = match objects.create(id, attrs, self.config.ports) {
            Ok(object) => {
                debug!(self.log, "created {}:{object}", id.object_type());
                Reply::success(Some(object))
            }
            Err(status) => {
                debug!(self.log, "create {id} failed: {status}");
                Reply::new(status, None)
            }
        };
        Ok(reply)
    }

    fn remove(&self, id: &ObjectId) -> SalResult<Reply<()>> {
        let status = self.objects.lock().remove(id);
        debug!(self.log, "remove {id}: {status}");
        Ok(Reply::new(status, ()))
    }

    fn set(&self, id: &ObjectId, attr: &Attr) -> SalResult<Reply<()>> {
        let status = self.objects.lock().set(id, attr);
        debug!(self.log, "set {id} {attr}: {status}");
        Ok(Reply::new(status, ()))
    }

    fn get(
        &self,
        id: &ObjectId,
        attrs: &Attrs,
    ) -> SalResult<Reply<ResultValue>> {
        let (status, value) = self.objects.lock().get(id, attrs);
        Ok(Reply::new(status, value))
    }

    fn bulk_create(
        &self,
        ty: ObjectType,
        keys: &[ObjectRef],
        attrs: &[Attrs],
    ) -> SalResult<BulkReply> {
        let attrs = broadcast_attrs(keys, attrs)?;
        let mut objects = self.objects.lock();
        let statuses = keys
            .iter()
            .zip(attrs)
            .map(|(key, attrs)| {
                let id = ObjectId::new(ty, key.clone());
                match objects.create(&id, attrs, self.config.ports) {
                    Ok(_) => Status::Success,
                    Err(status) => status,
                }
            })
            .collect();
        Ok(BulkReply::from_statuses(statuses))
    }

    fn bulk_remove(
        &self,
        ty: ObjectType,
        keys: &[ObjectRef],
    ) -> SalResult<BulkReply> {
        let mut objects = self.objects.lock();
        let statuses = keys
            .iter()
            .map(|key| objects.remove(&ObjectId::new(ty, key.clone())))
            .collect();
        Ok(BulkReply::from_statuses(statuses))
    }

    fn bulk_set(
        &self,
        ty: ObjectType,
        keys: &[ObjectRef],
        attrs: &[Attr],
    ) -> SalResult<BulkReply> {
        if keys.len() != attrs.len() {
            return Err(sal::SalError::InvalidArg(format!(
                "{} attributes supplied for {} keys",
                attrs.len(),
                keys.len()
            )));
        }
        let mut objects = self.objects.lock();
        let statuses = keys
            .iter()
            .zip(attrs)
            .map(|(key, attr)| {
                objects.set(&ObjectId::new(ty, key.clone()), attr)
            })
            .collect();
        Ok(BulkReply::from_statuses(statuses))
    }

    fn get_stats(
        &self,
        id: &ObjectId,
        counters: &[String],
    ) -> SalResult<Reply<ResultValue>> {
        let (status, value) = self.objects.lock().get_stats(id, counters);
        Ok(Reply::new(status, value))
    }

    fn clear_stats(
        &self,
        id: &ObjectId,
        counters: &[String],
    ) -> SalResult<Reply<()>> {
        let status = self.objects.lock().clear_stats(id, counters);
        Ok(Reply::new(status, ()))
    }

    fn flush(&self) -> SalResult<()> {
        info!(self.log, "flushing all objects");
        *self.objects.lock() = objects::ObjectData::new();
        Ok(())
    }
}
