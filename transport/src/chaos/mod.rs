// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! A transport that wraps another one and fails operations at random.

use rand::random;
use serde::{Deserialize, Serialize};
use slog::{o, Logger};

use common::ObjectType;
use sal::{
    Attr, Attrs, BulkReply, Handle, ObjectId, ObjectRef, Reply, ResultValue,
    SalError, SalResult, Transport,
};

/// Chaos that happens according to a probability.
#[derive(Default, Debug, Serialize, Deserialize, Copy, Clone, PartialEq)]
pub struct Chaos {
    /// A probability between 0.0 and 1.0
    pub value: f64,
}

impl Chaos {
    /// Create a new chaos value.  Panics if value is outside the range
    /// [0.0, 1.0].
    pub fn new(value: f64) -> Self {
        let mut c = Self::default();
        c.set(value);
        c
    }

    /// Set the chaos value. Panics if value is outside the range [0.0, 1.0].
    pub fn set(&mut self, value: f64) {
        if !Self::in_range(value) {
            panic!("probability out of range");
        }
        self.value = value;
    }

    pub fn get(&self) -> f64 {
        self.value
    }

    fn in_range(value: f64) -> bool {
        (0.0..=1.0).contains(&value)
    }

    /// Return a chaos error according to the underlying probability value.
    pub fn unfurled(&self, log: &Logger, message: &str) -> SalResult<()> {
        if self.value > 0.0 && self.value >= random() {
            slog::error!(log, "chaos error: {}", message);
            return Err(SalError::Synthetic(message.into()));
        }
        Ok(())
    }
}

/// The chaos transport config contains a chaos value for each transport
/// operation.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    pub create: Chaos,
    pub remove: Chaos,
    pub set: Chaos,
    pub get: Chaos,
    pub bulk_create: Chaos,
    pub bulk_remove: Chaos,
    pub bulk_set: Chaos,
    pub get_stats: Chaos,
    pub clear_stats: Chaos,
    pub vid_to_type: Chaos,
    pub flush: Chaos,
}

impl TransportConfig {
    /// The uniform chaos config applies a uniform underlying probability to
    /// each chaos value.
    pub fn uniform(v: f64) -> Self {
        Self {
            create: Chaos::new(v),
            remove: Chaos::new(v),
            set: Chaos::new(v),
            get: Chaos::new(v),
            bulk_create: Chaos::new(v),
            bulk_remove: Chaos::new(v),
            bulk_set: Chaos::new(v),
            get_stats: Chaos::new(v),
            clear_stats: Chaos::new(v),
            vid_to_type: Chaos::new(v),
            flush: Chaos::new(v),
        }
    }

    /// The uniform get chaos config applies a uniform underlying probability
    /// to each read-only operation.  Mutating operations are initialized with
    /// a default Chaos config that fails with probability zero.
    pub fn uniform_get(v: f64) -> Self {
        Self {
            get: Chaos::new(v),
            get_stats: Chaos::new(v),
            vid_to_type: Chaos::new(v),
            ..Default::default()
        }
    }

    /// Check that every probability is within [0.0, 1.0].  Configs read from
    /// a file do not pass through `Chaos::new`.
    pub fn validate(&self) -> SalResult<()> {
        let all = [
            ("create", self.create),
            ("remove", self.remove),
            ("set", self.set),
            ("get", self.get),
            ("bulk_create", self.bulk_create),
            ("bulk_remove", self.bulk_remove),
            ("bulk_set", self.bulk_set),
            ("get_stats", self.get_stats),
            ("clear_stats", self.clear_stats),
            ("vid_to_type", self.vid_to_type),
            ("flush", self.flush),
        ];
        match all.iter().find(|(_, c)| !Chaos::in_range(c.value)) {
            Some((name, c)) => Err(SalError::InvalidArg(format!(
                "chaos probability for {name} out of range: {}",
                c.value
            ))),
            None => Ok(()),
        }
    }
}

pub struct ChaosHandle<T> {
    log: Logger,
    config: TransportConfig,
    inner: T,
}

impl<T: Transport> ChaosHandle<T> {
    pub fn new(
        log: &Logger,
        config: &TransportConfig,
        inner: T,
    ) -> SalResult<Self> {
        config.validate()?;
        Ok(ChaosHandle {
            log: log.new(o!("unit" => "chaos")),
            config: config.clone(),
            inner,
        })
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T: Transport> Transport for ChaosHandle<T> {
    fn create(
        &self,
        id: &ObjectId,
        attrs: &Attrs,
    ) -> SalResult<Reply<Option<ObjectRef>>> {
        self.config
            .create
            .unfurled(&self.log, &format!("create {id}"))?;
        self.inner.create(id, attrs)
    }

    fn remove(&self, id: &ObjectId) -> SalResult<Reply<()>> {
        self.config
            .remove
            .unfurled(&self.log, &format!("remove {id}"))?;
        self.inner.remove(id)
    }

    fn set(&self, id: &ObjectId, attr: &Attr) -> SalResult<Reply<()>> {
        self.config
            .set
            .unfurled(&self.log, &format!("set {id} {attr}"))?;
        self.inner.set(id, attr)
    }

    fn get(
        &self,
        id: &ObjectId,
        attrs: &Attrs,
    ) -> SalResult<Reply<ResultValue>> {
        self.config.get.unfurled(&self.log, &format!("get {id}"))?;
        self.inner.get(id, attrs)
    }

    fn bulk_create(
        &self,
        ty: ObjectType,
        keys: &[ObjectRef],
        attrs: &[Attrs],
    ) -> SalResult<BulkReply> {
        self.config
            .bulk_create
            .unfurled(&self.log, &format!("bulk create {ty}"))?;
        self.inner.bulk_create(ty, keys, attrs)
    }

    fn bulk_remove(
        &self,
        ty: ObjectType,
        keys: &[ObjectRef],
    ) -> SalResult<BulkReply> {
        self.config
            .bulk_remove
            .unfurled(&self.log, &format!("bulk remove {ty}"))?;
        self.inner.bulk_remove(ty, keys)
    }

    fn bulk_set(
        &self,
        ty: ObjectType,
        keys: &[ObjectRef],
        attrs: &[Attr],
    ) -> SalResult<BulkReply> {
        self.config
            .bulk_set
            .unfurled(&self.log, &format!("bulk set {ty}"))?;
        self.inner.bulk_set(ty, keys, attrs)
    }

    fn get_stats(
        &self,
        id: &ObjectId,
        counters: &[String],
    ) -> SalResult<Reply<ResultValue>> {
        self.config
            .get_stats
            .unfurled(&self.log, &format!("get stats {id}"))?;
        self.inner.get_stats(id, counters)
    }

    fn clear_stats(
        &self,
        id: &ObjectId,
        counters: &[String],
    ) -> SalResult<Reply<()>> {
        self.config
            .clear_stats
            .unfurled(&self.log, &format!("clear stats {id}"))?;
        self.inner.clear_stats(id, counters)
    }

    fn vid_to_type(&self, handle: Handle) -> SalResult<ObjectType> {
        self.config
            .vid_to_type
            .unfurled(&self.log, &format!("type of {handle}"))?;
        self.inner.vid_to_type(handle)
    }

    fn flush(&self) -> SalResult<()> {
        self.config.flush.unfurled(&self.log, "flush")?;
        self.inner.flush()
    }
}
