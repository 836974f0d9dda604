// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! The harness core.  A `Session` drives a switch through a `Transport` and
//! keeps everything needed to talk about the switch's objects in the
//! harness's own terms: the virtual handle cache, the alias registry used by
//! command lists, and the device-to-virtual handle map built by log replay.

use std::collections::BTreeMap;
use std::fmt;

use slog::{debug, info, o};

use common::{ObjectType, Status};
use sal::{
    broadcast_attrs, make_list, Attr, Attrs, BulkReply, Handle, ObjectId,
    ObjectRef, Reply, ResultValue, StatusPolicy, Transport,
};

pub mod command;
pub mod registry;
pub mod replay;
pub mod types;
pub mod vid;

use registry::Registry;
use types::{ChallengerError, ChallengerResult};
use vid::VidAllocator;

/// The alias under which the session's switch is offered to command lists.
pub const SWITCH_ALIAS: &str = "SWITCH_ID";

pub struct Session<T> {
    log: slog::Logger,
    transport: T,
    policy: StatusPolicy,
    vids: VidAllocator,
    registry: Registry,
    // Device handles seen in a replayed log, mapped to our own handles
    rec2vid: BTreeMap<Handle, Handle>,
    // Values for `$alias` references that no command registered
    defaults: BTreeMap<String, String>,
}

impl<T: Transport> Session<T> {
    pub fn new(log: &slog::Logger, transport: T) -> Self {
        let log = log.new(o!("unit" => "session"));
        Session {
            vids: VidAllocator::new(&log),
            registry: Registry::new(&log),
            log,
            transport,
            policy: StatusPolicy::default(),
            rec2vid: BTreeMap::new(),
            defaults: BTreeMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: StatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: StatusPolicy) {
        self.policy = policy;
    }

    pub(crate) fn log(&self) -> &slog::Logger {
        &self.log
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn vids(&self) -> &VidAllocator {
        &self.vids
    }

    pub fn vids_mut(&mut self) -> &mut VidAllocator {
        &mut self.vids
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub(crate) fn replay_map_mut(&mut self) -> &mut BTreeMap<Handle, Handle> {
        &mut self.rec2vid
    }

    /// The device handles seen by the most recent replay and the virtual
    /// handles standing in for them.
    pub fn replay_map(&self) -> &BTreeMap<Handle, Handle> {
        &self.rec2vid
    }

    /// Offer `value` for `$alias` references that no command registered.
    pub fn set_default(
        &mut self,
        alias: impl Into<String>,
        value: impl Into<String>,
    ) {
        let alias = alias.into();
        let value = value.into();
        debug!(self.log, "default ${alias} = {value}");
        self.defaults.insert(alias, value);
    }

    pub fn default_value(&self, alias: &str) -> Option<&str> {
        self.defaults.get(alias).map(String::as_str)
    }

    pub fn defaults(&self) -> &BTreeMap<String, String> {
        &self.defaults
    }

    /// Return the device and the session to their initial state.
    pub fn cleanup(&mut self) -> ChallengerResult<()> {
        info!(self.log, "cleaning up";
            "aliases" => self.registry.len(),
            "replayed" => self.rec2vid.len());
        self.transport.flush()?;
        self.vids.clear();
        self.registry.clear();
        self.rec2vid.clear();
        self.defaults.clear();
        Ok(())
    }

    /// Create the switch and learn its default objects.  The discovered
    /// objects are offered as defaults: `SWITCH_ID`, `DEFAULT_VLAN`,
    /// `DEFAULT_VRF`, `DOT1Q_BRIDGE`, `CPU_PORT`, `PORT_<n>` and
    /// `BRIDGE_PORT_<n>`.
    pub fn init_switch(&mut self, attrs: &Attrs) -> ChallengerResult<Handle> {
        let mut attrs = attrs.clone();
        attrs.push("SAI_SWITCH_ATTR_INIT_SWITCH", "true");
        attrs.push("SAI_SWITCH_ATTR_TYPE", "SAI_SWITCH_TYPE_NPU");
        let created = self.create_as(
            StatusPolicy::Assert,
            &ObjectId::Type(ObjectType::Switch),
            &attrs,
        )?;
        let switch = created.value.handle().ok_or_else(|| {
            ChallengerError::InvalidCommand(format!(
                "switch created as {} has no handle",
                created.value
            ))
        })?;
        self.rec2vid.insert(switch, switch);
        self.set_default(SWITCH_ALIAS, switch.to_string());

        let switch_id = ObjectId::new(ObjectType::Switch, switch);
        for (alias, attr) in [
            ("DEFAULT_VRF", "SAI_SWITCH_ATTR_DEFAULT_VIRTUAL_ROUTER_ID"),
            ("DOT1Q_BRIDGE", "SAI_SWITCH_ATTR_DEFAULT_1Q_BRIDGE_ID"),
            ("DEFAULT_VLAN", "SAI_SWITCH_ATTR_DEFAULT_VLAN_ID"),
            ("CPU_PORT", "SAI_SWITCH_ATTR_CPU_PORT"),
        ] {
            let reply = self.get_as(
                StatusPolicy::Assert,
                &switch_id,
                &Attrs::new().with(attr, "oid:0x0"),
            )?;
            let handle = reply.value.handle(1)?;
            if handle.is_null() {
                return Err(ChallengerError::InvalidCommand(format!(
                    "switch reports a null {attr}"
                )));
            }
            self.set_default(alias, handle.to_string());
        }

        let ports =
            self.get_list(&switch_id, "SAI_SWITCH_ATTR_PORT_LIST", "oid:0x0")?;
        for (idx, port) in ports.iter().enumerate() {
            self.set_default(format!("PORT_{idx}"), port.clone());
        }

        let bridge = self
            .default_value("DOT1Q_BRIDGE")
            .map(str::parse::<Handle>)
            .transpose()?;
        if let Some(bridge) = bridge {
            let bridge = ObjectId::new(ObjectType::Bridge, bridge);
            let bridge_ports = self.get_list(
                &bridge,
                "SAI_BRIDGE_ATTR_PORT_LIST",
                "oid:0x0",
            )?;
            for (idx, port) in bridge_ports.iter().enumerate() {
                self.set_default(format!("BRIDGE_PORT_{idx}"), port.clone());
            }
        }
        info!(self.log, "switch initialized";
            "switch" => %switch,
            "ports" => ports.len());
        Ok(switch)
    }

    /// Create an object.  When `id` names only the type of a handle-based
    /// object, the session allocates the object's virtual handle itself.
    pub fn create(
        &mut self,
        id: &ObjectId,
        attrs: &Attrs,
    ) -> ChallengerResult<Reply<ObjectId>> {
        self.create_as(self.policy, id, attrs)
    }

    pub(crate) fn create_as(
        &mut self,
        policy: StatusPolicy,
        id: &ObjectId,
        attrs: &Attrs,
    ) -> ChallengerResult<Reply<ObjectId>> {
        let id = match id {
            ObjectId::Type(ty) if !ty.is_entry() => {
                ObjectId::new(*ty, self.vids.allocate(*ty))
            }
            _ => id.clone(),
        };
        debug!(self.log, "create {id}"; "attrs" => attrs.to_piped());
        let reply = self.transport.create(&id, attrs)?.check(
            policy,
            "create",
            Target(&id, attrs),
        )?;
        let ty = id.object_type();
        Ok(reply.map(|created| match created {
            Some(object) => ObjectId::new(ty, object),
            None => id,
        }))
    }

    pub fn remove(&mut self, id: &ObjectId) -> ChallengerResult<Status> {
        self.remove_as(self.policy, id)
    }

    pub(crate) fn remove_as(
        &mut self,
        policy: StatusPolicy,
        id: &ObjectId,
    ) -> ChallengerResult<Status> {
        debug!(self.log, "remove {id}");
        let reply = self.transport.remove(id)?.check(policy, "remove", id)?;
        Ok(reply.status)
    }

    pub fn set(
        &mut self,
        id: &ObjectId,
        attr: &Attr,
    ) -> ChallengerResult<Status> {
        self.set_as(self.policy, id, attr)
    }

    pub(crate) fn set_as(
        &mut self,
        policy: StatusPolicy,
        id: &ObjectId,
        attr: &Attr,
    ) -> ChallengerResult<Status> {
        debug!(self.log, "set {id} {attr}");
        let reply = self.transport.set(id, attr)?.check(
            policy,
            "set",
            format!("{id} {attr}"),
        )?;
        Ok(reply.status)
    }

    pub fn get(
        &self,
        id: &ObjectId,
        attrs: &Attrs,
    ) -> ChallengerResult<Reply<ResultValue>> {
        self.get_as(self.policy, id, attrs)
    }

    pub(crate) fn get_as(
        &self,
        policy: StatusPolicy,
        id: &ObjectId,
        attrs: &Attrs,
    ) -> ChallengerResult<Reply<ResultValue>> {
        let reply = self.transport.get(id, attrs)?.check(
            policy,
            "get",
            Target(id, attrs),
        )?;
        debug!(self.log, "get {id}: {}", reply.value;
            "status" => %reply.status);
        Ok(reply)
    }

    /// Read a list attribute without knowing its length up front.  The first
    /// request asks for a single element; if the device answers with
    /// `BUFFER_OVERFLOW` and the real count, the request is repeated with
    /// room for all of them.
    pub fn get_list(
        &self,
        id: &ObjectId,
        attr: &str,
        elem: &str,
    ) -> ChallengerResult<Vec<String>> {
        let probe = Attrs::new().with(attr, make_list(1, elem));
        let reply = self.get_as(StatusPolicy::Tolerate, id, &probe)?;
        let reply = match reply.status {
            Status::BufferOverflow => {
                let count = reply.value.uint32()? as usize;
                let full = Attrs::new().with(attr, make_list(count, elem));
                self.get_as(StatusPolicy::Assert, id, &full)?
            }
            _ => {
                reply.check(StatusPolicy::Assert, "get", Target(id, &probe))?
            }
        };
        Ok(reply.value.to_list(1)?)
    }

    pub fn get_stats(
        &self,
        id: &ObjectId,
        counters: &[String],
    ) -> ChallengerResult<Reply<ResultValue>> {
        let reply = self.transport.get_stats(id, counters)?.check(
            self.policy,
            "get_stats",
            id,
        )?;
        Ok(reply)
    }

    pub fn clear_stats(
        &self,
        id: &ObjectId,
        counters: &[String],
    ) -> ChallengerResult<Status> {
        let reply = self.transport.clear_stats(id, counters)?.check(
            self.policy,
            "clear_stats",
            id,
        )?;
        Ok(reply.status)
    }

    /// Create several objects of one type.  `attrs` holds one list per key,
    /// or a single list shared by every key.
    pub fn bulk_create(
        &mut self,
        ty: ObjectType,
        keys: &[ObjectRef],
        attrs: &[Attrs],
    ) -> ChallengerResult<BulkReply> {
        self.bulk_create_as(self.policy, ty, keys, attrs)
    }

    pub(crate) fn bulk_create_as(
        &mut self,
        policy: StatusPolicy,
        ty: ObjectType,
        keys: &[ObjectRef],
        attrs: &[Attrs],
    ) -> ChallengerResult<BulkReply> {
        broadcast_attrs(keys, attrs)?;
        debug!(self.log, "bulk create {} {ty}", keys.len());
        let reply = self
            .transport
            .bulk_create(ty, keys, attrs)?
            .check(policy, "bulk_create", ty)?;
        Ok(reply)
    }

    pub fn bulk_remove(
        &mut self,
        ty: ObjectType,
        keys: &[ObjectRef],
    ) -> ChallengerResult<BulkReply> {
        self.bulk_remove_as(self.policy, ty, keys)
    }

    pub(crate) fn bulk_remove_as(
        &mut self,
        policy: StatusPolicy,
        ty: ObjectType,
        keys: &[ObjectRef],
    ) -> ChallengerResult<BulkReply> {
        debug!(self.log, "bulk remove {} {ty}", keys.len());
        let reply = self
            .transport
            .bulk_remove(ty, keys)?
            .check(policy, "bulk_remove", ty)?;
        Ok(reply)
    }

    /// Set one attribute on each of several objects; `attrs[i]` applies to
    /// `keys[i]`.
    pub fn bulk_set(
        &mut self,
        ty: ObjectType,
        keys: &[ObjectRef],
        attrs: &[Attr],
    ) -> ChallengerResult<BulkReply> {
        self.bulk_set_as(self.policy, ty, keys, attrs)
    }

    pub(crate) fn bulk_set_as(
        &mut self,
        policy: StatusPolicy,
        ty: ObjectType,
        keys: &[ObjectRef],
        attrs: &[Attr],
    ) -> ChallengerResult<BulkReply> {
        if keys.len() != attrs.len() {
            return Err(ChallengerError::InvalidCommand(format!(
                "bulk set of {} {ty} objects with {} attributes",
                keys.len(),
                attrs.len()
            )));
        }
        debug!(self.log, "bulk set {} {ty}", keys.len());
        let reply = self
            .transport
            .bulk_set(ty, keys, attrs)?
            .check(policy, "bulk_set", ty)?;
        Ok(reply)
    }

    /// The type of the object behind `handle`, as the transport sees it.
    pub fn vid_to_type(&self, handle: Handle) -> ChallengerResult<ObjectType> {
        Ok(self.transport.vid_to_type(handle)?)
    }
}

// How an operation's target is described in a failure.
struct Target<'a>(&'a ObjectId, &'a Attrs);

impl fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.1.is_empty() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "{} [{}]", self.0, self.1.to_piped())
        }
    }
}

#[cfg(test)]
pub(crate) fn test_log() -> slog::Logger {
    use slog::Drain;

    let decorator =
        slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    slog::Logger::root(drain, slog::o!())
}

#[cfg(test)]
pub(crate) mod mock;
