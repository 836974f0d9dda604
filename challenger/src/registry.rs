// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! The object registry maps the aliases used by command lists to the objects
//! they created.

use std::collections::BTreeMap;

use serde::Serialize;
use slog::{debug, o};

use common::ObjectType;
use sal::{ObjectId, ObjectRef};

use crate::types::{ChallengerError, ChallengerResult};

/// What an alias refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    #[serde(rename = "type")]
    pub ty: ObjectType,
    pub object: ObjectRef,
}

impl Descriptor {
    pub fn new(ty: ObjectType, object: impl Into<ObjectRef>) -> Self {
        Descriptor {
            ty,
            object: object.into(),
        }
    }

    pub fn id(&self) -> ObjectId {
        ObjectId::new(self.ty, self.object.clone())
    }
}

pub struct Registry {
    log: slog::Logger,
    aliases: BTreeMap<String, Descriptor>,
}

impl Registry {
    pub fn new(log: &slog::Logger) -> Self {
        Registry {
            log: log.new(o!("unit" => "registry")),
            aliases: BTreeMap::new(),
        }
    }

    /// Record the object created under `alias`.  Creating an alias again
    /// with the same type replaces the old descriptor; using it for an
    /// object of another type is refused.
    pub fn insert(
        &mut self,
        alias: &str,
        descriptor: Descriptor,
    ) -> ChallengerResult<()> {
        if let Some(existing) = self.aliases.get(alias) {
            if existing.ty != descriptor.ty {
                return Err(ChallengerError::AliasConflict {
                    alias: alias.to_string(),
                    existing: existing.ty,
                    requested: descriptor.ty,
                });
            }
            debug!(self.log, "replacing {alias}"; "old" => %existing.object);
        }
        debug!(self.log, "registered {alias}";
            "type" => %descriptor.ty,
            "object" => %descriptor.object);
        self.aliases.insert(alias.to_string(), descriptor);
        Ok(())
    }

    /// Check that `alias` could be registered for an object of type `ty`,
    /// without registering it.
    pub fn check_insert(
        &self,
        alias: &str,
        ty: ObjectType,
    ) -> ChallengerResult<()> {
        match self.aliases.get(alias) {
            Some(existing) if existing.ty != ty => {
                Err(ChallengerError::AliasConflict {
                    alias: alias.to_string(),
                    existing: existing.ty,
                    requested: ty,
                })
            }
            _ => Ok(()),
        }
    }

    pub fn get(&self, alias: &str) -> Option<&Descriptor> {
        self.aliases.get(alias)
    }

    pub fn remove(&mut self, alias: &str) -> ChallengerResult<Descriptor> {
        let descriptor = self
            .aliases
            .remove(alias)
            .ok_or_else(|| ChallengerError::NoSuchAlias(alias.to_string()))?;
        debug!(self.log, "unregistered {alias}");
        Ok(descriptor)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.aliases.contains_key(alias)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Descriptor)> {
        self.aliases.iter()
    }

    pub fn clear(&mut self) {
        self.aliases.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sal::{CompositeKey, Handle};
    use serde_json::json;

    #[test]
    fn test_round_trip() {
        let mut reg = Registry::new(&crate::test_log());
        let vlan = Handle::new(ObjectType::Vlan, 3);
        reg.insert("vlan_10", Descriptor::new(ObjectType::Vlan, vlan))
            .unwrap();
        assert!(reg.contains("vlan_10"));
        assert_eq!(
            reg.get("vlan_10").unwrap().id().to_string(),
            "SAI_OBJECT_TYPE_VLAN:oid:0x26000000000003"
        );

        let removed = reg.remove("vlan_10").unwrap();
        assert_eq!(removed.object, ObjectRef::Handle(vlan));
        assert!(matches!(
            reg.remove("vlan_10"),
            Err(ChallengerError::NoSuchAlias(_))
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_key_descriptor() {
        let mut reg = Registry::new(&crate::test_log());
        let key: CompositeKey = serde_json::from_value(json!({
            "bv_id": "oid:0x26000000000003",
            "mac_address": "00:11:11:11:11:11",
        }))
        .unwrap();
        reg.insert("fdb_0", Descriptor::new(ObjectType::FdbEntry, key.clone()))
            .unwrap();
        assert_eq!(reg.get("fdb_0").unwrap().object, ObjectRef::Key(key));
    }

    #[test]
    fn test_type_conflict() {
        let mut reg = Registry::new(&crate::test_log());
        let h = Handle::new(ObjectType::Vlan, 1);
        reg.insert("x", Descriptor::new(ObjectType::Vlan, h)).unwrap();

        // Same type replaces
        let h2 = Handle::new(ObjectType::Vlan, 2);
        reg.insert("x", Descriptor::new(ObjectType::Vlan, h2)).unwrap();
        assert_eq!(reg.get("x").unwrap().object, ObjectRef::Handle(h2));

        let lag = Handle::new(ObjectType::Lag, 3);
        assert!(reg.check_insert("x", ObjectType::Lag).is_err());
        let err = reg
            .insert("x", Descriptor::new(ObjectType::Lag, lag))
            .unwrap_err();
        assert!(err.is_registry());
        assert_eq!(reg.get("x").unwrap().ty, ObjectType::Vlan);
        assert_eq!(reg.len(), 1);
    }
}
