// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Replay of captured operation logs against a fresh switch.
//!
//! The handles in a log are the ones the recording device handed out.  As
//! records are replayed, every handle the log creates is given a virtual
//! handle of our own, and every handle the log learned from a get response
//! is paired with whatever our device answered for the same get.  Later
//! records are rewritten through that map before they are sent.

use std::path::Path;

use slog::{debug, info, o, warn};

use common::ObjectType;
use sal::{
    parse_list, rewrite_handles, Attr, Attrs, CompositeKey, Handle, ObjectId,
    ObjectRef, SalError, StatusPolicy, Transport, HANDLE_PREFIX,
};

use crate::types::{ChallengerError, ChallengerResult};
use crate::Session;

mod record;

pub use record::{parse_records, Member, Record, RecordKind};

/// How a record's object key relates to the replay map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyUse {
    /// The record creates the object: allocate a handle and map it.
    Create,
    /// The object must already be mapped.
    Lookup,
    /// The record removes the object: unmap it.
    Evict,
}

/// What a replay did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Records sent to the device.
    pub applied: usize,
    /// Records the replay does not act on.
    pub skipped: usize,
}

struct Replayer<'a, T> {
    log: slog::Logger,
    session: &'a mut Session<T>,
    // Handles from our own get responses, waiting for the recorded response
    // that names the device's handles for the same objects
    pending: Vec<Handle>,
}

/// The handles in a recorded attribute value: either a handle list
/// (`N:oid:..,oid:..`) or a single handle.
fn value_handles(value: &str) -> ChallengerResult<Vec<Handle>> {
    let list_marker = format!(":{HANDLE_PREFIX}");
    if value.contains(&list_marker) {
        Ok(parse_list(value)
            .iter()
            .map(|elem| elem.parse())
            .collect::<Result<_, _>>()?)
    } else if value.contains(HANDLE_PREFIX) {
        Ok(vec![value.parse()?])
    } else {
        Ok(Vec::new())
    }
}

impl<'a, T: Transport> Replayer<'a, T> {
    fn new(session: &'a mut Session<T>) -> Self {
        Replayer {
            log: session.log().new(o!("unit" => "replay")),
            session,
            pending: Vec::new(),
        }
    }

    fn lookup(&self, line: usize, handle: Handle) -> ChallengerResult<Handle> {
        self.session
            .replay_map()
            .get(&handle)
            .copied()
            .ok_or_else(|| ChallengerError::UnknownHandle {
                line,
                handle: handle.to_string(),
            })
    }

    fn rewrite(&self, line: usize, text: &str) -> ChallengerResult<String> {
        rewrite_handles(text, |h| self.lookup(line, h)).map_err(|e| match e {
            ChallengerError::Transport(SalError::Parse(reason)) => {
                ChallengerError::MalformedRecord { line, reason }
            }
            e => e,
        })
    }

    fn rewrite_attr(&self, line: usize, attr: &Attr) -> ChallengerResult<Attr> {
        Ok(Attr::new(&attr.name, self.rewrite(line, &attr.value)?))
    }

    fn rewrite_attrs(
        &self,
        line: usize,
        attrs: &Attrs,
    ) -> ChallengerResult<Attrs> {
        attrs.iter().map(|a| self.rewrite_attr(line, a)).collect()
    }

    // Translate a recorded object key into the object it stands for on our
    // device.
    fn object(
        &mut self,
        line: usize,
        ty: ObjectType,
        key: &str,
        usage: KeyUse,
    ) -> ChallengerResult<ObjectRef> {
        if key.starts_with('{') {
            let key: CompositeKey = self.rewrite(line, key)?.parse()?;
            return Ok(key.into());
        }
        let recorded: Handle = key.parse().map_err(|_| {
            ChallengerError::MalformedRecord {
                line,
                reason: format!("bad object key {key}"),
            }
        })?;
        let handle = match usage {
            KeyUse::Create => {
                let vid = self.session.vids_mut().get_or_allocate(ty, key);
                debug!(self.log, "mapping {recorded} to {vid}"; "line" => line);
                self.session.replay_map_mut().insert(recorded, vid);
                vid
            }
            KeyUse::Lookup => self.lookup(line, recorded)?,
            KeyUse::Evict => self
                .session
                .replay_map_mut()
                .remove(&recorded)
                .ok_or_else(|| ChallengerError::UnknownHandle {
                    line,
                    handle: recorded.to_string(),
                })?,
        };
        Ok(handle.into())
    }

    fn id(
        &mut self,
        line: usize,
        ty: ObjectType,
        key: &str,
        usage: KeyUse,
    ) -> ChallengerResult<ObjectId> {
        Ok(ObjectId::new(ty, self.object(line, ty, key, usage)?))
    }

    fn objects<'k>(
        &mut self,
        line: usize,
        ty: ObjectType,
        keys: impl Iterator<Item = &'k String>,
        usage: KeyUse,
    ) -> ChallengerResult<Vec<ObjectRef>> {
        keys.map(|key| self.object(line, ty, key, usage)).collect()
    }

    // Queue the handles our device reported in a get response.
    fn queue_response(
        &mut self,
        value: &sal::ResultValue,
    ) -> ChallengerResult<()> {
        let fields = value.fields()?;
        for value in fields.iter().skip(1).step_by(2) {
            self.pending.extend(value_handles(value)?);
        }
        Ok(())
    }

    // Pair the handles a recorded get response names with the ones queued
    // by our own get.
    fn map_response(
        &mut self,
        line: usize,
        attrs: &Attrs,
    ) -> ChallengerResult<()> {
        let mut recorded = Vec::new();
        for attr in attrs {
            recorded.extend(value_handles(&attr.value)?);
        }
        let pending = std::mem::take(&mut self.pending);
        if recorded.len() != pending.len() {
            return Err(ChallengerError::ResponseMismatch {
                line,
                expected: pending.len(),
                found: recorded.len(),
            });
        }
        for (rec, vid) in recorded.into_iter().zip(pending) {
            if rec.is_null() {
                continue;
            }
            debug!(self.log, "mapping {rec} to {vid}"; "line" => line);
            self.session.replay_map_mut().insert(rec, vid);
        }
        Ok(())
    }

    // Apply one record, returning whether it was sent to the device.
    fn apply(&mut self, record: &Record) -> ChallengerResult<bool> {
        let line = record.line;
        debug!(self.log, "replaying {record}");
        let assert = StatusPolicy::Assert;
        match &record.kind {
            RecordKind::Create { ty, key, attrs } => {
                let id = self.id(line, *ty, key, KeyUse::Create)?;
                let attrs = self.rewrite_attrs(line, attrs)?;
                self.session.create_as(assert, &id, &attrs)?;
            }
            RecordKind::Remove { ty, key } => {
                let id = self.id(line, *ty, key, KeyUse::Evict)?;
                self.session.remove_as(assert, &id)?;
            }
            RecordKind::Set { ty, key, attr } => {
                let id = self.id(line, *ty, key, KeyUse::Lookup)?;
                let attr = self.rewrite_attr(line, attr)?;
                self.session.set_as(assert, &id, &attr)?;
            }
            RecordKind::Get { ty, key, attrs } => {
                let id = self.id(line, *ty, key, KeyUse::Lookup)?;
                let attrs = self.rewrite_attrs(line, attrs)?;
                let reply =
                    self.session.get_as(StatusPolicy::Tolerate, &id, &attrs)?;
                if reply.is_success() {
                    self.queue_response(&reply.value)?;
                } else {
                    debug!(self.log, "get {id} failed: {}", reply.status;
                        "line" => line);
                }
            }
            RecordKind::GetResponse { attrs, .. } => {
                self.map_response(line, attrs)?;
                return Ok(false);
            }
            RecordKind::BulkCreate { ty, members } => {
                let keys = self.objects(
                    line,
                    *ty,
                    members.iter().map(|m| &m.key),
                    KeyUse::Create,
                )?;
                let attrs = members
                    .iter()
                    .map(|m| self.rewrite_attrs(line, &m.attrs))
                    .collect::<ChallengerResult<Vec<_>>>()?;
                self.session.bulk_create_as(assert, *ty, &keys, &attrs)?;
            }
            RecordKind::BulkRemove { ty, keys } => {
                let keys =
                    self.objects(line, *ty, keys.iter(), KeyUse::Evict)?;
                self.session.bulk_remove_as(assert, *ty, &keys)?;
            }
            RecordKind::BulkSet { ty, members } => {
                let keys = self.objects(
                    line,
                    *ty,
                    members.iter().map(|m| &m.key),
                    KeyUse::Lookup,
                )?;
                let attrs = members
                    .iter()
                    .flat_map(|m| m.attrs.iter())
                    .map(|a| self.rewrite_attr(line, a))
                    .collect::<ChallengerResult<Vec<_>>>()?;
                self.session.bulk_set_as(assert, *ty, &keys, &attrs)?;
            }
            RecordKind::Ignored { action, .. } => {
                warn!(self.log, "skipping record";
                    "line" => line,
                    "action" => action);
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Replay already-parsed records on top of the session's current state.
pub fn replay_records<T: Transport>(
    session: &mut Session<T>,
    records: &[Record],
) -> ChallengerResult<ReplaySummary> {
    let mut replayer = Replayer::new(session);
    let mut summary = ReplaySummary::default();
    for record in records {
        if replayer.apply(record)? {
            summary.applied += 1;
        } else if matches!(record.kind, RecordKind::Ignored { .. }) {
            summary.skipped += 1;
        }
    }
    if !replayer.pending.is_empty() {
        warn!(replayer.log, "log ends with an unanswered get";
            "pending" => replayer.pending.len());
    }
    info!(replayer.log, "replay complete";
        "applied" => summary.applied,
        "skipped" => summary.skipped,
        "mapped" => replayer.session.replay_map().len());
    for (rec, vid) in replayer.session.replay_map() {
        debug!(replayer.log, "{rec} -> {vid}");
    }
    Ok(summary)
}

/// Read a captured log.
pub fn read_records(path: &Path) -> ChallengerResult<Vec<Record>> {
    let text =
        std::fs::read_to_string(path).map_err(|err| ChallengerError::Io {
            ctx: format!("reading {}", path.display()),
            err,
        })?;
    parse_records(&text)
}

/// Replay the log at `path` on a clean switch.  The whole log is parsed
/// before the device is flushed, so a malformed log leaves the switch alone.
pub fn apply_rec<T: Transport>(
    session: &mut Session<T>,
    path: &Path,
) -> ChallengerResult<ReplaySummary> {
    let records = read_records(path)?;
    info!(session.log(), "replaying {}", path.display();
        "records" => records.len());
    session.cleanup()?;
    replay_records(session, &records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::test_log;
    use pretty_assertions::assert_eq;
    use sal::{Reply, ResultValue};
    use transport::stub::{StubConfig, StubHandle};

    const SWITCH: &str = "oid:0x21000000000000";

    fn stub_session() -> Session<StubHandle> {
        let log = test_log();
        Session::new(&log, StubHandle::new(&log, &StubConfig::default()))
    }

    fn replay(
        session: &mut Session<StubHandle>,
        log: &str,
    ) -> ChallengerResult<ReplaySummary> {
        replay_records(session, &parse_records(log)?)
    }

    #[test]
    fn test_value_handles() {
        assert_eq!(value_handles("10").unwrap(), vec![]);
        assert_eq!(value_handles("oid:0x0").unwrap(), vec![Handle::NULL]);
        let both = value_handles("2:oid:0x1000000000002,oid:0x1000000000003")
            .unwrap();
        assert_eq!(both.len(), 2);
        assert_eq!(both[1].to_string(), "oid:0x1000000000003");
        assert_eq!(value_handles("0:null").unwrap(), vec![]);
    }

    #[test]
    fn test_create_and_remove() {
        let mut session = stub_session();
        let log = format!(
            "\
t|c|SAI_OBJECT_TYPE_SWITCH:{SWITCH}|SAI_SWITCH_ATTR_INIT_SWITCH=true
t|c|SAI_OBJECT_TYPE_VLAN:oid:0x26000000000abc|SAI_VLAN_ATTR_VLAN_ID=10
t|s|SAI_OBJECT_TYPE_VLAN:oid:0x26000000000abc|SAI_VLAN_ATTR_LEARN_DISABLE=true
t|n|switch_shutdown_request||
"
        );
        let summary = replay(&mut session, &log).unwrap();
        assert_eq!(
            summary,
            ReplaySummary {
                applied: 3,
                skipped: 1
            }
        );

        let recorded: Handle = "oid:0x26000000000abc".parse().unwrap();
        let vlan = *session.replay_map().get(&recorded).unwrap();
        assert_eq!(vlan.object_type().unwrap(), ObjectType::Vlan);
        assert_ne!(vlan, recorded);
        let id = ObjectId::new(ObjectType::Vlan, vlan);
        assert!(session.transport().contains(&id));
        let value = session
            .get(&id, &Attrs::new().with("SAI_VLAN_ATTR_LEARN_DISABLE", ""))
            .unwrap();
        assert_eq!(value.value.value().unwrap(), "true");

        replay(
            &mut session,
            "t|r|SAI_OBJECT_TYPE_VLAN:oid:0x26000000000abc",
        )
        .unwrap();
        assert!(!session.transport().contains(&id));
        assert!(session.replay_map().get(&recorded).is_none());
    }

    #[test]
    fn test_get_response_mapping() {
        let mut session = stub_session();
        let log = format!(
            "\
t|c|SAI_OBJECT_TYPE_SWITCH:{SWITCH}|SAI_SWITCH_ATTR_INIT_SWITCH=true
t|g|SAI_OBJECT_TYPE_SWITCH:{SWITCH}|SAI_SWITCH_ATTR_PORT_LIST=4:oid:0x0,oid:0x0,oid:0x0,oid:0x0
t|G|SAI_STATUS_SUCCESS|SAI_SWITCH_ATTR_PORT_LIST=4:oid:0x1000000000a01,oid:0x1000000000a02,oid:0x1000000000a03,oid:0x1000000000a04
t|s|SAI_OBJECT_TYPE_PORT:oid:0x1000000000a03|SAI_PORT_ATTR_MTU=9100
"
        );
        replay(&mut session, &log).unwrap();

        let recorded: Handle = "oid:0x1000000000a03".parse().unwrap();
        let port = *session.replay_map().get(&recorded).unwrap();
        assert_eq!(port.object_type().unwrap(), ObjectType::Port);
        let mtu = session
            .get(
                &ObjectId::new(ObjectType::Port, port),
                &Attrs::new().with("SAI_PORT_ATTR_MTU", ""),
            )
            .unwrap();
        assert_eq!(mtu.value.value().unwrap(), "9100");
    }

    #[test]
    fn test_unknown_handle() {
        let mut session = stub_session();
        let log = format!(
            "\
t|c|SAI_OBJECT_TYPE_SWITCH:{SWITCH}|SAI_SWITCH_ATTR_INIT_SWITCH=true
t|s|SAI_OBJECT_TYPE_PORT:oid:0x1000000000a03|SAI_PORT_ATTR_MTU=9100
"
        );
        let err = replay(&mut session, &log).unwrap_err();
        assert!(matches!(
            err,
            ChallengerError::UnknownHandle { line: 2, .. }
        ));
    }

    #[test]
    fn test_response_mismatch() {
        let mut session = stub_session();
        let log = format!(
            "\
t|c|SAI_OBJECT_TYPE_SWITCH:{SWITCH}|SAI_SWITCH_ATTR_INIT_SWITCH=true
t|g|SAI_OBJECT_TYPE_SWITCH:{SWITCH}|SAI_SWITCH_ATTR_CPU_PORT=oid:0x0
t|G|SAI_STATUS_SUCCESS|SAI_SWITCH_ATTR_PORT_LIST=2:oid:0x1000000000a01,oid:0x1000000000a02
"
        );
        let err = replay(&mut session, &log).unwrap_err();
        assert!(matches!(
            err,
            ChallengerError::ResponseMismatch {
                line: 3,
                expected: 1,
                found: 2
            }
        ));
    }

    #[test]
    fn test_entry_keys_rewritten() {
        let mut session = stub_session();
        let log = format!(
            r#"t|c|SAI_OBJECT_TYPE_SWITCH:{SWITCH}|SAI_SWITCH_ATTR_INIT_SWITCH=true
t|c|SAI_OBJECT_TYPE_VLAN:oid:0x26000000000abc|SAI_VLAN_ATTR_VLAN_ID=10
t|c|SAI_OBJECT_TYPE_FDB_ENTRY:{{"bvid":"oid:0x26000000000abc","mac":"00:11:11:11:11:11","switch_id":"{SWITCH}"}}|SAI_FDB_ENTRY_ATTR_TYPE=SAI_FDB_ENTRY_TYPE_STATIC
"#
        );
        replay(&mut session, &log).unwrap();

        let recorded: Handle = "oid:0x26000000000abc".parse().unwrap();
        let vlan = *session.replay_map().get(&recorded).unwrap();
        let switch = *session
            .replay_map()
            .get(&SWITCH.parse::<Handle>().unwrap())
            .unwrap();
        let key: CompositeKey = format!(
            r#"{{"bvid":"{vlan}","mac":"00:11:11:11:11:11","switch_id":"{switch}"}}"#
        )
        .parse()
        .unwrap();
        assert!(session
            .transport()
            .contains(&ObjectId::new(ObjectType::FdbEntry, key)));
    }

    #[test]
    fn test_bulk_set_members() {
        let mut session = stub_session();
        let log = format!(
            "\
t|c|SAI_OBJECT_TYPE_SWITCH:{SWITCH}|SAI_SWITCH_ATTR_INIT_SWITCH=true
t|C|SAI_OBJECT_TYPE_VLAN:2||oid:0x26000000000a01|SAI_VLAN_ATTR_VLAN_ID=10||oid:0x26000000000a02|SAI_VLAN_ATTR_VLAN_ID=20
t|S|SAI_OBJECT_TYPE_VLAN||oid:0x26000000000a01|SAI_VLAN_ATTR_LEARN_DISABLE=true||oid:0x26000000000a02|SAI_VLAN_ATTR_LEARN_DISABLE=false
"
        );
        replay(&mut session, &log).unwrap();

        for (recorded, learn) in [
            ("oid:0x26000000000a01", "true"),
            ("oid:0x26000000000a02", "false"),
        ] {
            let vid = *session
                .replay_map()
                .get(&recorded.parse::<Handle>().unwrap())
                .unwrap();
            let value = session
                .get(
                    &ObjectId::new(ObjectType::Vlan, vid),
                    &Attrs::new().with("SAI_VLAN_ATTR_LEARN_DISABLE", ""),
                )
                .unwrap();
            assert_eq!(value.value.value().unwrap(), learn, "{recorded}");
        }

        replay(
            &mut session,
            "t|R|SAI_OBJECT_TYPE_VLAN||oid:0x26000000000a01||oid:0x26000000000a02",
        )
        .unwrap();
        assert_eq!(session.replay_map().len(), 1);
    }

    #[test]
    fn test_bulk_set_member_handles() {
        let mut session = stub_session();
        let log = format!(
            "\
t|c|SAI_OBJECT_TYPE_SWITCH:{SWITCH}|SAI_SWITCH_ATTR_INIT_SWITCH=true
t|c|SAI_OBJECT_TYPE_POLICER:oid:0x12000000000a01|SAI_POLICER_ATTR_CIR=1000
t|c|SAI_OBJECT_TYPE_POLICER:oid:0x12000000000a02|SAI_POLICER_ATTR_CIR=2000
t|C|SAI_OBJECT_TYPE_VLAN:2||oid:0x26000000000a01|SAI_VLAN_ATTR_VLAN_ID=10||oid:0x26000000000a02|SAI_VLAN_ATTR_VLAN_ID=20
t|S|SAI_OBJECT_TYPE_VLAN:2||oid:0x26000000000a01|SAI_VLAN_ATTR_POLICER_ID=oid:0x12000000000a02||oid:0x26000000000a02|SAI_VLAN_ATTR_POLICER_ID=oid:0x12000000000a01
"
        );
        replay(&mut session, &log).unwrap();

        let mapped = |session: &Session<StubHandle>, recorded: &str| {
            *session
                .replay_map()
                .get(&recorded.parse::<Handle>().unwrap())
                .unwrap()
        };
        // Each VLAN carries the virtual handle of its own policer
        for (vlan, policer) in [
            ("oid:0x26000000000a01", "oid:0x12000000000a02"),
            ("oid:0x26000000000a02", "oid:0x12000000000a01"),
        ] {
            let vid = mapped(&session, vlan);
            let expected = mapped(&session, policer);
            assert_ne!(expected.to_string(), policer);
            let value = session
                .get(
                    &ObjectId::new(ObjectType::Vlan, vid),
                    &Attrs::new().with("SAI_VLAN_ATTR_POLICER_ID", ""),
                )
                .unwrap();
            assert_eq!(value.value.handle(1).unwrap(), expected, "{vlan}");
        }
    }

    #[test]
    fn test_oversized_handle() {
        let mut session = stub_session();
        let log = format!(
            "\
t|c|SAI_OBJECT_TYPE_SWITCH:{SWITCH}|SAI_SWITCH_ATTR_INIT_SWITCH=true
t|c|SAI_OBJECT_TYPE_VLAN:oid:0x26000000000abc|SAI_VLAN_ATTR_VLAN_ID=10
t|s|SAI_OBJECT_TYPE_VLAN:oid:0x26000000000abc|SAI_VLAN_ATTR_POLICER_ID=oid:0x1ffffffffffffffff
"
        );
        let err = replay(&mut session, &log).unwrap_err();
        assert!(
            matches!(err, ChallengerError::MalformedRecord { line: 3, .. }),
            "{err}"
        );
        assert!(err.is_replay());

        let vlan = *session
            .replay_map()
            .get(&"oid:0x26000000000abc".parse::<Handle>().unwrap())
            .unwrap();
        let value = session.get_as(
            StatusPolicy::Tolerate,
            &ObjectId::new(ObjectType::Vlan, vlan),
            &Attrs::new().with("SAI_VLAN_ATTR_POLICER_ID", ""),
        );
        assert!(!value.unwrap().status.is_success());
    }

    #[test]
    fn test_deterministic() {
        let log = format!(
            "\
t|c|SAI_OBJECT_TYPE_SWITCH:{SWITCH}|SAI_SWITCH_ATTR_INIT_SWITCH=true
t|c|SAI_OBJECT_TYPE_VLAN:oid:0x26000000000abc|SAI_VLAN_ATTR_VLAN_ID=10
t|c|SAI_OBJECT_TYPE_VLAN:oid:0x26000000000abd|SAI_VLAN_ATTR_VLAN_ID=20
"
        );
        let records = parse_records(&log).unwrap();
        let mut first = stub_session();
        replay_records(&mut first, &records).unwrap();
        let mut second = stub_session();
        replay_records(&mut second, &records).unwrap();
        assert_eq!(first.replay_map(), second.replay_map());
    }

    // A malformed log must not reach the device, not even for the flush that
    // starts a replay.
    #[test]
    fn test_malformed_log_untouched() -> anyhow::Result<()> {
        let dir = std::env::temp_dir()
            .join(format!("challenger-replay-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("bad.rec");
        std::fs::write(
            &path,
            format!(
                "\
t|c|SAI_OBJECT_TYPE_SWITCH:{SWITCH}|SAI_SWITCH_ATTR_INIT_SWITCH=true
t|C|SAI_OBJECT_TYPE_VLAN:3||oid:0x26000000000a01|SAI_VLAN_ATTR_VLAN_ID=10
"
            ),
        )?;

        // No expectations: any call on the transport panics
        let mut session = Session::new(&test_log(), MockTransport::new());
        let err = apply_rec(&mut session, &path).unwrap_err();
        assert!(matches!(
            err,
            ChallengerError::MalformedRecord { line: 2, .. }
        ));
        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }

    #[test]
    fn test_apply_rec_flushes() -> anyhow::Result<()> {
        let dir = std::env::temp_dir()
            .join(format!("challenger-apply-{}", std::process::id()));
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("switch.rec");
        std::fs::write(
            &path,
            format!(
                "t|c|SAI_OBJECT_TYPE_SWITCH:{SWITCH}|SAI_SWITCH_ATTR_INIT_SWITCH=true\n\
                 t|g|SAI_OBJECT_TYPE_SWITCH:{SWITCH}|SAI_SWITCH_ATTR_CPU_PORT=oid:0x0\n\
                 t|G|SAI_STATUS_SUCCESS|SAI_SWITCH_ATTR_CPU_PORT=oid:0x1000000000a00\n"
            ),
        )?;

        let mut transport = MockTransport::new();
        transport.expect_flush().times(1).returning(|| Ok(()));
        transport
            .expect_create()
            .times(1)
            .returning(|_, _| Ok(Reply::success(None)));
        transport.expect_get().times(1).returning(|_, attrs| {
            let name = &attrs.iter().next().unwrap().name;
            Ok(Reply::success(ResultValue::from_fields(&[
                name.as_str(),
                "oid:0x1000000000007",
            ])))
        });

        let mut session = Session::new(&test_log(), transport);
        let summary = apply_rec(&mut session, &path)?;
        assert_eq!(summary.applied, 2);
        let cpu: Handle = "oid:0x1000000000a00".parse()?;
        assert_eq!(
            session.replay_map().get(&cpu).map(|h| h.to_string()),
            Some("oid:0x1000000000007".to_string())
        );
        std::fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
