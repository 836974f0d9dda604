// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use pretty_assertions::assert_eq;

use challenger::replay::{apply_rec, read_records, RecordKind};
use challenger::types::ChallengerError;
use challenger::Session;
use common::ObjectType;
use sal::{Attrs, CompositeKey, Handle, ObjectId};
use transport::stub::StubHandle;

use super::common::{data_file, stub_session};

fn recorded(handle: &str) -> Handle {
    handle.parse().unwrap()
}

#[test]
fn test_vlan_log() -> anyhow::Result<()> {
    let mut session = stub_session();
    let summary = apply_rec(&mut session, &data_file("vlan.rec"))?;
    assert_eq!(summary.applied, 12);
    assert_eq!(summary.skipped, 2);

    // Switch, bridge, four ports, four bridge ports, the VLAN and its member
    let map = session.replay_map();
    assert_eq!(map.len(), 12);
    assert!(!map.contains_key(&recorded("oid:0x26000000000102")));

    let port = map[&recorded("oid:0x1000000000003")];
    let mtu = session.get(
        &ObjectId::new(ObjectType::Port, port),
        &Attrs::new().with("SAI_PORT_ATTR_MTU", ""),
    )?;
    assert_eq!(mtu.value.value()?, "9100");

    let member = map[&recorded("oid:0x27000000000101")];
    let value = session.get(
        &ObjectId::new(ObjectType::VlanMember, member),
        &Attrs::new()
            .with("SAI_VLAN_MEMBER_ATTR_VLAN_ID", "")
            .with("SAI_VLAN_MEMBER_ATTR_BRIDGE_PORT_ID", ""),
    )?;
    let vlan = map[&recorded("oid:0x26000000000100")];
    let bridge_port = map[&recorded("oid:0x3a000000000031")];
    assert_eq!(value.value.handle(1)?, vlan);
    assert_eq!(value.value.handle(3)?, bridge_port);

    // The FDB entry was created and removed again
    assert!(session
        .transport()
        .objects_of_type(ObjectType::FdbEntry)
        .is_empty());
    Ok(())
}

#[test]
fn test_replay_determinism() -> anyhow::Result<()> {
    let mut session = stub_session();
    let path = data_file("vlan.rec");

    // Recorded handles in the order of the handles standing in for them
    let order = |session: &Session<StubHandle>| {
        let mut pairs: Vec<(Handle, Handle)> = session
            .replay_map()
            .iter()
            .map(|(rec, vid)| (*vid, *rec))
            .collect();
        pairs.sort();
        pairs.into_iter().map(|(_, rec)| rec).collect::<Vec<_>>()
    };

    apply_rec(&mut session, &path)?;
    let first = order(&session);
    let first_vlan = session.replay_map()[&recorded("oid:0x26000000000100")];

    apply_rec(&mut session, &path)?;
    let second = order(&session);
    let second_vlan = session.replay_map()[&recorded("oid:0x26000000000100")];

    assert_eq!(first, second);
    // Our handles are freshly allocated on every run
    assert_ne!(first_vlan, second_vlan);
    Ok(())
}

#[test]
fn test_bulk_routes() -> anyhow::Result<()> {
    let mut session = stub_session();
    apply_rec(&mut session, &data_file("routes.rec"))?;

    let routes = session.transport().objects_of_type(ObjectType::RouteEntry);
    assert_eq!(routes.len(), 1);

    let switch = session.replay_map()[&recorded("oid:0x21000000000000")];
    let vr = session.replay_map()[&recorded("oid:0x3000000000022")];
    let key: CompositeKey = format!(
        r#"{{"dest":"10.0.0.0/24","switch_id":"{switch}","vr":"{vr}"}}"#
    )
    .parse()?;
    let action = session.get(
        &ObjectId::new(ObjectType::RouteEntry, key),
        &Attrs::new().with("SAI_ROUTE_ENTRY_ATTR_PACKET_ACTION", ""),
    )?;
    assert_eq!(action.value.value()?, "SAI_PACKET_ACTION_FORWARD");
    Ok(())
}

#[test]
fn test_inconsistent_bulk_record() -> anyhow::Result<()> {
    let path = data_file("bad_bulk.rec");
    let err = read_records(&path).unwrap_err();
    assert!(err.is_replay());

    // Nothing reaches the device, not even the flush
    let mut session = stub_session();
    session.init_switch(&Attrs::new())?;
    let baseline = session.transport().object_count();
    let err = apply_rec(&mut session, &path).unwrap_err();
    assert!(matches!(
        err,
        ChallengerError::MalformedRecord { line: 2, .. }
    ));
    assert_eq!(session.transport().object_count(), baseline);
    assert!(session.default_value("SWITCH_ID").is_some());
    Ok(())
}

#[test]
fn test_read_records() -> anyhow::Result<()> {
    let records = read_records(&data_file("routes.rec"))?;
    assert_eq!(records.len(), 6);
    let RecordKind::BulkCreate { ty, members } = &records[3].kind else {
        panic!("expected a bulk create, got {}", records[3]);
    };
    assert_eq!(*ty, ObjectType::RouteEntry);
    assert_eq!(members.len(), 2);

    let err = read_records(&data_file("missing.rec")).unwrap_err();
    assert!(matches!(err, ChallengerError::Io { .. }));
    Ok(())
}
