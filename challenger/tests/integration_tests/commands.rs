// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use pretty_assertions::assert_eq;
use serde_json::json;

use challenger::command::{
    parse_commands, process_command, process_commands, Command, Op,
};
use challenger::registry::Descriptor;
use common::ObjectType;
use sal::{Attrs, Handle};

use super::common::stub_session;

fn vlan_member_commands() -> anyhow::Result<Vec<Command>> {
    let cmds = json!([
        {
            "op": "create",
            "type": "SAI_OBJECT_TYPE_VLAN",
            "name": "v10",
            "attributes": ["SAI_VLAN_ATTR_VLAN_ID", "10"]
        },
        {
            "op": "create",
            "type": "SAI_OBJECT_TYPE_VLAN_MEMBER",
            "name": "m1",
            "attributes": [
                "SAI_VLAN_MEMBER_ATTR_VLAN_ID", "$v10",
                "SAI_VLAN_MEMBER_ATTR_BRIDGE_PORT_ID", "$p1"
            ]
        }
    ]);
    Ok(parse_commands(&cmds.to_string())?)
}

// Seed the registry with `p1`, the first bridge port of a fresh switch.
fn seed_port(
    session: &mut challenger::Session<transport::stub::StubHandle>,
) -> anyhow::Result<Handle> {
    session.init_switch(&Attrs::new())?;
    let port: Handle = session
        .default_value("BRIDGE_PORT_0")
        .ok_or_else(|| anyhow::anyhow!("switch has no bridge ports"))?
        .parse()?;
    session
        .registry_mut()
        .insert("p1", Descriptor::new(ObjectType::BridgePort, port))?;
    Ok(port)
}

#[test]
fn test_vlan_member_resolution() -> anyhow::Result<()> {
    let mut session = stub_session();
    let port = seed_port(&mut session)?;

    let outcomes =
        process_commands(&mut session, &vlan_member_commands()?, false)?;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.is_success()));
    let vlan = outcomes[0].id.handle().unwrap();
    assert_eq!(vlan.object_type()?, ObjectType::Vlan);

    let member = process_command(
        &mut session,
        &Command::by_name(Op::Get, "m1")
            .with_attr("SAI_VLAN_MEMBER_ATTR_VLAN_ID", "")
            .with_attr("SAI_VLAN_MEMBER_ATTR_BRIDGE_PORT_ID", ""),
    )?;
    let value = member.value.unwrap();
    assert_eq!(value.handle(1)?, vlan);
    assert_eq!(value.handle(3)?, port);
    Ok(())
}

#[test]
fn test_teardown_restores_switch() -> anyhow::Result<()> {
    let mut session = stub_session();
    seed_port(&mut session)?;
    let baseline = session.transport().object_count();

    let cmds = vlan_member_commands()?;
    process_commands(&mut session, &cmds, false)?;
    assert_eq!(session.transport().object_count(), baseline + 2);

    // The member goes first; the VLAN could not be removed while in use
    let outcomes = process_commands(&mut session, &cmds, true)?;
    let removed: Vec<_> =
        outcomes.iter().map(|o| o.name.clone().unwrap()).collect();
    assert_eq!(removed, vec!["m1".to_string(), "v10".to_string()]);
    assert!(outcomes.iter().all(|o| o.op == Op::Remove));
    assert_eq!(session.transport().object_count(), baseline);
    assert_eq!(session.registry().len(), 1);
    assert!(session.registry().contains("p1"));
    Ok(())
}

#[test]
fn test_switch_defaults() -> anyhow::Result<()> {
    let mut session = stub_session();
    session.init_switch(&Attrs::new())?;

    let cmds = parse_commands(
        &json!([
            {
                "op": "create",
                "type": "SAI_OBJECT_TYPE_VLAN_MEMBER",
                "name": "member",
                "attributes": [
                    "SAI_VLAN_MEMBER_ATTR_VLAN_ID", "$DEFAULT_VLAN",
                    "SAI_VLAN_MEMBER_ATTR_BRIDGE_PORT_ID", "$BRIDGE_PORT_2"
                ]
            },
            {
                "op": "set",
                "name": "member",
                "attributes": [
                    "SAI_VLAN_MEMBER_ATTR_VLAN_TAGGING_MODE",
                    "SAI_VLAN_TAGGING_MODE_TAGGED"
                ]
            },
            {
                "op": "get",
                "name": "member",
                "attributes": ["SAI_VLAN_MEMBER_ATTR_VLAN_TAGGING_MODE", ""]
            }
        ])
        .to_string(),
    )?;
    let outcomes = process_commands(&mut session, &cmds, false)?;
    let tagging = outcomes[2].value.as_ref().unwrap().value()?;
    assert_eq!(tagging, "SAI_VLAN_TAGGING_MODE_TAGGED");

    let vlan = session.default_value("DEFAULT_VLAN").unwrap().to_string();
    let member = process_command(
        &mut session,
        &Command::by_name(Op::Get, "member")
            .with_attr("SAI_VLAN_MEMBER_ATTR_VLAN_ID", ""),
    )?;
    assert_eq!(member.value.unwrap().value()?, vlan);
    Ok(())
}

#[test]
fn test_unresolved_alias() -> anyhow::Result<()> {
    let mut session = stub_session();
    session.init_switch(&Attrs::new())?;
    let baseline = session.transport().object_count();

    let err = process_commands(&mut session, &vlan_member_commands()?, false)
        .unwrap_err();
    assert!(err.is_substitution(), "{err}");

    // The VLAN was created before the member failed to resolve `$p1`
    assert_eq!(session.transport().object_count(), baseline + 1);
    assert!(session.registry().contains("v10"));
    assert!(!session.registry().contains("m1"));
    Ok(())
}

#[test]
fn test_entry_keys() -> anyhow::Result<()> {
    let mut session = stub_session();
    session.init_switch(&Attrs::new())?;

    let cmds = parse_commands(
        &json!([
            {
                "op": "create",
                "type": "SAI_OBJECT_TYPE_VLAN",
                "name": "v20",
                "attributes": ["SAI_VLAN_ATTR_VLAN_ID", "20"]
            },
            {
                "op": "create",
                "type": "SAI_OBJECT_TYPE_FDB_ENTRY",
                "name": "fdb",
                "key": {
                    "bvid": "$v20",
                    "mac": "00:11:22:33:44:55",
                    "switch_id": "$SWITCH_ID"
                },
                "attributes": [
                    "SAI_FDB_ENTRY_ATTR_TYPE", "SAI_FDB_ENTRY_TYPE_STATIC",
                    "SAI_FDB_ENTRY_ATTR_BRIDGE_PORT_ID", "$BRIDGE_PORT_0"
                ]
            }
        ])
        .to_string(),
    )?;
    let outcomes = process_commands(&mut session, &cmds, false)?;
    let fdb = &outcomes[1].id;
    assert_eq!(fdb.object_type(), ObjectType::FdbEntry);
    assert!(session.transport().contains(fdb));

    let descriptor = session.registry().get("fdb").unwrap().clone();
    assert_eq!(descriptor.id(), *fdb);

    // Removing the VLAN first is refused by the device, and the alias goes
    // regardless
    let err =
        process_command(&mut session, &Command::by_name(Op::Remove, "v20"))
            .unwrap_err();
    assert!(err.status().is_some());
    assert!(!session.registry().contains("v20"));

    process_command(&mut session, &Command::by_name(Op::Remove, "fdb"))?;
    assert!(!session.transport().contains(fdb));
    Ok(())
}
