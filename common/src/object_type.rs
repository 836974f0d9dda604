// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, FromRepr, IntoEnumIterator, IntoStaticStr};

use crate::ParseError;

/// Prefix carried by every object type on the wire.
pub const OBJECT_TYPE_PREFIX: &str = "SAI_OBJECT_TYPE_";

/// Every category of object the switch API knows how to create.  The
/// discriminant is the stable numeric value used when encoding the type into
/// the upper bits of a handle.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    FromRepr,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(try_from = "String", into = "String")]
#[repr(u16)]
pub enum ObjectType {
    Port = 1,
    Lag = 2,
    VirtualRouter = 3,
    NextHop = 4,
    NextHopGroup = 5,
    RouterInterface = 6,
    AclTable = 7,
    AclEntry = 8,
    AclCounter = 9,
    AclRange = 10,
    AclTableGroup = 11,
    AclTableGroupMember = 12,
    Hostif = 13,
    MirrorSession = 14,
    Samplepacket = 15,
    Stp = 16,
    HostifTrapGroup = 17,
    Policer = 18,
    Wred = 19,
    QosMap = 20,
    Queue = 21,
    Scheduler = 22,
    SchedulerGroup = 23,
    BufferPool = 24,
    BufferProfile = 25,
    IngressPriorityGroup = 26,
    LagMember = 27,
    Hash = 28,
    Udf = 29,
    UdfMatch = 30,
    UdfGroup = 31,
    FdbEntry = 32,
    Switch = 33,
    HostifTrap = 34,
    HostifTableEntry = 35,
    NeighborEntry = 36,
    RouteEntry = 37,
    Vlan = 38,
    VlanMember = 39,
    HostifPacket = 40,
    TunnelMap = 41,
    Tunnel = 42,
    TunnelTermTableEntry = 43,
    FdbFlush = 44,
    NextHopGroupMember = 45,
    StpPort = 46,
    RpfGroup = 47,
    RpfGroupMember = 48,
    #[strum(serialize = "L2MC_GROUP")]
    L2mcGroup = 49,
    #[strum(serialize = "L2MC_GROUP_MEMBER")]
    L2mcGroupMember = 50,
    IpmcGroup = 51,
    IpmcGroupMember = 52,
    #[strum(serialize = "L2MC_ENTRY")]
    L2mcEntry = 53,
    IpmcEntry = 54,
    McastFdbEntry = 55,
    HostifUserDefinedTrap = 56,
    Bridge = 57,
    BridgePort = 58,
    TunnelMapEntry = 59,
    Tam = 60,
    #[strum(serialize = "SRV6_SIDLIST")]
    Srv6Sidlist = 61,
    PortPool = 62,
    InsegEntry = 63,
    Dtel = 64,
    DtelQueueReport = 65,
    DtelIntSession = 66,
    DtelReportSession = 67,
    DtelEvent = 68,
    BfdSession = 69,
    IsolationGroup = 70,
    IsolationGroupMember = 71,
    TamMathFunc = 72,
    TamReport = 73,
    TamEventThreshold = 74,
    TamTelType = 75,
    TamTransport = 76,
    TamTelemetry = 77,
    TamCollector = 78,
    TamEventAction = 79,
    TamEvent = 80,
    NatZoneCounter = 81,
    NatEntry = 82,
    TamInt = 83,
    Counter = 84,
    DebugCounter = 85,
    PortConnector = 86,
    PortSerdes = 87,
    Macsec = 88,
    MacsecPort = 89,
    MacsecFlow = 90,
    MacsecSc = 91,
    MacsecSa = 92,
    SystemPort = 93,
    FineGrainedHashField = 94,
    SwitchTunnel = 95,
    MySidEntry = 96,
    MyMac = 97,
    NextHopGroupMap = 98,
    Ipsec = 99,
    IpsecPort = 100,
    IpsecSa = 101,
    GenericProgrammable = 102,
    ArsProfile = 103,
    Ars = 104,
    AclTableChainGroup = 105,
    TwampSession = 106,
    TamCounterSubscription = 107,

    // DPU extensions.  These live outside the core range and are numbered
    // locally so they still fit in a handle's type bits.
    VipEntry = 0x100,
    DashAclGroup = 0x101,
    DashAclRule = 0x102,
    DirectionLookupEntry = 0x103,
    Eni = 0x104,
    EniEtherAddressMapEntry = 0x105,
    InboundRoutingEntry = 0x106,
    OutboundCaToPaEntry = 0x107,
    OutboundRoutingEntry = 0x108,
    PaValidationEntry = 0x109,
    Vnet = 0x10a,
}

impl ObjectType {
    /// The name without the `SAI_OBJECT_TYPE_` prefix, e.g. `VLAN_MEMBER`.
    pub fn short_name(&self) -> &'static str {
        self.into()
    }

    /// The stable numeric value of this type.
    pub fn value(&self) -> u16 {
        *self as u16
    }

    pub fn from_value(value: u16) -> Option<Self> {
        Self::from_repr(value)
    }

    /// Objects of these types are addressed by a composite key rather than by
    /// an allocated handle.
    pub fn is_entry(&self) -> bool {
        matches!(
            self,
            ObjectType::FdbEntry
                | ObjectType::NeighborEntry
                | ObjectType::RouteEntry
                | ObjectType::HostifTableEntry
                | ObjectType::TunnelTermTableEntry
                | ObjectType::L2mcEntry
                | ObjectType::IpmcEntry
                | ObjectType::McastFdbEntry
                | ObjectType::InsegEntry
                | ObjectType::NatEntry
                | ObjectType::MySidEntry
                | ObjectType::VipEntry
                | ObjectType::DirectionLookupEntry
                | ObjectType::EniEtherAddressMapEntry
                | ObjectType::InboundRoutingEntry
                | ObjectType::OutboundCaToPaEntry
                | ObjectType::OutboundRoutingEntry
                | ObjectType::PaValidationEntry
        )
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{OBJECT_TYPE_PREFIX}{}", self.short_name())
    }
}

impl FromStr for ObjectType {
    type Err = ParseError;

    /// Accepts both the full wire spelling and the bare short name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix(OBJECT_TYPE_PREFIX).unwrap_or(s);
        ObjectType::iter()
            .find(|t| t.short_name() == name)
            .ok_or_else(|| ParseError::ObjectType(s.to_string()))
    }
}

impl TryFrom<String> for ObjectType {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ObjectType> for String {
    fn from(t: ObjectType) -> Self {
        t.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wire_names() {
        assert_eq!(ObjectType::Port.to_string(), "SAI_OBJECT_TYPE_PORT");
        assert_eq!(
            ObjectType::VlanMember.to_string(),
            "SAI_OBJECT_TYPE_VLAN_MEMBER"
        );
        assert_eq!(
            ObjectType::OutboundCaToPaEntry.to_string(),
            "SAI_OBJECT_TYPE_OUTBOUND_CA_TO_PA_ENTRY"
        );
        assert_eq!(ObjectType::L2mcGroup.short_name(), "L2MC_GROUP");
        assert_eq!(ObjectType::Srv6Sidlist.short_name(), "SRV6_SIDLIST");
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            "SAI_OBJECT_TYPE_ROUTE_ENTRY".parse::<ObjectType>().unwrap(),
            ObjectType::RouteEntry
        );
        assert_eq!("VLAN".parse::<ObjectType>().unwrap(), ObjectType::Vlan);
        assert!("SAI_OBJECT_TYPE_NOPE".parse::<ObjectType>().is_err());
    }

    #[test]
    fn test_every_type_round_trips() {
        for t in ObjectType::iter() {
            assert_eq!(t.to_string().parse::<ObjectType>().unwrap(), t);
            assert_eq!(ObjectType::from_value(t.value()), Some(t));
        }
        assert!(ObjectType::iter().count() > 110);
    }

    #[test]
    fn test_numeric_values() {
        assert_eq!(ObjectType::Port.value(), 1);
        assert_eq!(ObjectType::Switch.value(), 33);
        assert_eq!(ObjectType::Vlan.value(), 38);
        assert_eq!(ObjectType::IpsecSa.value(), 101);
        assert_eq!(ObjectType::from_value(0), None);
    }

    #[test]
    fn test_serde() {
        let t: ObjectType =
            serde_json::from_str("\"SAI_OBJECT_TYPE_VLAN\"").unwrap();
        assert_eq!(t, ObjectType::Vlan);
        assert_eq!(
            serde_json::to_string(&ObjectType::Bridge).unwrap(),
            "\"SAI_OBJECT_TYPE_BRIDGE\""
        );
    }
}
