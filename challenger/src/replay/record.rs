// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Parsing of captured operation logs.
//!
//! Every line starts with a timestamp, followed by `|`-separated fields:
//!
//! ```text
//! <time>|c|SAI_OBJECT_TYPE_VLAN:oid:0x26000000000001|SAI_VLAN_ATTR_VLAN_ID=10
//! <time>|s|SAI_OBJECT_TYPE_PORT:oid:0x1000000000002|SAI_PORT_ATTR_MTU=9100
//! <time>|r|SAI_OBJECT_TYPE_VLAN:oid:0x26000000000001
//! <time>|g|SAI_OBJECT_TYPE_SWITCH:oid:0x21000000000000|SAI_SWITCH_ATTR_CPU_PORT=oid:0x0
//! <time>|G|SAI_STATUS_SUCCESS|SAI_SWITCH_ATTR_CPU_PORT=oid:0x1000000000001
//! ```
//!
//! Bulk operations (`C`, `S` and `R`) carry their members after `||`:
//!
//! ```text
//! <time>|C|SAI_OBJECT_TYPE_ROUTE_ENTRY||{"dest":...}|attr=value||{"dest":...}|attr=value
//! ```
//!
//! The object type of a bulk line may carry the member count, as in
//! `SAI_OBJECT_TYPE_ROUTE_ENTRY:2`.

use std::fmt;

use common::{ObjectType, Status};
use sal::{Attr, Attrs};

use crate::types::{ChallengerError, ChallengerResult};

/// One member of a bulk record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub key: String,
    pub attrs: Attrs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    Create {
        ty: ObjectType,
        key: String,
        attrs: Attrs,
    },
    Remove {
        ty: ObjectType,
        key: String,
    },
    Set {
        ty: ObjectType,
        key: String,
        attr: Attr,
    },
    Get {
        ty: ObjectType,
        key: String,
        attrs: Attrs,
    },
    /// The device's answer to the preceding get.
    GetResponse {
        status: Option<Status>,
        attrs: Attrs,
    },
    BulkCreate {
        ty: ObjectType,
        members: Vec<Member>,
    },
    BulkRemove {
        ty: ObjectType,
        keys: Vec<String>,
    },
    /// Each member carries exactly one attribute.
    BulkSet {
        ty: ObjectType,
        members: Vec<Member>,
    },
    /// Anything the replay does not act on, such as notifications.
    Ignored {
        action: String,
        fields: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Line number in the log, starting at 1.
    pub line: usize,
    pub kind: RecordKind,
}

impl Record {
    pub fn action(&self) -> &str {
        match &self.kind {
            RecordKind::Create { .. } => "c",
            RecordKind::Remove { .. } => "r",
            RecordKind::Set { .. } => "s",
            RecordKind::Get { .. } => "g",
            RecordKind::GetResponse { .. } => "G",
            RecordKind::BulkCreate { .. } => "C",
            RecordKind::BulkRemove { .. } => "R",
            RecordKind::BulkSet { .. } => "S",
            RecordKind::Ignored { action, .. } => action,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} {}", self.line, self.action())?;
        match &self.kind {
            RecordKind::Create { ty, key, attrs }
            | RecordKind::Get { ty, key, attrs } => {
                write!(f, " {ty}:{key}")?;
                if !attrs.is_empty() {
                    write!(f, " {}", attrs.to_piped())?;
                }
                Ok(())
            }
            RecordKind::Remove { ty, key } => write!(f, " {ty}:{key}"),
            RecordKind::Set { ty, key, attr } => {
                write!(f, " {ty}:{key} {attr}")
            }
            RecordKind::GetResponse { status, attrs } => {
                match status {
                    Some(s) => write!(f, " {s}")?,
                    None => write!(f, " ?")?,
                }
                if !attrs.is_empty() {
                    write!(f, " {}", attrs.to_piped())?;
                }
                Ok(())
            }
            RecordKind::BulkCreate { ty, members }
            | RecordKind::BulkSet { ty, members } => {
                write!(f, " {ty} x{}", members.len())
            }
            RecordKind::BulkRemove { ty, keys } => {
                write!(f, " {ty} x{}", keys.len())
            }
            RecordKind::Ignored { fields, .. } => {
                write!(f, " {}", fields.join("|"))
            }
        }
    }
}

fn malformed(line: usize, reason: impl Into<String>) -> ChallengerError {
    ChallengerError::MalformedRecord {
        line,
        reason: reason.into(),
    }
}

fn parse_attr(line: usize, text: &str) -> ChallengerResult<Attr> {
    text.split_once('=')
        .map(|(name, value)| Attr::new(name, value))
        .ok_or_else(|| malformed(line, format!("bad attribute \"{text}\"")))
}

fn parse_attrs(line: usize, fields: &[&str]) -> ChallengerResult<Attrs> {
    fields
        .iter()
        .filter(|f| !f.is_empty())
        .map(|f| parse_attr(line, f))
        .collect()
}

fn parse_type(line: usize, text: &str) -> ChallengerResult<ObjectType> {
    text.parse()
        .map_err(|_| malformed(line, format!("unknown object type {text}")))
}

// Split `TYPE:key` into its parts.
fn parse_object(
    line: usize,
    text: Option<&&str>,
) -> ChallengerResult<(ObjectType, String)> {
    let text = text.ok_or_else(|| malformed(line, "missing object"))?;
    let (ty, key) = text
        .split_once(':')
        .ok_or_else(|| malformed(line, format!("bad object {text}")))?;
    if key.is_empty() {
        return Err(malformed(line, format!("bad object {text}")));
    }
    Ok((parse_type(line, ty)?, key.to_string()))
}

// The header of a bulk line: `TYPE` or `TYPE:count`.
fn parse_bulk_header(
    line: usize,
    header: &[&str],
    members: usize,
) -> ChallengerResult<ObjectType> {
    let text = header
        .get(1)
        .ok_or_else(|| malformed(line, "missing object type"))?;
    let ty = match text.split_once(':') {
        Some((ty, count)) => {
            let count: usize = count.parse().map_err(|_| {
                malformed(line, format!("bad member count {count}"))
            })?;
            if count != members {
                return Err(malformed(
                    line,
                    format!("{count} members announced, {members} present"),
                ));
            }
            ty
        }
        None => text,
    };
    if members == 0 {
        return Err(malformed(line, "bulk operation without members"));
    }
    parse_type(line, ty)
}

fn parse_line(line: usize, text: &str) -> ChallengerResult<Option<Record>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let mut groups = text.split("||").map(|g| g.trim());
    let head: Vec<&str> = match groups.next() {
        Some(g) => g.split('|').skip(1).collect(),
        None => return Ok(None),
    };
    let rest: Vec<Vec<&str>> =
        groups.map(|g| g.split('|').collect()).collect();
    let Some(action) = head.first() else {
        return Ok(None);
    };

    let kind = match *action {
        "c" => {
            let (ty, key) = parse_object(line, head.get(1))?;
            RecordKind::Create {
                ty,
                key,
                attrs: parse_attrs(line, head.get(2..).unwrap_or_default())?,
            }
        }
        "r" => {
            let (ty, key) = parse_object(line, head.get(1))?;
            RecordKind::Remove { ty, key }
        }
        "s" => {
            let (ty, key) = parse_object(line, head.get(1))?;
            let attr = head
                .get(2)
                .ok_or_else(|| malformed(line, "set without attribute"))?;
            RecordKind::Set {
                ty,
                key,
                attr: parse_attr(line, attr)?,
            }
        }
        "g" => {
            let (ty, key) = parse_object(line, head.get(1))?;
            RecordKind::Get {
                ty,
                key,
                attrs: parse_attrs(line, head.get(2..).unwrap_or_default())?,
            }
        }
        "G" => RecordKind::GetResponse {
            status: head.get(1).and_then(|s| s.parse().ok()),
            attrs: parse_attrs(line, head.get(2..).unwrap_or_default())?,
        },
        "C" => {
            let ty = parse_bulk_header(line, &head, rest.len())?;
            let members = rest
                .iter()
                .map(|m| {
                    Ok(Member {
                        key: m[0].to_string(),
                        attrs: parse_attrs(line, &m[1..])?,
                    })
                })
                .collect::<ChallengerResult<Vec<_>>>()?;
            RecordKind::BulkCreate { ty, members }
        }
        "S" => {
            let ty = parse_bulk_header(line, &head, rest.len())?;
            let members = rest
                .iter()
                .map(|m| {
                    let attrs = parse_attrs(line, &m[1..])?;
                    if attrs.len() != 1 {
                        return Err(malformed(
                            line,
                            format!(
                                "bulk set member {} has {} attributes",
                                m[0],
                                attrs.len()
                            ),
                        ));
                    }
                    Ok(Member {
                        key: m[0].to_string(),
                        attrs,
                    })
                })
                .collect::<ChallengerResult<Vec<_>>>()?;
            RecordKind::BulkSet { ty, members }
        }
        "R" => {
            let ty = parse_bulk_header(line, &head, rest.len())?;
            RecordKind::BulkRemove {
                ty,
                keys: rest.iter().map(|m| m[0].to_string()).collect(),
            }
        }
        other => RecordKind::Ignored {
            action: other.to_string(),
            fields: head[1..].iter().map(|f| f.to_string()).collect(),
        },
    };
    Ok(Some(Record { line, kind }))
}

/// Parse a whole log.  Blank lines are dropped; any malformed line fails the
/// whole log.
pub fn parse_records(text: &str) -> ChallengerResult<Vec<Record>> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, line)| parse_line(idx + 1, line).transpose())
        .collect()
}
