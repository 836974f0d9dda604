// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Declarative command lists.  Each command names an operation, the object it
//! applies to and its attributes; commands refer to the objects created by
//! earlier commands with `$alias` strings, which are resolved against the
//! session's registry just before the command runs.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use slog::{debug, warn};

use common::{ObjectType, Status};
use sal::{
    Attr, Attrs, CompositeKey, Handle, ObjectId, ObjectRef, ResultValue,
    Transport,
};

use crate::registry::Descriptor;
use crate::types::{ChallengerError, ChallengerResult};
use crate::Session;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    #[default]
    Create,
    Remove,
    Get,
    Set,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Op::Create => "create",
            Op::Remove => "remove",
            Op::Get => "get",
            Op::Set => "set",
        };
        f.write_str(name)
    }
}

/// How a command names its object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandKey {
    /// A raw numeric handle.
    Raw(u64),
    /// Handle notation such as `oid:0x26000000000001`, full object notation
    /// such as `SAI_OBJECT_TYPE_VLAN:oid:0x26000000000001`, or a `$alias`.
    Literal(String),
    /// The fields of a composite key.  String values may be `$alias`
    /// references.
    Entry(Map<String, Value>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub op: Op,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<ObjectType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<CommandKey>,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attributes: Attrs,
}

impl Command {
    pub fn new(op: Op, ty: ObjectType) -> Self {
        Command {
            op,
            ty: Some(ty),
            ..Default::default()
        }
    }

    /// A command addressing only a registered alias.
    pub fn by_name(op: Op, name: impl Into<String>) -> Self {
        Command {
            op,
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_key(mut self, key: CommandKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_attr(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attributes.push(name, value);
        self
    }

    // The command that undoes this one, if it is a create that can be
    // addressed afterwards.
    fn inverse(&self) -> Option<Command> {
        if self.op != Op::Create || (self.name.is_none() && self.key.is_none())
        {
            return None;
        }
        Some(Command {
            name: self.name.clone(),
            op: Op::Remove,
            ty: self.ty,
            key: self.key.clone(),
            attributes: Attrs::new(),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.op)?;
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        if let Some(ty) = &self.ty {
            write!(f, " {ty}")?;
        }
        Ok(())
    }
}

/// What a processed command did.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub op: Op,
    pub name: Option<String>,
    /// The object the command applied to.  For a create, the object that
    /// was created.
    pub id: ObjectId,
    pub status: Status,
    /// The attributes read by a get.
    pub value: Option<ResultValue>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

// Resolve a `$alias` reference.  Registered objects come first, then the
// session's defaults.
fn resolve_alias<T: Transport>(
    session: &Session<T>,
    alias: &str,
) -> ChallengerResult<Value> {
    if let Some(descriptor) = session.registry().get(alias) {
        return Ok(match &descriptor.object {
            ObjectRef::Handle(h) => Value::String(h.to_string()),
            ObjectRef::Key(k) => Value::Object(k.fields().clone()),
        });
    }
    match session.default_value(alias) {
        Some(value) => Ok(Value::String(value.to_string())),
        None => Err(ChallengerError::Substitution {
            alias: alias.to_string(),
        }),
    }
}

fn substitute_value<T: Transport>(
    session: &Session<T>,
    value: &Value,
) -> ChallengerResult<Value> {
    match value {
        Value::String(s) => match s.strip_prefix('$') {
            Some(alias) => resolve_alias(session, alias),
            None => Ok(value.clone()),
        },
        _ => Ok(value.clone()),
    }
}

/// Replace the `$alias` references in a composite key.
pub fn substitute_key<T: Transport>(
    session: &Session<T>,
    fields: &Map<String, Value>,
) -> ChallengerResult<CompositeKey> {
    let fields = fields
        .iter()
        .map(|(name, value)| {
            Ok((name.clone(), substitute_value(session, value)?))
        })
        .collect::<ChallengerResult<Map<String, Value>>>()?;
    Ok(CompositeKey::new(fields))
}

/// Replace the `$alias` references among attribute values.  An alias naming
/// an entry-style object is rendered as its compact JSON key.
pub fn substitute_attrs<T: Transport>(
    session: &Session<T>,
    attrs: &Attrs,
) -> ChallengerResult<Attrs> {
    attrs
        .iter()
        .map(|attr| {
            let Some(alias) = attr.value.strip_prefix('$') else {
                return Ok(attr.clone());
            };
            let value = match resolve_alias(session, alias)? {
                Value::String(s) => s,
                other => other.to_string(),
            };
            Ok(Attr::new(attr.name.clone(), value))
        })
        .collect()
}

fn require_type(
    cmd: &Command,
    ty: Option<ObjectType>,
) -> ChallengerResult<ObjectType> {
    ty.ok_or_else(|| {
        ChallengerError::InvalidCommand(format!("{cmd}: no object type"))
    })
}

fn handle_target<T: Transport>(
    session: &Session<T>,
    ty: Option<ObjectType>,
    handle: Handle,
) -> ChallengerResult<ObjectId> {
    let ty = match ty {
        Some(ty) => ty,
        None => session.vid_to_type(handle)?,
    };
    Ok(ObjectId::new(ty, handle))
}

fn literal_target<T: Transport>(
    session: &Session<T>,
    cmd: &Command,
    ty: Option<ObjectType>,
    literal: &str,
) -> ChallengerResult<ObjectId> {
    if literal.starts_with(common::OBJECT_TYPE_PREFIX) {
        return Ok(literal.parse::<ObjectId>()?);
    }
    if Handle::is_handle(literal) {
        return handle_target(session, ty, literal.parse()?);
    }
    Err(ChallengerError::InvalidCommand(format!(
        "{cmd}: cannot use \"{literal}\" as a key"
    )))
}

// Work out which object a command applies to.
fn resolve_target<T: Transport>(
    session: &Session<T>,
    cmd: &Command,
    descriptor: Option<&Descriptor>,
) -> ChallengerResult<ObjectId> {
    let ty = cmd.ty.or(descriptor.map(|d| d.ty));
    match &cmd.key {
        None => match descriptor {
            Some(d) => Ok(ObjectId::new(
                require_type(cmd, ty)?,
                d.object.clone(),
            )),
            None => Ok(ObjectId::Type(require_type(cmd, ty)?)),
        },
        Some(CommandKey::Entry(fields)) => {
            let ty = require_type(cmd, ty)?;
            Ok(ObjectId::new(ty, substitute_key(session, fields)?))
        }
        Some(CommandKey::Literal(literal)) => {
            let Some(alias) = literal.strip_prefix('$') else {
                return literal_target(session, cmd, ty, literal);
            };
            match resolve_alias(session, alias)? {
                Value::Object(fields) => Ok(ObjectId::new(
                    require_type(cmd, ty)?,
                    CompositeKey::new(fields),
                )),
                Value::String(s) => literal_target(session, cmd, ty, &s),
                other => Err(ChallengerError::InvalidCommand(format!(
                    "{cmd}: ${alias} resolves to {other}"
                ))),
            }
        }
        Some(CommandKey::Raw(raw)) => {
            handle_target(session, ty, Handle::from_raw(*raw))
        }
    }
}

/// Run a single command.  Aliases are resolved and checked before the
/// transport is called.
pub fn process_command<T: Transport>(
    session: &mut Session<T>,
    cmd: &Command,
) -> ChallengerResult<Outcome> {
    let descriptor = match (&cmd.name, cmd.op) {
        (None, _) | (_, Op::Create) => None,
        (Some(name), _) => session.registry().get(name).cloned(),
    };
    if let (Some(name), Op::Remove, None) = (&cmd.name, cmd.op, &descriptor)
    {
        return Err(ChallengerError::NoSuchAlias(name.clone()));
    }

    let attrs = substitute_attrs(session, &cmd.attributes)?;
    let id = resolve_target(session, cmd, descriptor.as_ref())?;
    match (&id, cmd.op) {
        (ObjectId::Type(ty), Op::Create) if ty.is_entry() => {
            return Err(ChallengerError::InvalidCommand(format!(
                "{cmd}: {ty} objects need a key"
            )));
        }
        (ObjectId::Type(_), op) if op != Op::Create => {
            return Err(ChallengerError::InvalidCommand(format!(
                "{cmd}: no object to {op}"
            )));
        }
        _ => {}
    }
    if let (Some(name), Op::Create) = (&cmd.name, cmd.op) {
        session.registry().check_insert(name, id.object_type())?;
    }
    debug!(session.log(), "{cmd}"; "id" => %id);

    let outcome = |id, status, value| Outcome {
        op: cmd.op,
        name: cmd.name.clone(),
        id,
        status,
        value,
    };

    match cmd.op {
        Op::Create => {
            let reply = session.create(&id, &attrs)?;
            let created = reply.value.object().filter(|_| reply.is_success());
            if let (Some(name), Some(object)) = (&cmd.name, created) {
                let created =
                    Descriptor::new(reply.value.object_type(), object.clone());
                session.registry_mut().insert(name, created)?;
            }
            Ok(outcome(reply.value, reply.status, None))
        }
        Op::Remove => {
            let removed = session.remove(&id);
            // The alias goes whether or not the device agreed.
            if let Some(name) = &cmd.name {
                session.registry_mut().remove(name)?;
            }
            Ok(outcome(id, removed?, None))
        }
        Op::Set => {
            if attrs.is_empty() {
                return Err(ChallengerError::InvalidCommand(format!(
                    "{cmd}: nothing to set"
                )));
            }
            let mut status = Status::Success;
            for attr in &attrs {
                let s = session.set(&id, attr)?;
                if status.is_success() {
                    status = s;
                }
            }
            Ok(outcome(id, status, None))
        }
        Op::Get => {
            let reply = session.get(&id, &attrs)?;
            Ok(outcome(id, reply.status, Some(reply.value)))
        }
    }
}

/// The commands that undo `cmds`: its creates, last first, turned into
/// removes.  A create with neither a name nor a key cannot be addressed
/// afterwards and is left out.
pub fn teardown_commands(
    log: &slog::Logger,
    cmds: &[Command],
) -> Vec<Command> {
    cmds.iter()
        .rev()
        .filter(|cmd| cmd.op == Op::Create)
        .filter_map(|cmd| {
            let inverse = cmd.inverse();
            if inverse.is_none() {
                warn!(log, "cannot undo unnamed {cmd}");
            }
            inverse
        })
        .collect()
}

/// Run a command list in order, or, if `cleanup` is set, the list that
/// undoes it.  Processing stops at the first error.
pub fn process_commands<T: Transport>(
    session: &mut Session<T>,
    cmds: &[Command],
    cleanup: bool,
) -> ChallengerResult<Vec<Outcome>> {
    let teardown;
    let cmds = if cleanup {
        teardown = teardown_commands(session.log(), cmds);
        &teardown[..]
    } else {
        cmds
    };
    cmds.iter()
        .map(|cmd| process_command(session, cmd))
        .collect()
}

/// Parse a JSON command list.
pub fn parse_commands(text: &str) -> ChallengerResult<Vec<Command>> {
    serde_json::from_str(text).map_err(|e| {
        ChallengerError::InvalidCommand(format!("bad command list: {e}"))
    })
}
