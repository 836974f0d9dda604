// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::time::Duration;

use slog::{debug, error, Logger};
use tokio::sync::mpsc;

use common::{ObjectType, Status};
use sal::{
    Attr, Attrs, ObjectId, ObjectRef, SalError, SalResult, Transport,
};

use super::codec::{self, Op};
use super::{Request, Response};

/// Serve requests from `rx` against `backend` until every client is gone.
pub(super) async fn serve<T>(
    log: Logger,
    backend: T,
    mut rx: mpsc::Receiver<Request>,
    latency: Duration,
) where
    T: Transport + Send + Sync + 'static,
{
    while let Some(Request {
        key,
        values,
        op,
        reply,
    }) = rx.recv().await
    {
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let (data, status) = match perform(&backend, op, &key, &values) {
            Ok(done) => done,
            Err(e) => {
                error!(log, "{op} failed"; "key" => &key, "error" => %e);
                let status = match e {
                    SalError::Parse(_) | SalError::InvalidArg(_) => {
                        Status::InvalidParameter
                    }
                    _ => Status::Failure,
                };
                (e.to_string(), status)
            }
        };
        let response = Response {
            op: op.response(),
            data,
            status: status.to_string(),
        };
        // The client may have timed out and gone away already.
        if reply.send(response).is_err() {
            debug!(log, "nobody waiting for {op} response"; "key" => &key);
        }
    }
    debug!(log, "responder exiting");
}

fn bulk_entries(
    key: &str,
    values: &str,
) -> SalResult<(ObjectType, Vec<(ObjectRef, String)>)> {
    let (ty, count) = key
        .split_once(':')
        .ok_or_else(|| SalError::Parse(format!("bad bulk key: {key}")))?;
    let ty = ty
        .parse::<ObjectType>()
        .map_err(|e| SalError::Parse(e.to_string()))?;
    let count = count
        .parse::<usize>()
        .map_err(|_| SalError::Parse(format!("bad bulk count: {key}")))?;
    let flat = codec::string_list(values)?;
    if flat.len() != count * 2 {
        return Err(SalError::InvalidArg(format!(
            "bulk key claims {count} entries but {} values were sent",
            flat.len()
        )));
    }
    let entries = flat
        .chunks(2)
        .map(|pair| Ok((pair[0].parse::<ObjectRef>()?, pair[1].clone())))
        .collect::<SalResult<Vec<_>>>()?;
    Ok((ty, entries))
}

fn perform<T: Transport>(
    backend: &T,
    op: Op,
    key: &str,
    values: &str,
) -> SalResult<(String, Status)> {
    match op {
        Op::Create => {
            let id: ObjectId = key.parse()?;
            let attrs = Attrs::from_flat(&codec::string_list(values)?)?;
            let reply = backend.create(&id, &attrs)?;
            let created =
                reply.value.map(|o| o.to_string()).unwrap_or_default();
            Ok((created, reply.status))
        }
        Op::Remove => {
            let reply = backend.remove(&key.parse()?)?;
            Ok((String::new(), reply.status))
        }
        Op::Set => {
            let attrs = Attrs::from_flat(&codec::string_list(values)?)?;
            let Some(attr) = attrs.iter().next() else {
                return Err(SalError::InvalidArg("set without attribute".into()));
            };
            let reply = backend.set(&key.parse()?, attr)?;
            Ok((String::new(), reply.status))
        }
        Op::Get => {
            let attrs = Attrs::from_flat(&codec::string_list(values)?)?;
            let reply = backend.get(&key.parse()?, &attrs)?;
            Ok((reply.value.raw().to_string(), reply.status))
        }
        Op::GetStats => {
            let counters = codec::string_list(values)?;
            let reply = backend.get_stats(&key.parse()?, &counters)?;
            Ok((reply.value.raw().to_string(), reply.status))
        }
        Op::ClearStats => {
            let counters = codec::string_list(values)?;
            let reply = backend.clear_stats(&key.parse()?, &counters)?;
            Ok((String::new(), reply.status))
        }
        Op::BulkCreate => {
            let (ty, entries) = bulk_entries(key, values)?;
            let (keys, attrs): (Vec<ObjectRef>, Vec<String>) =
                entries.into_iter().unzip();
            let attrs = attrs
                .iter()
                .map(|a| codec::parse_piped(a))
                .collect::<SalResult<Vec<Attrs>>>()?;
            let reply = backend.bulk_create(ty, &keys, &attrs)?;
            Ok((codec::encode_statuses(&reply.statuses)?, reply.status))
        }
        Op::BulkRemove => {
            let (ty, entries) = bulk_entries(key, values)?;
            let keys: Vec<ObjectRef> =
                entries.into_iter().map(|(k, _)| k).collect();
            let reply = backend.bulk_remove(ty, &keys)?;
            Ok((codec::encode_statuses(&reply.statuses)?, reply.status))
        }
        Op::BulkSet => {
            let (ty, entries) = bulk_entries(key, values)?;
            let (keys, attrs): (Vec<ObjectRef>, Vec<String>) =
                entries.into_iter().unzip();
            let attrs = attrs
                .iter()
                .map(|a| codec::parse_attr(a))
                .collect::<SalResult<Vec<Attr>>>()?;
            let reply = backend.bulk_set(ty, &keys, &attrs)?;
            Ok((codec::encode_statuses(&reply.statuses)?, reply.status))
        }
        Op::Flush => {
            backend.flush()?;
            Ok((String::new(), Status::Success))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_entries() {
        let values =
            r#"["oid:0x26000000000001","SAI_VLAN_ATTR_VLAN_ID=10"]"#;
        let (ty, entries) =
            bulk_entries("SAI_OBJECT_TYPE_VLAN:1", values).unwrap();
        assert_eq!(ty, ObjectType::Vlan);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1, "SAI_VLAN_ATTR_VLAN_ID=10");

        assert!(bulk_entries("SAI_OBJECT_TYPE_VLAN:2", values).is_err());
        assert!(bulk_entries("SAI_OBJECT_TYPE_VLAN", values).is_err());
    }
}
