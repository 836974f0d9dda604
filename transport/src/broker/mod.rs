// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! A transport that talks to the device through a message broker.  Each
//! operation is posted as a `(key, values, op)` triple; a responder on the
//! other side performs it and posts back `(op-response, data, status)`.  The
//! client polls for the response a bounded number of times, so a device that
//! has stopped answering shows up as a timeout rather than a hang.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slog::{debug, o, Logger};
use tokio::sync::{mpsc, oneshot};

use common::{ObjectType, Status};
use sal::{
    Attr, Attrs, BulkReply, ObjectId, ObjectRef, Reply, ResultValue,
    SalError, SalResult, Transport,
};

mod codec;
mod responder;

pub use codec::Op;

/// Depth of the request queue between the client and the responder.
const QUEUE_DEPTH: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// How many times to look for a response before giving up.
    pub attempts: u32,
    /// How long to wait between looks, in milliseconds.
    pub poll_interval_ms: u64,
    /// Switch creation boots the device and gets a longer budget.
    pub switch_create_attempts: u32,
    pub switch_create_interval_ms: u64,
    /// Artificial delay the responder adds before handling each request.
    pub latency_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            attempts: 40,
            poll_interval_ms: 30,
            switch_create_attempts: 240,
            switch_create_interval_ms: 500,
            latency_ms: 0,
        }
    }
}

impl BrokerConfig {
    fn budget(&self, op: Op, key: &str) -> (u32, Duration) {
        let switch = ObjectType::Switch.to_string();
        let switch_create =
            op == Op::Create && key.split(':').next() == Some(switch.as_str());
        if switch_create {
            (
                self.switch_create_attempts,
                Duration::from_millis(self.switch_create_interval_ms),
            )
        } else {
            (self.attempts, Duration::from_millis(self.poll_interval_ms))
        }
    }
}

/// A request as posted to the broker.
#[derive(Debug)]
pub struct Request {
    pub key: String,
    pub values: String,
    pub op: Op,
    reply: oneshot::Sender<Response>,
}

/// A response as posted back by the responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub op: String,
    pub data: String,
    pub status: String,
}

pub struct BrokerHandle {
    log: Logger,
    config: BrokerConfig,
    tx: mpsc::Sender<Request>,
    // Owns the responder task; dropping it shuts the responder down.
    _rt: tokio::runtime::Runtime,
}

impl BrokerHandle {
    /// Start a responder serving `backend` and return a client for it.
    pub fn new<T>(
        log: &Logger,
        config: &BrokerConfig,
        backend: T,
    ) -> SalResult<Self>
    where
        T: Transport + Send + Sync + 'static,
    {
        let log = log.new(o!("unit" => "broker"));
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("broker-responder")
            .enable_time()
            .build()
            .map_err(|e| {
                SalError::Internal(format!("starting broker runtime: {e}"))
            })?;
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let latency = Duration::from_millis(config.latency_ms);
        rt.spawn(responder::serve(log.clone(), backend, rx, latency));

        Ok(BrokerHandle {
            log,
            config: config.clone(),
            tx,
            _rt: rt,
        })
    }

    /// Post a request and wait for its response.
    fn operate(
        &self,
        key: String,
        values: String,
        op: Op,
    ) -> SalResult<(String, Status)> {
        let (attempts, interval) = self.config.budget(op, &key);
        let (reply_tx, mut reply_rx) = oneshot::channel();
        debug!(self.log, "posting {op}"; "key" => &key, "values" => &values);
        self.tx
            .blocking_send(Request {
                key,
                values,
                op,
                reply: reply_tx,
            })
            .map_err(|_| {
                SalError::Disconnected("broker request queue closed".into())
            })?;

        for _ in 0..attempts {
            match reply_rx.try_recv() {
                Ok(response) => return self.decode(op, response),
                Err(oneshot::error::TryRecvError::Empty) => {
                    thread::sleep(interval)
                }
                Err(oneshot::error::TryRecvError::Closed) => {
                    return Err(SalError::Disconnected(format!(
                        "responder dropped {op} request"
                    )))
                }
            }
        }
        Err(SalError::Timeout {
            op: op.to_string(),
            waited: interval * attempts,
        })
    }

    fn decode(
        &self,
        op: Op,
        response: Response,
    ) -> SalResult<(String, Status)> {
        if response.op != op.response() {
            return Err(SalError::Internal(format!(
                "expected {} but got {}",
                op.response(),
                response.op
            )));
        }
        let status = response
            .status
            .parse::<Status>()
            .map_err(|e| SalError::Parse(e.to_string()))?;
        Ok((response.data, status))
    }

    fn operate_bulk(
        &self,
        ty: ObjectType,
        entries: Vec<String>,
        op: Op,
    ) -> SalResult<BulkReply> {
        let count = entries.len() / 2;
        let key = format!("{ty}:{count}");
        let values = codec::to_json(&entries)?;
        let (data, status) = self.operate(key, values, op)?;
        let statuses = codec::decode_statuses(&data)?;
        if statuses.len() != count {
            return Err(SalError::Internal(format!(
                "{count} entries but {} statuses",
                statuses.len()
            )));
        }
        Ok(BulkReply { status, statuses })
    }
}

impl Transport for BrokerHandle {
    fn create(
        &self,
        id: &ObjectId,
        attrs: &Attrs,
    ) -> SalResult<Reply<Option<ObjectRef>>> {
        let values = codec::to_json(&attrs.to_flat())?;
        let (data, status) =
            self.operate(id.to_string(), values, Op::Create)?;
        let object = match data.as_str() {
            "" => None,
            created => Some(created.parse::<ObjectRef>()?),
        };
        Ok(Reply::new(status, object))
    }

    fn remove(&self, id: &ObjectId) -> SalResult<Reply<()>> {
        let (_, status) =
            self.operate(id.to_string(), "[]".to_string(), Op::Remove)?;
        Ok(Reply::new(status, ()))
    }

    fn set(&self, id: &ObjectId, attr: &Attr) -> SalResult<Reply<()>> {
        let values =
            codec::to_json(&[attr.name.clone(), attr.value.clone()])?;
        let (_, status) = self.operate(id.to_string(), values, Op::Set)?;
        Ok(Reply::new(status, ()))
    }

    fn get(
        &self,
        id: &ObjectId,
        attrs: &Attrs,
    ) -> SalResult<Reply<ResultValue>> {
        let values = codec::to_json(&attrs.to_flat())?;
        let (data, status) = self.operate(id.to_string(), values, Op::Get)?;
        Ok(Reply::new(status, ResultValue::new(data)))
    }

    fn bulk_create(
        &self,
        ty: ObjectType,
        keys: &[ObjectRef],
        attrs: &[Attrs],
    ) -> SalResult<BulkReply> {
        let attrs = sal::broadcast_attrs(keys, attrs)?;
        let entries = keys
            .iter()
            .zip(attrs)
            .flat_map(|(k, a)| [k.to_string(), a.to_piped()])
            .collect();
        self.operate_bulk(ty, entries, Op::BulkCreate)
    }

    fn bulk_remove(
        &self,
        ty: ObjectType,
        keys: &[ObjectRef],
    ) -> SalResult<BulkReply> {
        let entries = keys
            .iter()
            .flat_map(|k| [k.to_string(), String::new()])
            .collect();
        self.operate_bulk(ty, entries, Op::BulkRemove)
    }

    fn bulk_set(
        &self,
        ty: ObjectType,
        keys: &[ObjectRef],
        attrs: &[Attr],
    ) -> SalResult<BulkReply> {
        if keys.len() != attrs.len() {
            return Err(SalError::InvalidArg(format!(
                "{} attributes supplied for {} keys",
                attrs.len(),
                keys.len()
            )));
        }
        let entries = keys
            .iter()
            .zip(attrs)
            .flat_map(|(k, a)| [k.to_string(), a.to_string()])
            .collect();
        self.operate_bulk(ty, entries, Op::BulkSet)
    }

    fn get_stats(
        &self,
        id: &ObjectId,
        counters: &[String],
    ) -> SalResult<Reply<ResultValue>> {
        let values = codec::to_json(counters)?;
        let (data, status) =
            self.operate(id.to_string(), values, Op::GetStats)?;
        Ok(Reply::new(status, ResultValue::new(data)))
    }

    fn clear_stats(
        &self,
        id: &ObjectId,
        counters: &[String],
    ) -> SalResult<Reply<()>> {
        let values = codec::to_json(counters)?;
        let (_, status) =
            self.operate(id.to_string(), values, Op::ClearStats)?;
        Ok(Reply::new(status, ()))
    }

    fn flush(&self) -> SalResult<()> {
        let (_, status) =
            self.operate(String::new(), "[]".to_string(), Op::Flush)?;
        Reply::new(status, ())
            .check(sal::StatusPolicy::Assert, "flush", "device")
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{StubConfig, StubHandle};
    use crate::test_log;
    use pretty_assertions::assert_eq;
    use sal::{make_list, Handle};

    fn fast_config() -> BrokerConfig {
        BrokerConfig {
            attempts: 500,
            poll_interval_ms: 1,
            switch_create_attempts: 500,
            switch_create_interval_ms: 1,
            latency_ms: 0,
        }
    }

    fn broker(config: &BrokerConfig) -> BrokerHandle {
        let log = test_log();
        let stub = StubHandle::new(&log, &StubConfig::default());
        BrokerHandle::new(&log, config, stub).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let b = broker(&fast_config());
        let switch = b
            .create(
                &ObjectId::Type(ObjectType::Switch),
                &Attrs::new().with("SAI_SWITCH_ATTR_INIT_SWITCH", "true"),
            )
            .unwrap();
        assert!(switch.is_success());
        let switch = ObjectId::new(ObjectType::Switch, switch.value.unwrap());

        let ports = b
            .get(
                &switch,
                &Attrs::new()
                    .with("SAI_SWITCH_ATTR_PORT_LIST", make_list(4, "oid:0x0")),
            )
            .unwrap();
        assert_eq!(ports.status, Status::Success);
        assert_eq!(ports.value.handles(1).unwrap().len(), 4);

        let vlan = Handle::new(ObjectType::Vlan, 1);
        let id = ObjectId::new(ObjectType::Vlan, vlan);
        let attrs = Attrs::new().with("SAI_VLAN_ATTR_VLAN_ID", "10");
        let created = b.create(&id, &attrs).unwrap();
        assert_eq!(created.value, Some(ObjectRef::Handle(vlan)));

        let attr = Attr::new("SAI_VLAN_ATTR_VLAN_ID", "11");
        assert!(b.set(&id, &attr).unwrap().is_success());
        let got = b
            .get(&id, &Attrs::new().with("SAI_VLAN_ATTR_VLAN_ID", ""))
            .unwrap();
        assert_eq!(got.value.value().unwrap(), "11");

        assert!(b.remove(&id).unwrap().is_success());
        assert_eq!(b.remove(&id).unwrap().status, Status::ItemNotFound);
    }

    #[test]
    fn test_bulk_round_trip() {
        let b = broker(&fast_config());
        let keys: Vec<ObjectRef> = (1..=2)
            .map(|i| Handle::new(ObjectType::Vlan, i).into())
            .collect();
        let reply = b
            .bulk_create(
                ObjectType::Vlan,
                &keys,
                &[
                    Attrs::new().with("SAI_VLAN_ATTR_VLAN_ID", "10"),
                    Attrs::new().with("SAI_VLAN_ATTR_VLAN_ID", "20"),
                ],
            )
            .unwrap();
        assert_eq!(reply.statuses, vec![Status::Success; 2]);

        let reply = b
            .bulk_set(
                ObjectType::Vlan,
                &keys,
                &[
                    Attr::new("SAI_VLAN_ATTR_LEARN_DISABLE", "true"),
                    Attr::new("SAI_VLAN_ATTR_LEARN_DISABLE", "false"),
                ],
            )
            .unwrap();
        assert_eq!(reply.status, Status::Success);

        let reply = b.bulk_remove(ObjectType::Vlan, &keys).unwrap();
        assert_eq!(reply.statuses, vec![Status::Success; 2]);
    }

    #[test]
    fn test_timeout() {
        let config = BrokerConfig {
            attempts: 3,
            poll_interval_ms: 1,
            latency_ms: 200,
            ..fast_config()
        };
        let b = broker(&config);
        let err = b
            .create(&ObjectId::Type(ObjectType::Vlan), &Attrs::new())
            .unwrap_err();
        assert!(matches!(err, SalError::Timeout { .. }), "got {err:?}");
    }

    #[test]
    fn test_switch_budget() {
        let config = BrokerConfig::default();
        let (attempts, interval) =
            config.budget(Op::Create, "SAI_OBJECT_TYPE_SWITCH");
        assert_eq!(attempts, 240);
        assert_eq!(interval, Duration::from_millis(500));
        let (attempts, interval) =
            config.budget(Op::Remove, "SAI_OBJECT_TYPE_SWITCH:oid:0x0");
        assert_eq!(attempts, 40);
        assert_eq!(interval, Duration::from_millis(30));
        let (attempts, _) =
            config.budget(Op::Create, "SAI_OBJECT_TYPE_SWITCH_TUNNEL");
        assert_eq!(attempts, 40);
    }

    #[test]
    fn test_flush() {
        let b = broker(&fast_config());
        let vlan = b
            .create(&ObjectId::Type(ObjectType::Vlan), &Attrs::new())
            .unwrap()
            .value
            .unwrap();
        b.flush().unwrap();
        let id = ObjectId::new(ObjectType::Vlan, vlan);
        assert_eq!(b.remove(&id).unwrap().status, Status::ItemNotFound);
    }
}
