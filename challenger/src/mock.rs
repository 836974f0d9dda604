// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use common::ObjectType;
use sal::{
    Attr, Attrs, BulkReply, Handle, ObjectId, ObjectRef, Reply, ResultValue,
    SalResult,
};

// A mock `Transport`, used to check exactly which calls the core makes.
mockall::mock! {
    pub Transport {}
    impl sal::Transport for Transport {
        fn create(
            &self,
            id: &ObjectId,
            attrs: &Attrs,
        ) -> SalResult<Reply<Option<ObjectRef>>>;
        fn remove(&self, id: &ObjectId) -> SalResult<Reply<()>>;
        fn set(&self, id: &ObjectId, attr: &Attr) -> SalResult<Reply<()>>;
        fn get(
            &self,
            id: &ObjectId,
            attrs: &Attrs,
        ) -> SalResult<Reply<ResultValue>>;
        fn bulk_create(
            &self,
            ty: ObjectType,
            keys: &[ObjectRef],
            attrs: &[Attrs],
        ) -> SalResult<BulkReply>;
        fn bulk_remove(
            &self,
            ty: ObjectType,
            keys: &[ObjectRef],
        ) -> SalResult<BulkReply>;
        fn bulk_set(
            &self,
            ty: ObjectType,
            keys: &[ObjectRef],
            attrs: &[Attr],
        ) -> SalResult<BulkReply>;
        fn get_stats(
            &self,
            id: &ObjectId,
            counters: &[String],
        ) -> SalResult<Reply<ResultValue>>;
        fn clear_stats(
            &self,
            id: &ObjectId,
            counters: &[String],
        ) -> SalResult<Reply<()>>;
        fn vid_to_type(&self, handle: Handle) -> SalResult<ObjectType>;
        fn flush(&self) -> SalResult<()>;
    }
}
