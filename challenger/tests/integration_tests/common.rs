// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::path::PathBuf;

use slog::Drain;

use challenger::Session;
use transport::stub::{StubConfig, StubHandle};

pub fn test_log() -> slog::Logger {
    let decorator =
        slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    slog::Logger::root(drain, slog::o!())
}

/// A session driving a fresh in-memory switch.
pub fn stub_session() -> Session<StubHandle> {
    let log = test_log();
    Session::new(&log, StubHandle::new(&log, &StubConfig::default()))
}

/// The path of a captured log under `tests/data`.
pub fn data_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}
