// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Transport backends.  The stub is a self-contained in-memory switch; the
//! broker and chaos transports wrap another backend and change how it is
//! reached.

pub mod broker;
#[cfg(feature = "chaos")]
pub mod chaos;
pub mod stub;

#[cfg(test)]
pub(crate) fn test_log() -> slog::Logger {
    use slog::Drain;

    let decorator =
        slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    slog::Logger::root(drain, slog::o!())
}
