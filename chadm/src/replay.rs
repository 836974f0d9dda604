// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::io::stdout;
use std::io::Write;
use std::path::Path;

use chrono::prelude::*;
use colored::Colorize;
use tabwriter::TabWriter;

use challenger::replay::apply_rec;
use challenger::Session;
use sal::Transport;

pub fn replay_cmd<T: Transport>(
    session: &mut Session<T>,
    file: &Path,
) -> anyhow::Result<()> {
    let start = Utc::now();
    let summary = apply_rec(session, file)?;
    let elapsed = Utc::now().signed_duration_since(start);

    let mut tw = TabWriter::new(stdout());
    writeln!(
        tw,
        "{}\t{}\t{}",
        "Recorded".underline(),
        "Virtual".underline(),
        "Type".underline()
    )?;
    for (recorded, vid) in session.replay_map() {
        let ty = match session.vid_to_type(*vid) {
            Ok(ty) => ty.short_name().to_string(),
            Err(_) => "-".to_string(),
        };
        writeln!(tw, "{recorded}\t{vid}\t{ty}")?;
    }
    tw.flush()?;

    println!(
        "\n{} records replayed, {} skipped, in {} ms",
        summary.applied,
        summary.skipped,
        elapsed.num_milliseconds()
    );
    Ok(())
}
