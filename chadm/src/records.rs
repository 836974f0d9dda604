// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::io::stdout;
use std::io::Write;
use std::path::Path;

use colored::Colorize;
use tabwriter::TabWriter;

use challenger::replay::{read_records, Record, RecordKind};

// The object a record applies to, or the status it reports.
fn subject(record: &Record) -> String {
    match &record.kind {
        RecordKind::Create { ty, key, .. }
        | RecordKind::Remove { ty, key }
        | RecordKind::Set { ty, key, .. }
        | RecordKind::Get { ty, key, .. } => {
            format!("{}:{key}", ty.short_name())
        }
        RecordKind::GetResponse { status, .. } => match status {
            Some(s) => s.to_string(),
            None => "-".to_string(),
        },
        RecordKind::BulkCreate { ty, members }
        | RecordKind::BulkSet { ty, members } => {
            format!("{} x{}", ty.short_name(), members.len())
        }
        RecordKind::BulkRemove { ty, keys } => {
            format!("{} x{}", ty.short_name(), keys.len())
        }
        RecordKind::Ignored { fields, .. } => {
            fields.first().cloned().unwrap_or_default()
        }
    }
}

fn detail(record: &Record) -> String {
    match &record.kind {
        RecordKind::Create { attrs, .. }
        | RecordKind::Get { attrs, .. }
        | RecordKind::GetResponse { attrs, .. } => attrs.to_piped(),
        RecordKind::Set { attr, .. } => attr.to_string(),
        _ => String::new(),
    }
}

pub fn records_cmd(file: &Path, action: Option<&str>) -> anyhow::Result<()> {
    let records = read_records(file)?;

    let mut tw = TabWriter::new(stdout());
    writeln!(
        tw,
        "{}\t{}\t{}\t{}",
        "Line".underline(),
        "Action".underline(),
        "Object".underline(),
        "Attributes".underline()
    )?;
    for record in records
        .iter()
        .filter(|r| action.map_or(true, |a| r.action() == a))
    {
        let act = match &record.kind {
            RecordKind::Ignored { action, .. } => action.dimmed(),
            _ => record.action().normal(),
        };
        writeln!(
            tw,
            "{}\t{}\t{}\t{}",
            record.line,
            act,
            subject(record),
            detail(record)
        )?;
    }
    tw.flush()?;
    Ok(())
}
