// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::io::{stdout, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::bail;
use anyhow::Context;
use colored::*;
use structopt::*;
use tabwriter::TabWriter;

use challenger::command::{parse_commands, process_commands, Outcome};
use challenger::Session;
use sal::{Attrs, Transport};

#[derive(Debug, StructOpt)]
pub struct Run {
    /// Remove everything the list created once it has run.
    #[structopt(long)]
    teardown: bool,
    /// The list creates the switch itself; do not create one first.
    #[structopt(long)]
    no_init: bool,
    /// Offer a value for `$alias` references, as `alias=value`.
    #[structopt(short = "d", number_of_values = 1)]
    defaults: Vec<AliasDefault>,
    /// The JSON command list.
    file: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasDefault {
    alias: String,
    value: String,
}

impl FromStr for AliasDefault {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((alias, value)) = s.split_once('=') else {
            bail!("expected alias=value, found {s}");
        };
        let alias = alias.trim_start_matches('$');
        if alias.is_empty() {
            bail!("missing alias in {s}");
        }
        Ok(AliasDefault {
            alias: alias.to_string(),
            value: value.to_string(),
        })
    }
}

fn print_outcomes(
    tw: &mut TabWriter<std::io::Stdout>,
    outcomes: &[Outcome],
) -> anyhow::Result<()> {
    for o in outcomes {
        let status = if o.is_success() {
            o.status.to_string().normal()
        } else {
            o.status.to_string().red()
        };
        writeln!(
            tw,
            "{}\t{}\t{}\t{}",
            o.op,
            o.name.as_deref().unwrap_or("-"),
            o.id,
            status
        )?;
        if let Some(value) = &o.value {
            writeln!(tw, "\t\t{}\t", value.to_string().dimmed())?;
        }
    }
    Ok(())
}

pub fn run_cmd<T: Transport>(
    session: &mut Session<T>,
    run: Run,
) -> anyhow::Result<()> {
    let txt = std::fs::read_to_string(&run.file)
        .with_context(|| format!("reading {}", run.file.display()))?;
    let cmds = parse_commands(&txt)?;

    if !run.no_init {
        session
            .init_switch(&Attrs::new())
            .context("failed to create the switch")?;
    }
    for d in run.defaults {
        session.set_default(d.alias, d.value);
    }

    let mut tw = TabWriter::new(stdout());
    writeln!(
        tw,
        "{}\t{}\t{}\t{}",
        "Op".underline(),
        "Name".underline(),
        "Object".underline(),
        "Status".underline()
    )?;
    let outcomes = process_commands(session, &cmds, false)?;
    print_outcomes(&mut tw, &outcomes)?;

    if run.teardown {
        let removed = process_commands(session, &cmds, true)
            .context("teardown failed")?;
        print_outcomes(&mut tw, &removed)?;
    }
    tw.flush()?;
    Ok(())
}
