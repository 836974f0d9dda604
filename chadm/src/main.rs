// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::io::stdout;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use slog::info;
use structopt::*;
use strum::IntoEnumIterator;
use tabwriter::TabWriter;

use challenger::Session;
use common::logging::LogFormat;
use common::ObjectType;
use sal::Transport;
use transport::broker::BrokerHandle;
use transport::chaos::ChaosHandle;
use transport::stub::StubHandle;

mod config;
mod records;
mod replay;
mod run;

use config::{Config, TransportKind};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "chadm",
    about = "drives a switch through command lists and captured logs",
    version = "0.0.1"
)]
pub(crate) struct GlobalOpts {
    #[structopt(long, help = "TOML file with the harness settings")]
    config: Option<String>,

    #[structopt(long, help = "send log output to this file")]
    log_file: Option<String>,

    #[structopt(
        long,
        short = "l",
        help = "format logs for 'human' or 'json' consumption"
    )]
    log_format: Option<LogFormat>,

    #[structopt(
        long,
        short = "t",
        help = "reach the switch through 'stub', 'broker' or 'chaos'"
    )]
    transport: Option<TransportKind>,

    #[structopt(long, help = "number of front-panel ports on the switch")]
    ports: Option<usize>,

    #[structopt(long, help = "path to the chaos testing configuration")]
    chaos_config: Option<String>,

    #[structopt(
        long,
        help = "report failed operations instead of stopping at the first"
    )]
    tolerate: bool,

    #[structopt(subcommand)]
    cmd: Commands,
}

#[derive(Debug, StructOpt)]
enum Commands {
    /// Replay a captured log on a fresh switch.
    Replay {
        /// The captured log.
        file: PathBuf,
    },
    /// Run a JSON command list.
    Run(run::Run),
    /// Show the records of a captured log without replaying it.
    Records {
        #[structopt(short = "a")]
        /// Show only records with this action, e.g. 'c' or 'G'.
        action: Option<String>,
        /// The captured log.
        file: PathBuf,
    },
    /// List the object types the harness knows.
    #[structopt(visible_alias = "ls")]
    Types,
}

type BoxedTransport = Box<dyn Transport>;

fn build_transport(
    log: &slog::Logger,
    config: &Config,
) -> anyhow::Result<BoxedTransport> {
    let stub = StubHandle::new(log, &config.stub);
    let transport: BoxedTransport = match config.transport {
        TransportKind::Stub => Box::new(stub),
        TransportKind::Broker => Box::new(
            BrokerHandle::new(log, &config.broker, stub)
                .context("failed to start the broker")?,
        ),
        TransportKind::Chaos => Box::new(
            ChaosHandle::new(log, &config.chaos()?, stub)
                .context("invalid chaos config")?,
        ),
    };
    info!(log, "using the {} transport", config.transport);
    Ok(transport)
}

fn list_types() -> anyhow::Result<()> {
    let mut tw = TabWriter::new(stdout());
    writeln!(tw, "VALUE\tTYPE\tADDRESSED BY")?;
    for ty in ObjectType::iter() {
        let addressing = if ty.is_entry() { "key" } else { "handle" };
        writeln!(
            tw,
            "{:#x}\t{}\t{}",
            ty.value(),
            ty.short_name(),
            addressing
        )?;
    }
    tw.flush().map_err(|e| e.into())
}

fn main() -> anyhow::Result<()> {
    let opts = GlobalOpts::from_args();
    let config = config::build_config(&opts)?;

    match opts.cmd {
        Commands::Records { action, file } => {
            records::records_cmd(&file, action.as_deref())
        }
        Commands::Types => list_types(),
        cmd => {
            let log = common::logging::init(
                "chadm",
                &config.log_file,
                config.log_format,
            )?;
            let transport = build_transport(&log, &config)?;
            let mut session =
                Session::new(&log, transport).with_policy(config.policy);
            match cmd {
                Commands::Replay { file } => {
                    replay::replay_cmd(&mut session, &file)
                }
                Commands::Run(r) => run::run_cmd(&mut session, r),
                Commands::Records { .. } | Commands::Types => Ok(()),
            }
        }
    }
}
