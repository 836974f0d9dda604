// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

//! Configuration for `chadm`.

use std::fmt;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use common::logging::LogFormat;
use sal::StatusPolicy;
use transport::broker::BrokerConfig;
use transport::chaos::TransportConfig;
use transport::stub::StubConfig;

/// Which transport the harness drives the switch through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Call the in-memory switch directly.
    #[default]
    Stub,
    /// Reach the in-memory switch through the request broker.
    Broker,
    /// Wrap the in-memory switch in synthetic failures.
    Chaos,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportKind::Stub => write!(f, "stub"),
            TransportKind::Broker => write!(f, "broker"),
            TransportKind::Chaos => write!(f, "chaos"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stub" => Ok(TransportKind::Stub),
            "broker" => Ok(TransportKind::Broker),
            "chaos" => Ok(TransportKind::Chaos),
            _ => Err(format!("invalid transport: {s}")),
        }
    }
}

/// The run-time settings, read from an optional TOML file and then
/// overridden by command-line options.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// If set, where the log should be written.  If not set, the log goes to
    /// stdout.
    pub log_file: Option<String>,

    /// Output log info in unstructured text or json?
    pub log_format: LogFormat,

    pub transport: TransportKind,

    /// What to do when the switch reports a failure.  Replay always asserts.
    pub policy: StatusPolicy,

    pub stub: StubConfig,

    pub broker: BrokerConfig,

    /// Where to find the chaos settings, when the chaos transport is used.
    pub chaos_config: Option<String>,
}

impl Config {
    /// The chaos settings named by `chaos_config`, or none at all.
    pub fn chaos(&self) -> anyhow::Result<TransportConfig> {
        let Some(path) = &self.chaos_config else {
            return Ok(TransportConfig::default());
        };
        let txt = std::fs::read_to_string(path)
            .with_context(|| format!("reading chaos config {path}"))?;
        let chaos: TransportConfig = toml::from_str(&txt)
            .with_context(|| format!("parsing chaos config {path}"))?;
        Ok(chaos)
    }
}

// Use the command-line arguments to update the run-time config.
fn update_from_cli(opts: &crate::GlobalOpts, config: &mut Config) {
    if let Some(log_file) = &opts.log_file {
        config.log_file = Some(log_file.to_string());
    }

    if let Some(log_format) = opts.log_format {
        config.log_format = log_format;
    }

    if let Some(transport) = opts.transport {
        config.transport = transport;
    }

    if opts.tolerate {
        config.policy = StatusPolicy::Tolerate;
    }

    if let Some(ports) = opts.ports {
        config.stub.ports = ports;
    }

    if let Some(path) = &opts.chaos_config {
        config.chaos_config = Some(path.to_string());
    }
}

fn parse_config(txt: &str) -> anyhow::Result<Config> {
    Ok(toml::from_str(txt)?)
}

pub(crate) fn build_config(
    opts: &crate::GlobalOpts,
) -> anyhow::Result<Config> {
    let mut config = match &opts.config {
        Some(path) => {
            let txt = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {path}"))?;
            parse_config(&txt)
                .with_context(|| format!("parsing config {path}"))?
        }
        None => Config::default(),
    };
    update_from_cli(opts, &mut config);
    Ok(config)
}
