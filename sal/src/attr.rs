// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2025 Oxide Computer Company

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::SalError;

/// A single attribute name/value pair.  Values are always carried in their
/// textual wire form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attr {
    pub name: String,
    pub value: String,
}

impl Attr {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Attr {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// An ordered attribute list.  On the wire and in command lists this is the
/// flat `[name, value, name, value, ...]` form.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Value>", into = "Vec<String>")]
pub struct Attrs(Vec<Attr>);

impl Attrs {
    pub fn new() -> Self {
        Attrs(Vec::new())
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push(Attr::new(name, value));
    }

    pub fn with(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.push(name, value);
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attr> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Attr> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Build from the flat alternating form.  An odd-length list is
    /// rejected.
    pub fn from_flat<S: AsRef<str>>(flat: &[S]) -> Result<Self, SalError> {
        if flat.len() % 2 != 0 {
            return Err(SalError::InvalidArg(format!(
                "attribute list has odd length {}",
                flat.len()
            )));
        }
        Ok(Attrs(
            flat.chunks(2)
                .map(|pair| Attr::new(pair[0].as_ref(), pair[1].as_ref()))
                .collect(),
        ))
    }

    pub fn to_flat(&self) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|a| [a.name.clone(), a.value.clone()])
            .collect()
    }

    /// The `a=v|b=w` form used by bulk requests and captured logs.
    pub fn to_piped(&self) -> String {
        self.0
            .iter()
            .map(Attr::to_string)
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl FromIterator<Attr> for Attrs {
    fn from_iter<I: IntoIterator<Item = Attr>>(iter: I) -> Self {
        Attrs(iter.into_iter().collect())
    }
}

impl IntoIterator for Attrs {
    type Item = Attr;
    type IntoIter = std::vec::IntoIter<Attr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Attrs {
    type Item = &'a Attr;
    type IntoIter = std::slice::Iter<'a, Attr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl TryFrom<Vec<Value>> for Attrs {
    type Error = SalError;

    /// Non-string scalars are accepted and rendered as text, so that command
    /// lists may write `10` rather than `"10"`.
    fn try_from(flat: Vec<Value>) -> Result<Self, Self::Error> {
        let flat = flat
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect::<Vec<_>>();
        Attrs::from_flat(&flat)
    }
}

impl From<Attrs> for Vec<String> {
    fn from(attrs: Attrs) -> Self {
        attrs.to_flat()
    }
}

/// Render a list value as the device API expects it: `N:e,e,...`.
pub fn make_list(length: usize, elem: &str) -> String {
    let elems = vec![elem; length].join(",");
    format!("{length}:{elems}")
}
