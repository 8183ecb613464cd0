//! Worker tube set resolution.

use std::fmt;

use crate::config::StokerConfig;
use crate::error::{Result, StokerError};

/// The ways a worker can be told which tubes to watch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TubeInput {
    /// Nothing given; use the configured defaults.
    #[default]
    Omitted,
    /// One tube.
    Name(String),
    /// A list of tubes.
    Names(Vec<String>),
    /// Legacy form: the list wrapped in another list.
    Wrapped(Vec<Vec<String>>),
}

impl From<&str> for TubeInput {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for TubeInput {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<Vec<String>> for TubeInput {
    fn from(names: Vec<String>) -> Self {
        Self::Names(names)
    }
}

impl From<Vec<&str>> for TubeInput {
    fn from(names: Vec<&str>) -> Self {
        Self::Names(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for TubeInput {
    fn from(names: &[&str]) -> Self {
        Self::Names(names.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<Vec<String>>> for TubeInput {
    fn from(lists: Vec<Vec<String>>) -> Self {
        Self::Wrapped(lists)
    }
}

impl From<Vec<Vec<&str>>> for TubeInput {
    fn from(lists: Vec<Vec<&str>>) -> Self {
        Self::Wrapped(
            lists
                .into_iter()
                .map(|l| l.into_iter().map(str::to_string).collect())
                .collect(),
        )
    }
}

impl<T: Into<TubeInput>> From<Option<T>> for TubeInput {
    fn from(input: Option<T>) -> Self {
        input.map(Into::into).unwrap_or(Self::Omitted)
    }
}

/// Ordered tube names a worker watches. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TubeSet(Vec<String>);

impl TubeSet {
    /// Logical tube names, in watch order.
    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// Broker-side tube names, with the configured namespace applied.
    pub fn expanded(&self, config: &StokerConfig) -> Vec<String> {
        self.0.iter().map(|n| config.expand_tube_name(n)).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for TubeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

/// Normalize a tube input into the set of tubes to watch.
///
/// Blank names are dropped. An input that ends up empty falls back to
/// `config.default_queues`, and fails with `NoTubesConfigured` if those are
/// empty too. Order is kept and duplicates are left alone.
pub fn resolve_tubes(config: &StokerConfig, input: impl Into<TubeInput>) -> Result<TubeSet> {
    let names = match input.into() {
        TubeInput::Omitted => Vec::new(),
        TubeInput::Name(name) => vec![name],
        TubeInput::Names(names) => names,
        TubeInput::Wrapped(lists) => lists.into_iter().flatten().collect(),
    };

    let names = non_blank(names);
    if !names.is_empty() {
        return Ok(TubeSet(names));
    }

    let defaults = non_blank(config.default_queues.clone());
    if defaults.is_empty() {
        return Err(StokerError::NoTubesConfigured);
    }
    Ok(TubeSet(defaults))
}

fn non_blank(names: Vec<String>) -> Vec<String> {
    names
        .into_iter()
        .filter(|n| !n.trim().is_empty())
        .collect()
}
