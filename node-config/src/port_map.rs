//! Inbound port remapping table for nodes running behind NAT.
//!
//! The table is read from `PORT_MAP` in the form
//! `originalPort:mappedPort[,originalPort:mappedPort]*`, for example
//! `443:10000,80:10001,8443:10002`.

use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PortMapError {
    #[error("invalid port mapping format: {0:?} (expected original:mapped)")]
    Format(String),

    #[error("invalid original port {value:?}: {source}")]
    InvalidOriginal {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid mapped port {value:?}: {source}")]
    InvalidMapped {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("port out of range (1-65535): {original}:{mapped}")]
    OutOfRange { original: i64, mapped: i64 },
}

/// Maps an inbound's configured port to the port it should actually bind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortMap(BTreeMap<u16, u16>);

static EMPTY: PortMap = PortMap(BTreeMap::new());

impl PortMap {
    pub fn new() -> Self {
        PortMap(BTreeMap::new())
    }

    /// A shared empty table, for callers that hold an `Option<PortMap>`.
    pub fn empty() -> &'static PortMap {
        &EMPTY
    }

    pub fn get(&self, original: u16) -> Option<u16> {
        self.0.get(&original).copied()
    }

    /// Inserts a mapping, returning the mapped port it replaced.
    pub fn insert(&mut self, original: u16, mapped: u16) -> Option<u16> {
        self.0.insert(original, mapped)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates `(original, mapped)` pairs in ascending original port order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.0.iter().map(|(original, mapped)| (*original, *mapped))
    }
}

impl FromIterator<(u16, u16)> for PortMap {
    fn from_iter<I: IntoIterator<Item = (u16, u16)>>(iter: I) -> Self {
        PortMap(iter.into_iter().collect())
    }
}

impl fmt::Display for PortMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (original, mapped)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{original}:{mapped}")?;
        }
        Ok(())
    }
}

impl FromStr for PortMap {
    type Err = PortMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse_port_map(s)?.unwrap_or_default())
    }
}

/// Parses a `PORT_MAP` value.
///
/// Returns `Ok(None)` for empty input so an unset variable can be told apart
/// from one that only holds separators or whitespace. Empty pairs are
/// skipped, and a repeated original port keeps the last mapping seen.
pub fn parse_port_map(value: &str) -> Result<Option<PortMap>, PortMapError> {
    if value.is_empty() {
        return Ok(None);
    }

    let mut port_map = PortMap::new();

    for pair in value.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }

        let Some((original, mapped)) = pair.split_once(':') else {
            return Err(PortMapError::Format(pair.to_string()));
        };

        let original_port = original.trim().parse::<i64>().map_err(|source| {
            PortMapError::InvalidOriginal {
                value: original.to_string(),
                source,
            }
        })?;
        let mapped_port = mapped.trim().parse::<i64>().map_err(|source| {
            PortMapError::InvalidMapped {
                value: mapped.to_string(),
                source,
            }
        })?;

        match (to_port(original_port), to_port(mapped_port)) {
            (Some(original), Some(mapped)) => {
                port_map.insert(original, mapped);
            }
            _ => {
                return Err(PortMapError::OutOfRange {
                    original: original_port,
                    mapped: mapped_port,
                });
            }
        }
    }

    Ok(Some(port_map))
}

fn to_port(value: i64) -> Option<u16> {
    u16::try_from(value).ok().filter(|port| *port != 0)
}
