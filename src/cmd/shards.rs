/*!
`shards.rs`

Parsing of shard (instance) selectors like `0-2,5,7-9`.

An absent or empty selector means "all instances" and is represented as
`None`, which is distinct from an empty `ShardSet` (a set that would select
nothing). Every selector that parses successfully materializes into a
deduplicated, ascending set of instance ids.
*/

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

/// Raised when a selector token cannot be understood.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid shard selector token '{token}': {reason}")]
pub struct ShardParseError {
    pub token: String,
    pub reason: String,
}

impl ShardParseError {
    fn new(token: &str, reason: impl Into<String>) -> Self {
        Self {
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}

/// A canonical set of instance ids: deduplicated, iterated in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSet(BTreeSet<u32>);

impl ShardSet {
    /// Parse a comma-separated list of ids and inclusive `a-b` ranges.
    ///
    /// `None` or an empty/whitespace-only string yields `Ok(None)`, meaning
    /// no filter. A reversed range (`5-2`) is normalized by swapping its
    /// endpoints. Anything non-numeric, or a token with more than two
    /// dash-separated parts, is an error naming the offending token.
    pub fn parse(selector: Option<&str>) -> Result<Option<ShardSet>, ShardParseError> {
        let Some(text) = selector else {
            return Ok(None);
        };
        if text.trim().is_empty() {
            return Ok(None);
        }

        let mut ids = BTreeSet::new();
        for token in text.split(',') {
            let token = token.trim();
            let parts: Vec<&str> = token.split('-').collect();
            match parts.as_slice() {
                [single] => {
                    ids.insert(parse_id(token, single)?);
                }
                [start, end] => {
                    let a = parse_id(token, start)?;
                    let b = parse_id(token, end)?;
                    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                    ids.extend(lo..=hi);
                }
                _ => {
                    return Err(ShardParseError::new(
                        token,
                        "expected INDEX or START-END",
                    ));
                }
            }
        }
        Ok(Some(ShardSet(ids)))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Materialize as an ascending vector, the form the scheduler API takes.
    pub fn to_vec(&self) -> Vec<u32> {
        self.0.iter().copied().collect()
    }

    /// True when every id in `self` is also in `other`.
    pub fn is_subset(&self, other: &ShardSet) -> bool {
        self.0.is_subset(&other.0)
    }
}

impl FromIterator<u32> for ShardSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        ShardSet(iter.into_iter().collect())
    }
}

impl fmt::Display for ShardSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|id| id.to_string()).collect();
        f.write_str(&rendered.join(","))
    }
}

fn parse_id(token: &str, part: &str) -> Result<u32, ShardParseError> {
    part.trim()
        .parse::<u32>()
        .map_err(|_| ShardParseError::new(token, format!("'{}' is not a shard index", part.trim())))
}

/* --------------------------------- Tests ---------------------------------- */
