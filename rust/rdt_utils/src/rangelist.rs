// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Range Lists
//!
//! Operators enter CPU cores and process IDs in a compact notation: a comma
//! separated list whose entries are either a single integer or an inclusive
//! `A-B` range. Ranges may be written in either direction, so `"11-1"` is the
//! same as `"1-11"`.
//!
//!```
//!     use rdt_utils::RangeList;
//!     let cores = RangeList::parse("0,1,45-47").unwrap();
//!     assert_eq!(cores.to_vec(), vec![0, 1, 45, 46, 47]);
//!     assert_eq!(cores.to_string(), "0-1,45-47");
//!```
//!
//! Parsing never trims or guesses: whitespace, empty entries and anything
//! that is not a non-negative integer fail with
//! [`CodecError::InvalidFormat`]. The empty string is the empty list.

use crate::error::CodecError;
use crate::error::Result;
use log::debug;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A sorted set of unique non-negative integers, e.g. the cores of a pool or
/// the PIDs of an app. Serializes as an ascending JSON array.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RangeList {
    ids: BTreeSet<usize>,
}

impl RangeList {
    /// Build a new empty RangeList.
    pub fn new() -> RangeList {
        RangeList::default()
    }

    /// Parse a range string such as `"1,2,3,4-11"`.
    ///
    /// Ranges are expanded without any bound, so `"0-4000000000"` allocates
    /// four billion ids. Use [`RangeList::parse_bounded`] for operator input.
    pub fn parse(list: &str) -> Result<RangeList> {
        parse_groups(list, None)
    }

    /// Like [`RangeList::parse`], but fail with [`CodecError::OutOfRange`] as
    /// soon as any value is larger than `max`. The check happens before a
    /// range is expanded.
    pub fn parse_bounded(list: &str, max: usize) -> Result<RangeList> {
        parse_groups(list, Some(max))
    }

    /// Number of IDs in the list.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: usize) -> bool {
        self.ids.contains(&id)
    }

    /// The largest ID, if any.
    pub fn max(&self) -> Option<usize> {
        self.ids.last().copied()
    }

    pub fn insert(&mut self, id: usize) -> bool {
        self.ids.insert(id)
    }

    /// Iterate over the IDs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.ids.iter().copied()
    }

    /// The IDs in ascending order.
    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }

    pub fn as_set(&self) -> &BTreeSet<usize> {
        &self.ids
    }
}

/// Parse a range string into an ascending, de-duplicated vector.
pub fn read_rangelist(list: &str) -> Result<Vec<usize>> {
    Ok(RangeList::parse(list)?.to_vec())
}

fn parse_id(token: &str, group: &str) -> Result<usize> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CodecError::InvalidFormat(format!(
            "'{}' is not an integer or an A-B range",
            group
        )));
    }
    token
        .parse::<usize>()
        .map_err(|_| CodecError::InvalidFormat(format!("'{}' does not fit in an integer", group)))
}

/// Parse a single `N` or `A-B` entry into an ascending inclusive pair.
fn parse_group(group: &str) -> Result<(usize, usize)> {
    let (start, end) = match group.split_once('-') {
        Some((first, last)) => (parse_id(first, group)?, parse_id(last, group)?),
        None => {
            let id = parse_id(group, group)?;
            (id, id)
        }
    };

    if start > end {
        Ok((end, start))
    } else {
        Ok((start, end))
    }
}

fn parse_groups(list: &str, ceiling: Option<usize>) -> Result<RangeList> {
    let mut ids = BTreeSet::new();
    if list.is_empty() {
        return Ok(RangeList { ids });
    }

    for group in list.split(',') {
        let (start, end) = parse_group(group)?;
        if let Some(max) = ceiling {
            if end > max {
                return Err(CodecError::OutOfRange {
                    what: "value",
                    value: end as u64,
                    max: max as u64,
                });
            }
        }
        ids.extend(start..=end);
    }

    debug!("parsed range list '{}' into {} ids", list, ids.len());
    Ok(RangeList { ids })
}

impl FromStr for RangeList {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        RangeList::parse(s)
    }
}

impl FromIterator<usize> for RangeList {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        RangeList {
            ids: iter.into_iter().collect(),
        }
    }
}

impl From<RangeList> for Vec<usize> {
    fn from(list: RangeList) -> Self {
        list.ids.into_iter().collect()
    }
}

/// Render consecutive runs as `A-B` and everything else as single values.
impl fmt::Display for RangeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_run(f: &mut fmt::Formatter<'_>, start: usize, end: usize) -> fmt::Result {
            if start == end {
                write!(f, "{start}")
            } else {
                write!(f, "{start}-{end}")
            }
        }

        let mut ids = self.ids.iter().copied();
        let Some(first) = ids.next() else {
            return Ok(());
        };

        let (mut start, mut end) = (first, first);
        for id in ids {
            if id == end + 1 {
                end = id;
            } else {
                write_run(f, start, end)?;
                write!(f, ",")?;
                start = id;
                end = id;
            }
        }
        write_run(f, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert!(RangeList::parse("").unwrap().is_empty());
        assert_eq!(read_rangelist("").unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_parse_mixed() {
        assert_eq!(
            read_rangelist("1,2,3,4-11").unwrap(),
            (1..=11).collect::<Vec<_>>()
        );
        assert_eq!(
            read_rangelist("1-10,11").unwrap(),
            (1..=11).collect::<Vec<_>>()
        );
        assert_eq!(read_rangelist("0,1,45-47").unwrap(), vec![0, 1, 45, 46, 47]);
    }

    #[test]
    fn test_parse_reversed_range() {
        assert_eq!(
            RangeList::parse("11-1").unwrap(),
            RangeList::parse("1-11").unwrap()
        );
        assert_eq!(read_rangelist("5-5").unwrap(), vec![5]);
    }

    #[test]
    fn test_parse_large_ids() {
        let pids = read_rangelist("36951-36959").unwrap();
        assert_eq!(pids.len(), 9);
        assert_eq!(pids.first(), Some(&36951));
        assert_eq!(pids.last(), Some(&36959));
    }

    #[test]
    fn test_parse_dedups_and_sorts() {
        assert_eq!(read_rangelist("7,3,3,1-4,2").unwrap(), vec![1, 2, 3, 4, 7]);
    }

    #[test]
    fn test_parse_invalid() {
        for list in [
            "a", " 1", "1 ", "1, 2", "-1", "1-", "-", ",", "1,", ",1", "1,,2", "1-2-3", "0--2",
            "+1", "1.5", "99999999999999999999999",
        ] {
            assert!(
                matches!(RangeList::parse(list), Err(CodecError::InvalidFormat(_))),
                "'{}' should be rejected",
                list
            );
        }
    }

    #[test]
    fn test_parse_bounded() {
        assert_eq!(
            RangeList::parse_bounded("1020-1024", 1024).unwrap().len(),
            5
        );
        assert_eq!(
            RangeList::parse_bounded("1024,1025", 1024),
            Err(CodecError::OutOfRange {
                what: "value",
                value: 1025,
                max: 1024
            })
        );
        // Rejected before the range is expanded.
        assert!(RangeList::parse_bounded("0-18446744073709551615", 1024).is_err());
    }

    #[test]
    fn test_display() {
        for s in ["0", "0-12", "0-1,3-4", "0,2-3,5-9999", "0-1,3,5-7,9,11-12"] {
            assert_eq!(RangeList::parse(s).unwrap().to_string(), s);
        }
        assert_eq!(RangeList::new().to_string(), "");
        assert_eq!(RangeList::parse("4-1,9").unwrap().to_string(), "1-4,9");
    }

    #[test]
    fn test_display_parse_idempotent() {
        for s in ["1-10,11", "11-1", "1,2,3,4-11", "5,3,1", "36951-36959,2"] {
            let list = RangeList::parse(s).unwrap();
            assert_eq!(RangeList::parse(&list.to_string()).unwrap(), list);
        }
    }

    #[test]
    fn test_serialize_as_array() {
        let list = RangeList::parse("3,0-2").unwrap();
        assert_eq!(serde_json::to_string(&list).unwrap(), "[0,1,2,3]");
        let back: RangeList = serde_json::from_str("[2,1,1]").unwrap();
        assert_eq!(back.to_vec(), vec![1, 2]);
    }
}
