// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Input Validation
//!
//! Pure checks for operator input. Every check reports all the constraints
//! that failed, so a form can show a specific message per field. Nothing
//! here knows about any UI framework.
//!
//!```
//!     use rdt_utils::{validate, Config, Constraints, Violation};
//!     let res = validate("1024,1025", &Constraints::cores(&Config::default()));
//!     assert_eq!(res.violations(), &[Violation::AboveCeiling { what: "cores", max: 1024 }]);
//!     assert_eq!(res.violations()[0].to_string(), "limit cores to maximum number of 1024");
//!```

use crate::config::Config;
use crate::error::CodecError;
use crate::rangelist::RangeList;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref RANGE_LIST_RE: Regex =
        Regex::new(r"^[0-9]+(-[0-9]+)?(,[0-9]+(-[0-9]+)?)*$").unwrap();
    static ref NAME_RE: Regex = Regex::new(r"^[ -~]+$").unwrap();
}

/// A single failed constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Required,
    TooLong { max: usize },
    /// The string is not shaped like the expected notation.
    Pattern,
    /// A value is above the allowed maximum, e.g. a core index.
    AboveCeiling { what: &'static str, max: usize },
    OutOfBounds { min: u64, max: u64 },
    /// Frequency bounds are inverted.
    LessThanMin,
    Invalid(String),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Required => write!(f, "required"),
            Violation::TooLong { max } => write!(f, "max length {} characters", max),
            Violation::Pattern => write!(f, "invalid format"),
            Violation::AboveCeiling { what, max } => {
                write!(f, "limit {} to maximum number of {}", what, max)
            }
            Violation::OutOfBounds { min, max } => write!(f, "must be between {} and {}", min, max),
            Violation::LessThanMin => write!(f, "max must not be lower than min"),
            Violation::Invalid(msg) => write!(f, "{}", msg),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    violations: Vec<Violation>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.violations.extend(other.violations);
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msgs: Vec<String> = self.violations.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", msgs.join(", "))
    }
}

impl std::error::Error for ValidationResult {}

/// Constraints on a range string field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraints {
    pub required: bool,
    pub max_len: usize,
    /// Largest value allowed in the list, if bounded.
    pub max_value: Option<usize>,
    /// What the list holds, used in messages.
    pub what: &'static str,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            required: false,
            max_len: 4096,
            max_value: None,
            what: "values",
        }
    }
}

impl Constraints {
    /// A required core list bounded by the configured core count.
    pub fn cores(config: &Config) -> Self {
        Self {
            required: true,
            max_len: config.max_chars_cores,
            max_value: Some(config.max_cores),
            what: "cores",
        }
    }

    /// A required PID list bounded by the configured PID limit.
    pub fn pids(config: &Config) -> Self {
        Self {
            required: true,
            max_len: config.max_chars_pids,
            max_value: Some(config.max_pid),
            what: "pids",
        }
    }

    /// The same constraints with an empty string accepted.
    pub fn optional(self) -> Self {
        Self {
            required: false,
            ..self
        }
    }
}

/// Run every check and keep the parsed list when all of them pass.
fn check(input: &str, constraints: &Constraints) -> (ValidationResult, Option<RangeList>) {
    let mut res = ValidationResult::default();

    if input.is_empty() {
        if constraints.required {
            res.push(Violation::Required);
            return (res, None);
        }
        return (res, Some(RangeList::new()));
    }

    if input.len() > constraints.max_len {
        res.push(Violation::TooLong {
            max: constraints.max_len,
        });
    }

    if !RANGE_LIST_RE.is_match(input) {
        res.push(Violation::Pattern);
        return (res, None);
    }

    let parsed = match constraints.max_value {
        Some(max) => RangeList::parse_bounded(input, max),
        None => RangeList::parse(input),
    };
    let list = match parsed {
        Ok(list) => Some(list),
        Err(CodecError::OutOfRange { max, .. }) => {
            res.push(Violation::AboveCeiling {
                what: constraints.what,
                max: max as usize,
            });
            None
        }
        Err(e) => {
            res.push(Violation::Invalid(e.to_string()));
            None
        }
    };

    if !res.is_valid() {
        debug!("rejected {} list '{}': {}", constraints.what, input, res);
        return (res, None);
    }
    (res, list)
}

/// Check `input` against `constraints`.
///
/// Without a `max_value` nothing bounds the size of a range, so a short
/// string can describe billions of values. Operator input should always
/// carry a ceiling.
pub fn validate(input: &str, constraints: &Constraints) -> ValidationResult {
    check(input, constraints).0
}

/// Validate `input` and parse it in one go.
pub fn parse_validated(
    input: &str,
    constraints: &Constraints,
) -> std::result::Result<RangeList, ValidationResult> {
    match check(input, constraints) {
        (res, Some(list)) if res.is_valid() => Ok(list),
        (res, _) => Err(res),
    }
}

/// Names must be non-empty printable ASCII of at most `max_len` characters.
pub fn validate_name(name: &str, max_len: usize) -> ValidationResult {
    let mut res = ValidationResult::default();

    if name.is_empty() {
        res.push(Violation::Required);
        return res;
    }
    if !NAME_RE.is_match(name) {
        res.push(Violation::Pattern);
    }
    if name.chars().count() > max_len {
        res.push(Violation::TooLong { max: max_len });
    }
    res
}

fn validate_bounds(value: u64, min: u64, max: u64) -> ValidationResult {
    let mut res = ValidationResult::default();
    if value < min || value > max {
        res.push(Violation::OutOfBounds { min, max });
    }
    res
}

/// MBA bandwidth limit in MBps.
pub fn validate_mba_bw(value: u64, max: u64) -> ValidationResult {
    validate_bounds(value, 1, max)
}

/// MBA throttling percentage.
pub fn validate_mba_percent(value: u64) -> ValidationResult {
    validate_bounds(value, 1, 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MBA_BW_UNLIMITED;

    fn cores() -> Constraints {
        Constraints::cores(&Config::default())
    }

    #[test]
    fn test_valid_lists() {
        for list in ["0", "0-3", "1,2,3,4-11", "11-1", "0,1,45-47", "1024"] {
            assert!(validate(list, &cores()).is_valid(), "{}", list);
        }
    }

    #[test]
    fn test_required() {
        assert_eq!(validate("", &cores()).violations(), &[Violation::Required]);
        assert!(validate("", &cores().optional()).is_valid());
    }

    #[test]
    fn test_pattern() {
        for list in ["a", "1,", ",1", "1 ,2", "1--2", "1-2-3", "-1"] {
            assert_eq!(
                validate(list, &cores()).violations(),
                &[Violation::Pattern],
                "{}",
                list
            );
        }
    }

    #[test]
    fn test_too_long() {
        let list = vec!["1"; 2049].join(",");
        assert_eq!(list.len(), 4097);
        let res = validate(&list, &cores());
        assert_eq!(res.violations(), &[Violation::TooLong { max: 4096 }]);
        assert_eq!(res.to_string(), "max length 4096 characters");
    }

    #[test]
    fn test_ceiling() {
        let res = validate("1024,1025", &cores());
        assert_eq!(
            res.violations(),
            &[Violation::AboveCeiling {
                what: "cores",
                max: 1024
            }]
        );
        assert!(validate("1025", &Constraints::pids(&Config::default())).is_valid());
    }

    #[test]
    fn test_pid_ceiling() {
        let pids = Constraints::pids(&Config::default());
        let expected = [Violation::AboveCeiling {
            what: "pids",
            max: 4194304,
        }];

        // Both would expand to billions of ids if the ceiling were not
        // checked first.
        assert_eq!(
            validate("0-18446744073709551615", &pids).violations(),
            &expected
        );
        assert_eq!(
            parse_validated("1,0-4194305", &pids).unwrap_err().violations(),
            &expected
        );
        assert_eq!(parse_validated("4194300-4194304", &pids).unwrap().len(), 5);
    }

    #[test]
    fn test_overflowing_value() {
        let res = validate("99999999999999999999999", &Constraints::default());
        assert!(matches!(res.violations(), [Violation::Invalid(_)]));
    }

    #[test]
    fn test_parse_validated() {
        let pids = parse_validated("100-102", &Constraints::pids(&Config::default())).unwrap();
        assert_eq!(pids.to_vec(), vec![100, 101, 102]);

        let err = parse_validated("2000", &cores()).unwrap_err();
        assert!(!err.is_valid());

        assert!(parse_validated("", &cores().optional()).unwrap().is_empty());
        assert_eq!(
            parse_validated("", &cores()).unwrap_err().violations(),
            &[Violation::Required]
        );
        assert_eq!(
            parse_validated(&vec!["1"; 2049].join(","), &cores())
                .unwrap_err()
                .violations(),
            &[Violation::TooLong { max: 4096 }]
        );
    }

    #[test]
    fn test_name() {
        assert!(validate_name("pool 1", 80).is_valid());
        assert_eq!(validate_name("", 80).violations(), &[Violation::Required]);
        assert_eq!(validate_name("pöol", 80).violations(), &[Violation::Pattern]);
        assert_eq!(
            validate_name(&"a".repeat(81), 80).to_string(),
            "max length 80 characters"
        );
    }

    #[test]
    fn test_mba() {
        assert!(validate_mba_bw(1, MBA_BW_UNLIMITED).is_valid());
        assert!(validate_mba_bw(MBA_BW_UNLIMITED, MBA_BW_UNLIMITED).is_valid());
        assert!(!validate_mba_bw(0, MBA_BW_UNLIMITED).is_valid());
        assert!(!validate_mba_bw(MBA_BW_UNLIMITED + 1, MBA_BW_UNLIMITED).is_valid());
        assert!(validate_mba_percent(100).is_valid());
        assert!(!validate_mba_percent(101).is_valid());
    }
}
