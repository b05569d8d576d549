//! Hostname to delivery service matching.
//!
//! Patterns are sorted into three buckets when a topology is loaded:
//!
//! 1. **Wildcard subdomain**: patterns shaped `.*\.<label>\..*`, keyed by `<label>`.
//! 2. **Exact**: patterns with no regex metacharacters, keyed by the whole hostname.
//! 3. **Regex**: everything else, compiled once and kept in build order.
//!
//! Lookups always check the buckets in that order. The wildcard bucket covers the
//! bulk of real traffic and is a single hash probe on the second label, so a host
//! whose subdomain is a wildcard key resolves there even when an exact or regex
//! pattern would also match it.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;

use crate::error::ConstructionError;

/// Characters that make a pattern a regular expression. `.` is absent on purpose: it
/// appears in every hostname and is treated literally in exact patterns.
const REGEX_METACHARACTERS: &[char] = &[
    '\\', '^', '$', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|',
];

const WILDCARD_PREFIX: &str = r".*\.";
const WILDCARD_SUFFIX: &str = r"\..*";

/// Immutable hostname matcher built from a topology's host patterns.
#[derive(Debug, Default)]
pub struct PatternMatcher {
    wildcard: HashMap<String, String>,
    exact: HashMap<String, String>,
    regexes: Vec<(Regex, String)>,
}

/// How a single pattern is stored.
#[derive(Debug, PartialEq, Eq)]
enum PatternKind<'a> {
    Wildcard(&'a str),
    Exact(&'a str),
    Regex(&'a str),
}

fn classify(pattern: &str) -> PatternKind<'_> {
    let label = pattern
        .strip_prefix(WILDCARD_PREFIX)
        .and_then(|rest| rest.strip_suffix(WILDCARD_SUFFIX))
        .filter(|label| {
            !label.is_empty() && !label.contains('.') && !label.contains(REGEX_METACHARACTERS)
        });

    match label {
        Some(label) => PatternKind::Wildcard(label),
        None if !pattern.contains(REGEX_METACHARACTERS) => PatternKind::Exact(pattern),
        None => PatternKind::Regex(pattern),
    }
}

/// Insert `key` for `ds`, failing if another delivery service already owns it.
fn claim(
    bucket: &mut HashMap<String, String>,
    key: &str,
    ds: &str,
) -> Result<(), ConstructionError> {
    let key = key.to_ascii_lowercase();
    match bucket.get(&key) {
        Some(owner) if owner != ds => Err(ConstructionError::DuplicatePattern {
            key,
            first: owner.clone(),
            second: ds.to_string(),
        }),
        Some(_) => Ok(()),
        None => {
            bucket.insert(key, ds.to_string());
            Ok(())
        }
    }
}

impl PatternMatcher {
    /// Build a matcher from delivery service name to host patterns.
    ///
    /// Regex patterns are kept in delivery service name order, then pattern order,
    /// which is also the order they are tried in.
    pub fn build(patterns: &BTreeMap<String, Vec<String>>) -> Result<Self, ConstructionError> {
        let mut matcher = Self::default();

        for (ds, list) in patterns {
            if list.is_empty() {
                return Err(ConstructionError::EmptyPatternList(ds.clone()));
            }

            for pattern in list {
                match classify(pattern) {
                    PatternKind::Wildcard(label) => claim(&mut matcher.wildcard, label, ds)?,
                    PatternKind::Exact(host) => claim(&mut matcher.exact, host, ds)?,
                    PatternKind::Regex(expr) => {
                        let re = Regex::new(&format!("(?i)^(?:{expr})$")).map_err(|e| {
                            ConstructionError::InvalidPattern {
                                ds: ds.clone(),
                                pattern: expr.to_string(),
                                reason: e.to_string(),
                            }
                        })?;
                        matcher.regexes.push((re, ds.clone()));
                    }
                }
            }
        }

        Ok(matcher)
    }

    /// Find the delivery service for a host split as `subsubdomain.subdomain.domain`.
    ///
    /// Labels are expected in lower case.
    pub fn lookup(&self, domain: &str, subdomain: &str, subsubdomain: &str) -> Option<&str> {
        if let Some(ds) = self.wildcard.get(subdomain) {
            return Some(ds);
        }

        let fqdn = format!("{subsubdomain}.{subdomain}.{domain}");
        if let Some(ds) = self.exact.get(&fqdn) {
            return Some(ds);
        }

        self.regexes
            .iter()
            .find(|(re, _)| re.is_match(&fqdn))
            .map(|(_, ds)| ds.as_str())
    }

    /// Number of (wildcard, exact, regex) patterns held.
    pub fn bucket_sizes(&self) -> (usize, usize, usize) {
        (self.wildcard.len(), self.exact.len(), self.regexes.len())
    }
}
