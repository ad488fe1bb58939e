//! Maven-style versions, ranges and constraints.
//!
//! Ordering follows Maven's comparable-version rules rather than strict
//! semver, because repository content is published with Maven tooling:
//! `1.0 == 1.0.0`, `1.0-alpha-1 < 1.0-beta < 1.0-rc1 < 1.0-SNAPSHOT < 1.0 < 1.0-sp`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{RepoError, Result};

/// Well-known qualifiers in ascending order. The empty string is a release.
const QUALIFIERS: [&str; 7] = ["alpha", "beta", "milestone", "rc", "snapshot", "", "sp"];

/// Position of a release (empty qualifier) in [`QUALIFIERS`].
const RELEASE_INDEX: &str = "5";

#[derive(Debug, Clone)]
enum Item {
    /// Decimal digits without leading zeros ("" for zero).
    Int(String),
    Str(String),
    List(Vec<Item>),
}

fn qualifier_key(value: &str) -> String {
    match QUALIFIERS.iter().position(|q| *q == value) {
        Some(i) => i.to_string(),
        None => format!("{}-{}", QUALIFIERS.len(), value),
    }
}

fn compare_digits(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl Item {
    fn int(digits: &str) -> Item {
        Item::Int(digits.trim_start_matches('0').to_string())
    }

    fn string(value: &str, followed_by_digit: bool) -> Item {
        let value = match value {
            "a" if followed_by_digit => "alpha",
            "b" if followed_by_digit => "beta",
            "m" if followed_by_digit => "milestone",
            "ga" | "final" | "release" => "",
            "cr" => "rc",
            other => other,
        };
        Item::Str(value.to_string())
    }

    fn parse(is_digit: bool, token: &str) -> Item {
        if is_digit {
            Item::int(token)
        } else {
            Item::string(token, false)
        }
    }

    fn is_null(&self) -> bool {
        match self {
            Item::Int(digits) => digits.is_empty(),
            Item::Str(value) => qualifier_key(value) == RELEASE_INDEX,
            Item::List(items) => items.is_empty(),
        }
    }

    /// Compare against `other`, where `None` stands for a missing item.
    fn compare(&self, other: Option<&Item>) -> Ordering {
        match (self, other) {
            (Item::Int(a), None) => {
                if a.is_empty() {
                    Ordering::Equal
                } else {
                    Ordering::Greater
                }
            }
            (Item::Int(a), Some(Item::Int(b))) => compare_digits(a, b),
            (Item::Int(_), Some(_)) => Ordering::Greater,

            (Item::Str(a), None) => qualifier_key(a).as_str().cmp(RELEASE_INDEX),
            (Item::Str(_), Some(Item::Int(_))) => Ordering::Less,
            (Item::Str(a), Some(Item::Str(b))) => qualifier_key(a).cmp(&qualifier_key(b)),
            (Item::Str(_), Some(Item::List(_))) => Ordering::Less,

            (Item::List(items), None) => match items.first() {
                None => Ordering::Equal,
                Some(first) => first.compare(None),
            },
            (Item::List(_), Some(Item::Int(_))) => Ordering::Less,
            (Item::List(_), Some(Item::Str(_))) => Ordering::Greater,
            (Item::List(a), Some(Item::List(b))) => compare_lists(a, b),
        }
    }
}

fn compare_lists(a: &[Item], b: &[Item]) -> Ordering {
    for i in 0..a.len().max(b.len()) {
        let ord = match (a.get(i), b.get(i)) {
            (None, None) => Ordering::Equal,
            (None, Some(r)) => r.compare(None).reverse(),
            (Some(l), r) => l.compare(r),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Trim trailing null items, stopping at the first non-null non-list item.
fn normalize(items: &mut Vec<Item>) {
    let mut i = items.len();
    while i > 0 {
        i -= 1;
        if items[i].is_null() {
            items.remove(i);
        } else if !matches!(items[i], Item::List(_)) {
            break;
        }
    }
}

/// Builds the nested item list. Each `-` (and each digit/letter
/// transition) opens a sub-list.
fn parse_items(version: &str) -> Vec<Item> {
    let version = version.to_lowercase();
    // Stack of open lists; the last one receives new items.
    let mut stack: Vec<Vec<Item>> = vec![Vec::new()];
    let mut is_digit = false;
    let mut start = 0;

    fn push(stack: &mut [Vec<Item>], item: Item) {
        if let Some(top) = stack.last_mut() {
            top.push(item);
        }
    }

    for (i, c) in version.char_indices() {
        match c {
            '.' => {
                let item = if i == start {
                    Item::int("0")
                } else {
                    Item::parse(is_digit, &version[start..i])
                };
                push(&mut stack, item);
                start = i + 1;
            }
            '-' => {
                let item = if i == start {
                    Item::int("0")
                } else {
                    Item::parse(is_digit, &version[start..i])
                };
                push(&mut stack, item);
                start = i + 1;
                stack.push(Vec::new());
            }
            c if c.is_ascii_digit() => {
                if !is_digit && i > start {
                    push(&mut stack, Item::string(&version[start..i], true));
                    start = i;
                    stack.push(Vec::new());
                }
                is_digit = true;
            }
            _ => {
                if is_digit && i > start {
                    push(&mut stack, Item::parse(true, &version[start..i]));
                    start = i;
                    stack.push(Vec::new());
                }
                is_digit = false;
            }
        }
    }
    if version.len() > start {
        push(&mut stack, Item::parse(is_digit, &version[start..]));
    }

    // Close the nested lists innermost first.
    while stack.len() > 1 {
        let mut list = stack.pop().unwrap_or_default();
        normalize(&mut list);
        push(&mut stack, Item::List(list));
    }
    let mut root = stack.pop().unwrap_or_default();
    normalize(&mut root);
    root
}

/// A version string with Maven comparison semantics.
///
/// Any string is a valid version; the original spelling is kept for display.
#[derive(Debug, Clone)]
pub struct Version {
    original: String,
    items: Vec<Item>,
}

impl Version {
    /// Parse a version. Fails only on empty input.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(RepoError::InvalidVersion {
                version: s.to_string(),
                detail: "version is empty".to_string(),
            });
        }
        Ok(Version {
            original: trimmed.to_string(),
            items: parse_items(trimmed),
        })
    }

    /// The version as originally written.
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Whether this is a `-SNAPSHOT` version.
    pub fn is_snapshot(&self) -> bool {
        self.original.ends_with("-SNAPSHOT")
    }
}

impl FromStr for Version {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_lists(&self.items, &other.items)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

/// One end of a [`VersionRange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

/// A contiguous interval of versions; `None` bounds are unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

impl VersionRange {
    /// The range containing every version.
    pub fn all() -> Self {
        VersionRange {
            lower: None,
            upper: None,
        }
    }

    /// Whether `version` lies inside the range.
    pub fn contains(&self, version: &Version) -> bool {
        let above = match &self.lower {
            None => true,
            Some(b) if b.inclusive => *version >= b.version,
            Some(b) => *version > b.version,
        };
        let below = match &self.upper {
            None => true,
            Some(b) if b.inclusive => *version <= b.version,
            Some(b) => *version < b.version,
        };
        above && below
    }

    fn parse(spec: &str, whole: &str) -> Result<Self> {
        let err = |detail: &str| RepoError::InvalidRange {
            range: whole.to_string(),
            detail: detail.to_string(),
        };

        let lower_inclusive = spec.starts_with('[');
        let upper_inclusive = spec.ends_with(']');
        let inner = spec
            .get(1..spec.len().saturating_sub(1))
            .ok_or_else(|| err("range is too short"))?
            .trim();

        let Some((low, high)) = inner.split_once(',') else {
            if !(lower_inclusive && upper_inclusive) {
                return Err(err("single version must be surrounded by []"));
            }
            let version = Version::parse(inner).map_err(|_| err("empty single version"))?;
            return Ok(VersionRange {
                lower: Some(Bound {
                    version: version.clone(),
                    inclusive: true,
                }),
                upper: Some(Bound {
                    version,
                    inclusive: true,
                }),
            });
        };

        if high.contains(',') {
            return Err(err("too many commas in one range"));
        }

        let bound = |s: &str, inclusive: bool| -> Result<Option<Bound>> {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                Ok(Some(Bound {
                    version: Version::parse(s)?,
                    inclusive,
                }))
            }
        };
        let lower = bound(low, lower_inclusive)?;
        let upper = bound(high, upper_inclusive)?;

        if let (Some(l), Some(u)) = (&lower, &upper) {
            if u.version < l.version {
                return Err(err("upper bound must be greater than or equal to lower bound"));
            }
        }
        Ok(VersionRange { lower, upper })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(l), Some(u)) = (&self.lower, &self.upper) {
            if l.inclusive && u.inclusive && l.version == u.version {
                return write!(f, "[{}]", l.version);
            }
        }
        match &self.lower {
            Some(b) => write!(f, "{}{}", if b.inclusive { '[' } else { '(' }, b.version)?,
            None => f.write_str("(")?,
        }
        f.write_str(",")?;
        match &self.upper {
            Some(b) => write!(f, "{}{}", b.version, if b.inclusive { ']' } else { ')' }),
            None => f.write_str(")"),
        }
    }
}

/// A requested version: one exact version or a union of ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    Exact(Version),
    Ranges(Vec<VersionRange>),
}

impl VersionConstraint {
    /// Every version from the lowest upward (`[0,)`).
    pub fn any() -> Self {
        VersionConstraint::Ranges(vec![VersionRange {
            lower: Some(Bound {
                version: Version {
                    original: "0".to_string(),
                    items: parse_items("0"),
                },
                inclusive: true,
            }),
            upper: None,
        }])
    }

    /// Parse an exact version or a range expression such as
    /// `[1.0,2.0)` or `[1,2),[3,)`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if !(s.starts_with('[') || s.starts_with('(')) {
            return Ok(VersionConstraint::Exact(Version::parse(s)?));
        }

        let mut ranges = Vec::new();
        let mut rest = s;
        while rest.starts_with('[') || rest.starts_with('(') {
            let end = rest
                .find([']', ')'])
                .ok_or_else(|| RepoError::InvalidRange {
                    range: s.to_string(),
                    detail: "unbounded range".to_string(),
                })?;
            ranges.push(VersionRange::parse(&rest[..=end], s)?);
            rest = rest[end + 1..].trim_start();
            if let Some(stripped) = rest.strip_prefix(',') {
                rest = stripped.trim_start();
            }
        }
        if !rest.is_empty() {
            return Err(RepoError::InvalidRange {
                range: s.to_string(),
                detail: format!("unexpected trailing content '{rest}'"),
            });
        }
        Ok(VersionConstraint::Ranges(ranges))
    }

    /// Whether `version` satisfies the constraint.
    pub fn contains(&self, version: &Version) -> bool {
        match self {
            VersionConstraint::Exact(v) => v == version,
            VersionConstraint::Ranges(ranges) => ranges.iter().any(|r| r.contains(version)),
        }
    }

    /// Whether this is a single exact version.
    pub fn is_exact(&self) -> bool {
        matches!(self, VersionConstraint::Exact(_))
    }
}

impl FromStr for VersionConstraint {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self> {
        VersionConstraint::parse(s)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Exact(v) => write!(f, "{v}"),
            VersionConstraint::Ranges(ranges) => {
                let parts: Vec<String> = ranges.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn assert_order(ascending: &[&str]) {
        for pair in ascending.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn numeric_segments_compare_numerically() {
        assert_order(&["1", "1.1", "1.2", "1.10", "2.0", "10.0"]);
    }

    #[test]
    fn qualifier_ordering() {
        assert_order(&[
            "1.0-alpha-1",
            "1.0-beta",
            "1.0-milestone-1",
            "1.0-rc1",
            "1.0-SNAPSHOT",
            "1.0",
            "1.0-sp",
            "1.0-zzz",
            "1.0.1",
        ]);
    }

    #[test]
    fn trailing_zeros_are_insignificant() {
        assert_eq!(v("1"), v("1.0"));
        assert_eq!(v("1.0.0"), v("1.0"));
        assert_eq!(v("1.0-ga"), v("1"));
        assert_eq!(v("1.0.0-final"), v("1"));
        assert_eq!(v("1-cr1"), v("1-rc1"));
    }

    #[test]
    fn shorthand_qualifiers() {
        assert_eq!(v("1a1"), v("1-alpha-1"));
        assert_eq!(v("1b2"), v("1-beta-2"));
        assert_eq!(v("1m3"), v("1-milestone-3"));
    }

    #[test]
    fn snapshot_detection_and_display() {
        let version = v("0.1.0-SNAPSHOT");
        assert!(version.is_snapshot());
        assert_eq!(version.to_string(), "0.1.0-SNAPSHOT");
        assert!(!v("0.1.0").is_snapshot());
        assert!(Version::parse("  ").is_err());
    }

    #[test]
    fn parse_closed_and_open_ranges() {
        let c = VersionConstraint::parse("[1.0,2.0)").unwrap();
        assert!(c.contains(&v("1.0")));
        assert!(c.contains(&v("1.9.9")));
        assert!(!c.contains(&v("2.0")));
        assert!(!c.contains(&v("0.9")));

        let c = VersionConstraint::parse("(1.0,2.0]").unwrap();
        assert!(!c.contains(&v("1.0")));
        assert!(c.contains(&v("2.0")));
    }

    #[test]
    fn unbounded_ranges() {
        let any = VersionConstraint::parse("[0,)").unwrap();
        assert_eq!(any, VersionConstraint::any());
        assert!(any.contains(&v("0.1.0-SNAPSHOT")));
        assert!(any.contains(&v("99")));

        let upto = VersionConstraint::parse("(,1.0]").unwrap();
        assert!(upto.contains(&v("0.5")));
        assert!(!upto.contains(&v("1.1")));
    }

    #[test]
    fn single_version_range_and_exact() {
        let pinned = VersionConstraint::parse("[1.5]").unwrap();
        assert!(pinned.contains(&v("1.5")));
        assert!(!pinned.contains(&v("1.6")));
        assert!(!pinned.is_exact());

        let exact = VersionConstraint::parse("0.1.0-SNAPSHOT").unwrap();
        assert!(exact.is_exact());
        assert_eq!(exact.to_string(), "0.1.0-SNAPSHOT");
    }

    #[test]
    fn union_of_ranges() {
        let c = VersionConstraint::parse("[1,2),[3,4)").unwrap();
        assert!(c.contains(&v("1.5")));
        assert!(!c.contains(&v("2.5")));
        assert!(c.contains(&v("3")));
        assert_eq!(c.to_string(), "[1,2),[3,4)");
    }

    #[test]
    fn malformed_ranges_are_rejected() {
        for bad in ["[1.0", "(1.0)", "[2.0,1.0]", "[1,2,3]", "[1,2) junk"] {
            assert!(
                matches!(
                    VersionConstraint::parse(bad),
                    Err(RepoError::InvalidRange { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }
}
