//! Allowlists of issuing regions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The set of ISO 3166 region codes whose numbers are accepted.
///
/// Codes are normalised to upper case. An empty policy accepts nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryPolicy {
    codes: BTreeSet<String>,
}

impl CountryPolicy {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            codes: codes
                .into_iter()
                .map(|c| c.as_ref().trim().to_ascii_uppercase())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    pub fn allows(&self, region: &str) -> bool {
        self.codes.contains(&region.to_ascii_uppercase())
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes(&self) -> &BTreeSet<String> {
        &self.codes
    }

    pub fn into_codes(self) -> BTreeSet<String> {
        self.codes
    }

    /// Policy accepting every region either policy accepts.
    pub fn union(&self, other: &CountryPolicy) -> CountryPolicy {
        Self {
            codes: self.codes.union(&other.codes).cloned().collect(),
        }
    }
}

impl From<BTreeSet<String>> for CountryPolicy {
    fn from(codes: BTreeSet<String>) -> Self {
        Self::new(codes)
    }
}

impl fmt::Display for CountryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.codes.is_empty() {
            return f.write_str("(none)");
        }
        let joined: Vec<&str> = self.codes.iter().map(String::as_str).collect();
        f.write_str(&joined.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_normalised() {
        let policy = CountryPolicy::new([" ph", "Jp", ""]);
        assert!(policy.allows("PH"));
        assert!(policy.allows("jp"));
        assert_eq!(policy.codes().len(), 2);
        assert_eq!(policy.to_string(), "JP, PH");
    }

    #[test]
    fn empty_policy_accepts_nothing() {
        let policy = CountryPolicy::default();
        assert!(!policy.allows("PH"));
        assert_eq!(policy.to_string(), "(none)");
    }

    #[test]
    fn union_merges_codes() {
        let merged = CountryPolicy::new(["PH"]).union(&CountryPolicy::new(["SG"]));
        assert!(merged.allows("PH") && merged.allows("SG"));
    }
}
