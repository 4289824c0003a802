//! Phone-number verification.
//!
//! A number is accepted only when it parses into a structurally valid
//! number and the region that issued it is in the supplied policy. The
//! check is pure: no I/O, same inputs give the same verdict.

use phonenumber::{country, Mode, PhoneNumber};
use std::fmt;

use crate::{CountryPolicy, VerificationError};

/// Why a number was rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    /// The input is not a phone number at all.
    Unparseable,
    /// The input parsed but is not a valid number for any region.
    InvalidNumber,
    /// Valid, but issued by a region the policy does not accept.
    RegionNotAllowed { region: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unparseable => f.write_str("not a phone number"),
            Self::InvalidNumber => f.write_str("not a valid phone number"),
            Self::RegionNotAllowed { region } => {
                write!(f, "numbers issued in {region} are not accepted")
            }
        }
    }
}

/// Result of verifying one number against one policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhoneVerdict {
    pub accepted: bool,
    /// Region that issued the number, when it could be determined.
    pub issuing_code: Option<String>,
    /// International format, when the number parsed.
    pub normalized_number: Option<String>,
    pub reason: Option<RejectReason>,
}

impl PhoneVerdict {
    fn rejected(
        reason: RejectReason,
        issuing_code: Option<String>,
        normalized_number: Option<String>,
    ) -> Self {
        Self {
            accepted: false,
            issuing_code,
            normalized_number,
            reason: Some(reason),
        }
    }
}

/// Region-aware phone verifier.
#[derive(Clone, Debug)]
pub struct PhoneVerifier {
    /// Region assumed for numbers written without a country prefix.
    default_region: Option<country::Id>,
}

impl PhoneVerifier {
    /// Verifier that requires numbers in international form.
    pub fn new() -> Self {
        Self {
            default_region: None,
        }
    }

    /// Verifier that reads prefix-less numbers as belonging to `region`.
    pub fn with_default_region(region: &str) -> Result<Self, VerificationError> {
        let id = region
            .trim()
            .to_ascii_uppercase()
            .parse::<country::Id>()
            .map_err(|_| VerificationError::UnknownRegion(region.to_string()))?;
        Ok(Self {
            default_region: Some(id),
        })
    }

    pub fn verify(&self, phone_number: &str, policy: &CountryPolicy) -> PhoneVerdict {
        let parsed = match phonenumber::parse(self.default_region, phone_number.trim()) {
            Ok(number) => number,
            Err(_) => return PhoneVerdict::rejected(RejectReason::Unparseable, None, None),
        };
        let normalized = Some(international(&parsed));

        if !phonenumber::is_valid(&parsed) {
            return PhoneVerdict::rejected(RejectReason::InvalidNumber, None, normalized);
        }

        let Some(region) = parsed.country().id().map(region_code) else {
            return PhoneVerdict::rejected(RejectReason::InvalidNumber, None, normalized);
        };

        if !policy.allows(&region) {
            return PhoneVerdict::rejected(
                RejectReason::RegionNotAllowed {
                    region: region.clone(),
                },
                Some(region),
                normalized,
            );
        }

        PhoneVerdict {
            accepted: true,
            issuing_code: Some(region),
            normalized_number: normalized,
            reason: None,
        }
    }

    /// Verify a number taken from a shared contact.
    ///
    /// Contact cards carry the full international number but often drop the
    /// leading `+`. A bare digit string is read as international; one that
    /// starts with a national trunk `0` still goes through the default region.
    pub fn verify_international(&self, phone_number: &str, policy: &CountryPolicy) -> PhoneVerdict {
        match with_plus(phone_number) {
            Some(international) => self.verify(&international, policy),
            None => self.verify(phone_number, policy),
        }
    }
}

impl Default for PhoneVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `code` names a region the phone-number metadata knows about.
pub fn is_known_region(code: &str) -> bool {
    code.trim().to_ascii_uppercase().parse::<country::Id>().is_ok()
}

/// `+` followed by the digits of `raw`, when `raw` is a prefix-less
/// international number.
fn with_plus(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.starts_with('+') {
        return None;
    }
    let mut digits = String::with_capacity(raw.len() + 1);
    digits.push('+');
    for ch in raw.chars() {
        match ch {
            '0'..='9' => digits.push(ch),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return None,
        }
    }
    match digits.as_bytes().get(1) {
        None | Some(b'0') => None,
        Some(_) => Some(digits),
    }
}

fn international(number: &PhoneNumber) -> String {
    number.format().mode(Mode::International).to_string()
}

/// Two-letter code of a region id. Region ids are unit variants named
/// after their ISO 3166 code.
fn region_code(id: country::Id) -> String {
    format!("{id:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ph_only() -> CountryPolicy {
        CountryPolicy::new(["PH"])
    }

    #[test]
    fn accepts_philippine_mobile_number() {
        let verdict = PhoneVerifier::new().verify("+63 917 123 4567", &ph_only());
        assert!(verdict.accepted);
        assert_eq!(verdict.issuing_code.as_deref(), Some("PH"));
        assert_eq!(verdict.normalized_number.as_deref(), Some("+63 917 123 4567"));
        assert_eq!(verdict.reason, None);
    }

    #[test]
    fn default_region_reads_national_numbers() {
        let verifier = PhoneVerifier::with_default_region("ph").unwrap();
        let verdict = verifier.verify("0917 123 4567", &ph_only());
        assert!(verdict.accepted);
        assert_eq!(verdict.issuing_code.as_deref(), Some("PH"));
    }

    #[test]
    fn rejects_valid_number_from_other_region() {
        let verdict = PhoneVerifier::new().verify("+1 650-253-0000", &ph_only());
        assert!(!verdict.accepted);
        assert_eq!(verdict.issuing_code.as_deref(), Some("US"));
        assert_eq!(
            verdict.reason,
            Some(RejectReason::RegionNotAllowed {
                region: "US".to_string()
            })
        );
    }

    #[test]
    fn same_number_accepted_when_policy_allows_region() {
        let policy = CountryPolicy::new(["PH", "US"]);
        assert!(PhoneVerifier::new().verify("+1 650-253-0000", &policy).accepted);
    }

    #[test]
    fn fails_closed_on_garbage() {
        let verdict = PhoneVerifier::new().verify("call me maybe", &ph_only());
        assert!(!verdict.accepted);
        assert_eq!(verdict.reason, Some(RejectReason::Unparseable));
        assert_eq!(verdict.normalized_number, None);
    }

    #[test]
    fn fails_closed_on_structurally_invalid_number() {
        let verdict = PhoneVerifier::new().verify("+63 12", &ph_only());
        assert!(!verdict.accepted);
        assert_ne!(verdict.reason, None);
    }

    #[test]
    fn contact_number_without_plus_is_international() {
        let verifier = PhoneVerifier::with_default_region("PH").unwrap();
        let policy = CountryPolicy::new(["PH", "US"]);

        let us = verifier.verify_international("16502530000", &policy);
        assert!(us.accepted);
        assert_eq!(us.issuing_code.as_deref(), Some("US"));
        assert_eq!(us.normalized_number.as_deref(), Some("+1 650-253-0000"));

        let ph = verifier.verify_international("639171234567", &policy);
        assert_eq!(ph.issuing_code.as_deref(), Some("PH"));
    }

    #[test]
    fn contact_number_with_trunk_prefix_uses_default_region() {
        let verifier = PhoneVerifier::with_default_region("PH").unwrap();
        let verdict = verifier.verify_international("0917-123-4567", &ph_only());
        assert!(verdict.accepted);
        assert_eq!(verdict.normalized_number.as_deref(), Some("+63 917 123 4567"));
    }

    #[test]
    fn only_bare_digit_strings_gain_a_plus() {
        assert_eq!(with_plus("16502530000").as_deref(), Some("+16502530000"));
        assert_eq!(with_plus(" 1 (650) 253-0000 ").as_deref(), Some("+16502530000"));
        assert_eq!(with_plus("+16502530000"), None);
        assert_eq!(with_plus("09171234567"), None);
        assert_eq!(with_plus("call me"), None);
        assert_eq!(with_plus(""), None);
    }

    #[test]
    fn known_regions_are_case_insensitive() {
        assert!(is_known_region("ph"));
        assert!(is_known_region(" SG "));
        assert!(!is_known_region("XX"));
        assert!(!is_known_region("Philippines"));
    }

    #[test]
    fn unknown_default_region_is_an_error() {
        assert_eq!(
            PhoneVerifier::with_default_region("XX").unwrap_err(),
            VerificationError::UnknownRegion("XX".to_string())
        );
    }
}
