//! Phone-number verification for admission control.
//!
//! A prospective member proves control of a phone number by sharing it with
//! the bot; [`PhoneVerifier`] decides whether that number is acceptable under
//! a [`CountryPolicy`]. The policy in force is chosen by the caller per
//! target group.

pub mod error;
pub mod phone;
pub mod policy;

pub use error::VerificationError;
pub use phone::{is_known_region, PhoneVerdict, PhoneVerifier, RejectReason};
pub use policy::CountryPolicy;
