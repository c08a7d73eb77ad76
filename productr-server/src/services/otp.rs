//! One-time codes proving control of an email address.
//!
//! Per email the ledger moves `NoOtp -> Pending -> {Verified, Expired, Invalid}`.
//! `Verified` and `Expired` delete the entry; `Invalid` keeps it so the caller
//! can retry until it expires. A new request for the same email replaces the
//! pending entry, and every issue first drops all expired entries. All
//! transitions for one email run under that key's map shard lock, so
//! concurrent issue/verify calls cannot interleave.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::Rng;
use thiserror::Error;

pub const OTP_LENGTH: usize = 6;
pub const OTP_TTL_MINUTES: i64 = 10;

/// How codes are produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodePolicy {
    /// Uniform 6-digit codes from the OS RNG.
    Random,
    /// The same code every time. Not random and not safe outside demo and
    /// test environments.
    Fixed(String),
}

impl CodePolicy {
    pub fn generate(&self) -> String {
        match self {
            CodePolicy::Random => {
                let n: u32 = OsRng.gen_range(0..1_000_000);
                format!("{n:0width$}", width = OTP_LENGTH)
            }
            CodePolicy::Fixed(code) => code.clone(),
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self, CodePolicy::Fixed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtpError {
    /// Never requested, already consumed, or expired and purged.
    #[error("OTP not found or expired")]
    NotFound,
    #[error("OTP has expired")]
    Expired,
    #[error("invalid OTP")]
    Invalid,
}

#[derive(Debug, Clone)]
struct OtpEntry {
    code: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedOtp {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

pub struct OtpLedger {
    entries: DashMap<String, OtpEntry>,
    policy: CodePolicy,
    ttl: Duration,
}

impl OtpLedger {
    pub fn new(policy: CodePolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
            ttl: Duration::minutes(OTP_TTL_MINUTES),
        }
    }

    pub fn policy(&self) -> &CodePolicy {
        &self.policy
    }

    /// Issue a code for `email`, replacing any pending one.
    pub fn issue(&self, email: &str) -> IssuedOtp {
        self.issue_at(email, Utc::now())
    }

    pub fn issue_at(&self, email: &str, now: DateTime<Utc>) -> IssuedOtp {
        self.purge_expired(now);
        let entry = OtpEntry {
            code: self.policy.generate(),
            expires_at: now + self.ttl,
        };
        let issued = IssuedOtp {
            code: entry.code.clone(),
            expires_at: entry.expires_at,
        };
        self.entries.insert(email.to_string(), entry);
        issued
    }

    /// Check `submitted` against the pending code, consuming it on success.
    pub fn verify(&self, email: &str, submitted: &str) -> Result<(), OtpError> {
        self.verify_at(email, submitted, Utc::now())
    }

    pub fn verify_at(
        &self,
        email: &str,
        submitted: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OtpError> {
        match self.entries.entry(email.to_string()) {
            Entry::Vacant(_) => Err(OtpError::NotFound),
            Entry::Occupied(occupied) => {
                if now > occupied.get().expires_at {
                    occupied.remove();
                    return Err(OtpError::Expired);
                }
                if occupied.get().code != submitted {
                    return Err(OtpError::Invalid);
                }
                occupied.remove();
                Ok(())
            }
        }
    }

    /// Drop every entry whose deadline has passed.
    pub fn purge_expired(&self, now: DateTime<Utc>) {
        self.entries.retain(|_, entry| entry.expires_at >= now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_pending(&self, email: &str) -> bool {
        self.entries.contains_key(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed() -> OtpLedger {
        OtpLedger::new(CodePolicy::Fixed("111111".into()))
    }

    #[test]
    fn random_codes_are_fixed_width_digits() {
        for _ in 0..200 {
            let code = CodePolicy::Random.generate();
            assert_eq!(code.len(), OTP_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn wrong_code_keeps_entry_for_retry() {
        let ledger = fixed();
        ledger.issue("b@x.com");

        assert_eq!(ledger.verify("b@x.com", "000000"), Err(OtpError::Invalid));
        assert!(ledger.is_pending("b@x.com"));
        assert_eq!(ledger.verify("b@x.com", "111111"), Ok(()));
    }

    #[test]
    fn codes_are_single_use() {
        let ledger = fixed();
        ledger.issue("b@x.com");

        assert_eq!(ledger.verify("b@x.com", "111111"), Ok(()));
        assert_eq!(ledger.verify("b@x.com", "111111"), Err(OtpError::NotFound));
    }

    #[test]
    fn never_requested_is_not_found() {
        assert_eq!(fixed().verify("c@x.com", "111111"), Err(OtpError::NotFound));
    }

    #[test]
    fn expired_code_is_purged() {
        let ledger = fixed();
        let issued_at = Utc::now();
        let issued = ledger.issue_at("b@x.com", issued_at);
        assert_eq!(issued.expires_at, issued_at + Duration::minutes(10));

        let late = issued.expires_at + Duration::seconds(1);
        assert_eq!(
            ledger.verify_at("b@x.com", "111111", late),
            Err(OtpError::Expired)
        );
        assert!(!ledger.is_pending("b@x.com"));
        assert_eq!(
            ledger.verify_at("b@x.com", "111111", late),
            Err(OtpError::NotFound)
        );
    }

    #[test]
    fn deadline_itself_is_accepted() {
        let ledger = fixed();
        let issued = ledger.issue_at("b@x.com", Utc::now());
        assert_eq!(
            ledger.verify_at("b@x.com", "111111", issued.expires_at),
            Ok(())
        );
    }

    #[test]
    fn issuing_purges_abandoned_codes() {
        let ledger = fixed();
        let long_ago = Utc::now() - Duration::hours(1);
        for i in 0..1000 {
            ledger.issue_at(&format!("user{i}@x.com"), long_ago);
        }
        assert_eq!(ledger.len(), 1000);

        ledger.issue("fresh@x.com");
        assert_eq!(ledger.len(), 1);
        assert!(ledger.is_pending("fresh@x.com"));
        assert!(!ledger.is_pending("user0@x.com"));
    }

    #[test]
    fn purge_keeps_live_codes() {
        let ledger = fixed();
        let now = Utc::now();
        ledger.issue_at("old@x.com", now - Duration::minutes(11));
        ledger.issue_at("live@x.com", now - Duration::minutes(5));

        ledger.purge_expired(now);
        assert!(!ledger.is_pending("old@x.com"));
        assert_eq!(ledger.verify_at("live@x.com", "111111", now), Ok(()));
        assert!(ledger.is_empty());
    }

    #[test]
    fn last_request_wins() {
        let ledger = OtpLedger::new(CodePolicy::Random);
        let first = ledger.issue("b@x.com");
        let mut second = ledger.issue("b@x.com");
        // Random codes can collide; reissue until they differ.
        while second.code == first.code {
            second = ledger.issue("b@x.com");
        }

        assert_eq!(ledger.verify("b@x.com", &first.code), Err(OtpError::Invalid));
        assert_eq!(ledger.verify("b@x.com", &second.code), Ok(()));
        assert_eq!(ledger.verify("b@x.com", &first.code), Err(OtpError::NotFound));
    }
}
