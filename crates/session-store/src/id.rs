//! Session identifier format and generation

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::TryRngCore;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::DEFAULT_MAX_ID_ATTEMPTS;
use crate::error::{RandomSourceError, SessionError};

/// Number of random bytes per identifier (base64 → 16 characters).
pub const SESSION_ID_BYTES: usize = 12;
pub const SESSION_ID_LEN: usize = 16;

static SESSION_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z0-9_/+-]{16}$").expect("static session id pattern"));

pub fn is_valid_session_id(candidate: &str) -> bool {
    SESSION_ID_PATTERN.is_match(candidate)
}

/// Opaque, format-checked session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    pub fn parse(candidate: &str) -> Result<Self, SessionError> {
        if is_valid_session_id(candidate) {
            Ok(Self(candidate.to_string()))
        } else {
            Err(SessionError::InvalidIdentifier(candidate.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_valid_session_id(&value) {
            Ok(Self(value))
        } else {
            Err(SessionError::InvalidIdentifier(value))
        }
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Source of cryptographically secure random bytes.
#[cfg_attr(test, mockall::automock)]
pub trait RandomSource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<(), RandomSourceError>;
}

/// Operating system CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<(), RandomSourceError> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| RandomSourceError(e.to_string()))
    }
}

pub struct IdGenerator {
    source: Box<dyn RandomSource>,
    max_attempts: u32,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(Box::new(OsRandom), DEFAULT_MAX_ID_ATTEMPTS)
    }
}

impl IdGenerator {
    pub fn new(source: Box<dyn RandomSource>, max_attempts: u32) -> Self {
        Self {
            source,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Draw one candidate identifier. No collision check.
    pub fn generate(&self) -> Result<SessionId, SessionError> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        self.source.fill(&mut bytes)?;
        Ok(SessionId(STANDARD.encode(bytes)))
    }

    /// Generate candidates until `claim` accepts one.
    ///
    /// `claim` returns `None` when the candidate is already taken. Random
    /// source failures abort immediately; collisions are retried up to
    /// `max_attempts` times in total.
    pub fn claim_unique<T, F>(&self, mut claim: F) -> Result<T, SessionError>
    where
        F: FnMut(SessionId) -> Option<T>,
    {
        for attempt in 1..=self.max_attempts {
            let candidate = self.generate()?;
            if let Some(claimed) = claim(candidate) {
                return Ok(claimed);
            }
            warn!("Session ID collision on attempt {}", attempt);
        }

        warn!("Giving up on session ID generation after {} attempts", self.max_attempts);
        Err(SessionError::ExhaustedAttempts {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_match_format() {
        let ids = IdGenerator::default();
        for _ in 0..200 {
            let id = ids.generate().unwrap();
            assert_eq!(id.as_str().len(), SESSION_ID_LEN);
            assert!(is_valid_session_id(id.as_str()), "bad id: {}", id);
        }
    }

    #[test]
    fn test_format_predicate() {
        assert!(is_valid_session_id("abcdefghijklmnop"));
        assert!(is_valid_session_id("ABCDEFGH01234567"));
        assert!(is_valid_session_id("ab+/_-cd12345678"));

        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("x"));
        assert!(!is_valid_session_id("!!!"));
        assert!(!is_valid_session_id("abcdefghijklmno"));
        assert!(!is_valid_session_id("abcdefghijklmnopq"));
        assert!(!is_valid_session_id("abcdefghijklmno="));
        assert!(!is_valid_session_id("abcdefghijklmnop\n"));
        assert!(!is_valid_session_id("abcdefghijklmnö"));
    }

    #[test]
    fn test_parse_and_serde() {
        let id: SessionId = "AAAAAAAAAAAAAAAA".parse().unwrap();
        assert_eq!(id.to_string(), "AAAAAAAAAAAAAAAA");

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"AAAAAAAAAAAAAAAA\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_str::<SessionId>("\"short\"").is_err());
        assert!(matches!(
            SessionId::parse("!!!"),
            Err(SessionError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_fixed_bytes_encode_deterministically() {
        let mut source = MockRandomSource::new();
        source.expect_fill().returning(|dest| {
            dest.fill(0xfb);
            Ok(())
        });
        let ids = IdGenerator::new(Box::new(source), 10);
        let id = ids.generate().unwrap();
        assert_eq!(id.as_str(), "+/v7+/v7+/v7+/v7");
    }

    #[test]
    fn test_random_source_failure_is_not_retried() {
        let mut source = MockRandomSource::new();
        source
            .expect_fill()
            .times(1)
            .returning(|_| Err(RandomSourceError("entropy pool unavailable".into())));
        let ids = IdGenerator::new(Box::new(source), 10);

        let mut claims = 0;
        let res = ids.claim_unique(|id| {
            claims += 1;
            Some(id)
        });
        assert!(matches!(res, Err(SessionError::RandomSource(_))));
        assert_eq!(claims, 0);
    }

    #[test]
    fn test_collision_is_retried() {
        let mut taken = HashSet::new();
        let ids = IdGenerator::default();
        let first = ids.generate().unwrap();
        taken.insert(first.clone());

        let mut offered = vec![first.clone()];
        let mut calls = 0;
        let claimed = ids
            .claim_unique(|candidate| {
                calls += 1;
                // first offer is forced to collide
                let candidate = if calls == 1 { offered.remove(0) } else { candidate };
                if taken.contains(&candidate) {
                    None
                } else {
                    Some(candidate)
                }
            })
            .unwrap();
        assert_eq!(calls, 2);
        assert_ne!(claimed, first);
    }

    #[test]
    fn test_exhausted_attempts() {
        let mut source = MockRandomSource::new();
        source.expect_fill().times(5).returning(|dest| {
            dest.fill(0);
            Ok(())
        });
        let ids = IdGenerator::new(Box::new(source), 5);
        let res: Result<SessionId, _> = ids.claim_unique(|_| None);
        assert!(matches!(
            res,
            Err(SessionError::ExhaustedAttempts { attempts: 5 })
        ));
    }
}
