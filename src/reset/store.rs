use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// A password-reset grant for one account.
#[derive(Debug, Clone, PartialEq)]
pub struct ResetToken {
    pub email: String,
    pub uid: String,
    pub expires_at: DateTime<Utc>,
    pub state: TokenState,
}

/// `Unused -> Consuming -> Used`. A failed password change moves
/// `Consuming` back to `Unused`; nothing ever leaves `Used`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Unused,
    Consuming,
    Used,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Invalid,
    Expired,
    Used,
}

impl ResetToken {
    pub fn new(email: String, uid: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            email,
            uid,
            expires_at,
            state: TokenState::Unused,
        }
    }

    /// Tokens stay valid up to and including `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Advisory validity: a token that is mid-consumption still reads as valid.
    pub fn check(&self, now: DateTime<Utc>) -> Result<(), TokenRejection> {
        if self.is_expired(now) {
            return Err(TokenRejection::Expired);
        }
        if self.state == TokenState::Used {
            return Err(TokenRejection::Used);
        }
        Ok(())
    }
}

/// Store key for a raw token. Only the digest is kept once the token is issued.
pub fn token_key(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fresh reset token: 32 bytes from the thread-local CSPRNG, hex encoded.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

pub trait TokenStore: Send + Sync {
    fn put(&self, key: String, record: ResetToken);

    fn get(&self, key: &str) -> Option<ResetToken>;

    fn delete(&self, key: &str) -> Option<ResetToken>;

    /// Drop every record that expired before `now`. Returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate and claim a token for consumption in one step. Expired records
    /// are removed; a record already being consumed reads as used.
    fn begin_consume(&self, key: &str, now: DateTime<Utc>) -> Result<ResetToken, TokenRejection>;

    /// Settle a claim taken by `begin_consume`.
    fn finish_consume(&self, key: &str, succeeded: bool);
}

/// Process-local store. Single-instance only: nothing survives a restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: DashMap<String, ResetToken>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn put(&self, key: String, record: ResetToken) {
        self.entries.insert(key, record);
    }

    fn get(&self, key: &str) -> Option<ResetToken> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn delete(&self, key: &str) -> Option<ResetToken> {
        self.entries.remove(key).map(|(_, record)| record)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, record| !record.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn begin_consume(&self, key: &str, now: DateTime<Utc>) -> Result<ResetToken, TokenRejection> {
        let outcome = {
            let Some(mut entry) = self.entries.get_mut(key) else {
                return Err(TokenRejection::Invalid);
            };
            let record = entry.value_mut();

            match record.check(now) {
                Ok(()) if record.state == TokenState::Consuming => Err(TokenRejection::Used),
                Ok(()) => {
                    record.state = TokenState::Consuming;
                    Ok(record.clone())
                }
                Err(rejection) => Err(rejection),
            }
        };

        // The shard guard is released above; removing while holding it would deadlock.
        if outcome == Err(TokenRejection::Expired) {
            self.entries.remove(key);
        }
        outcome
    }

    fn finish_consume(&self, key: &str, succeeded: bool) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            let record = entry.value_mut();
            if record.state == TokenState::Consuming {
                record.state = if succeeded {
                    TokenState::Used
                } else {
                    TokenState::Unused
                };
            }
        }
    }
}
