//! Short public codes (trip join codes, virtual member handles).
//!
//! A [`CodePolicy`] describes how many candidates to try at each length before
//! escalating to a longer code. [`CodeCandidates`] yields that bounded sequence
//! of random `[a-z0-9]` strings; the caller attempts an insert for each one and
//! moves on when the store reports a unique violation. Once the sequence is
//! exhausted the caller fails with `GenerationExhausted`.

use rand::{Rng, SeedableRng, rngs::StdRng};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, DatabaseTransaction, EntityTrait, IntoActiveModel,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine, util::is_unique_violation};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Shortest code length a policy may produce.
pub const MIN_CODE_LENGTH: usize = 6;
/// Longest code length a policy may produce.
pub const MAX_CODE_LENGTH: usize = 8;

/// Bounds for code generation. Missing fields take their default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodePolicy {
    /// Length of the first candidates.
    pub length: usize,
    /// Longest length escalated to.
    pub max_length: usize,
    /// Candidates tried at each length.
    pub attempts_per_length: usize,
}

impl Default for CodePolicy {
    fn default() -> Self {
        Self {
            length: 6,
            max_length: 8,
            attempts_per_length: 5,
        }
    }
}

impl CodePolicy {
    pub fn validate(&self) -> ResultEngine<()> {
        if self.length < MIN_CODE_LENGTH || self.max_length > MAX_CODE_LENGTH {
            return Err(EngineError::Validation(format!(
                "code policy: lengths must stay within {MIN_CODE_LENGTH}..={MAX_CODE_LENGTH}"
            )));
        }
        if self.length > self.max_length {
            return Err(EngineError::Validation(
                "code policy: length must be <= max_length".to_string(),
            ));
        }
        if self.attempts_per_length == 0 {
            return Err(EngineError::Validation(
                "code policy: attempts_per_length must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Upper bound on candidates produced by [`CodeCandidates`].
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        (self.max_length + 1).saturating_sub(self.length) * self.attempts_per_length
    }

    /// Same policy with a fixed length.
    #[must_use]
    pub fn fixed(self, length: usize) -> Self {
        Self {
            length,
            max_length: length,
            ..self
        }
    }
}

/// Generates one random code of `length` characters from `[a-z0-9]`.
pub fn generate<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Returns `true` when `code` looks like something a valid [`CodePolicy`]
/// could have produced.
#[must_use]
pub fn is_well_formed(code: &str) -> bool {
    (MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&code.len())
        && code.bytes().all(|b| ALPHABET.contains(&b))
}

/// Bounded, escalating sequence of candidate codes.
pub struct CodeCandidates<R> {
    rng: R,
    policy: CodePolicy,
    length: usize,
    tried_at_length: usize,
}

impl<R: Rng> CodeCandidates<R> {
    pub fn new(policy: CodePolicy, rng: R) -> Self {
        Self {
            rng,
            policy,
            length: policy.length,
            tried_at_length: 0,
        }
    }
}

impl<R: Rng> Iterator for CodeCandidates<R> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        if self.tried_at_length == self.policy.attempts_per_length {
            if self.length >= self.policy.max_length {
                return None;
            }
            self.length += 1;
            self.tried_at_length = 0;
            tracing::warn!(length = self.length, "code collisions, escalating length");
        }
        if self.policy.attempts_per_length == 0 {
            return None;
        }
        self.tried_at_length += 1;
        Some(generate(&mut self.rng, self.length))
    }
}

/// Inserts the row `build` makes for each candidate code, every attempt in its
/// own savepoint of `db`, and returns the first row that does not hit a unique
/// violation.
pub(crate) async fn insert_with_unique_code<A, F>(
    db: &DatabaseTransaction,
    policy: CodePolicy,
    what: &str,
    mut build: F,
) -> ResultEngine<<A::Entity as EntityTrait>::Model>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    F: FnMut(&str) -> A,
{
    for candidate in CodeCandidates::new(policy, StdRng::from_entropy()) {
        let attempt = db.begin().await?;
        match build(&candidate).insert(&attempt).await {
            Ok(model) => {
                attempt.commit().await?;
                return Ok(model);
            }
            Err(err) if is_unique_violation(&err) => {
                attempt.rollback().await?;
                tracing::warn!(code = %candidate, "{what} collision");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(exhausted(&policy))
}

pub(crate) fn exhausted(policy: &CodePolicy) -> EngineError {
    EngineError::GenerationExhausted(format!(
        "no free code after {} attempts (lengths {}..={})",
        policy.max_attempts(),
        policy.length,
        policy.max_length
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn candidates_escalate_then_stop() {
        let policy = CodePolicy {
            length: 6,
            max_length: 8,
            attempts_per_length: 3,
        };
        let lengths: Vec<usize> = CodeCandidates::new(policy, StdRng::seed_from_u64(7))
            .map(|c| c.len())
            .collect();
        assert_eq!(lengths, vec![6, 6, 6, 7, 7, 7, 8, 8, 8]);
        assert_eq!(policy.max_attempts(), 9);
    }

    #[test]
    fn codes_use_lowercase_alphanumerics() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let code = generate(&mut rng, 8);
            assert!(is_well_formed(&code));
        }
        assert!(!is_well_formed("abc12"));
        assert!(!is_well_formed("ABC123"));
        assert!(!is_well_formed("abc-123"));
    }

    #[test]
    fn thousand_candidates_find_free_codes() {
        let policy = CodePolicy::default();
        let mut used = HashSet::new();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let mut attempts = 0;
            let code = CodeCandidates::new(policy, &mut rng)
                .find(|c| {
                    attempts += 1;
                    !used.contains(c)
                })
                .unwrap();
            assert!(attempts <= policy.max_attempts());
            assert!(is_well_formed(&code));
            assert!(used.insert(code));
        }
        assert_eq!(used.len(), 1000);
    }

    #[test]
    fn exhaustion_message_names_attempts_and_lengths() {
        let policy = CodePolicy {
            length: 6,
            max_length: 7,
            attempts_per_length: 2,
        };
        assert_eq!(CodeCandidates::new(policy, StdRng::seed_from_u64(3)).count(), 4);
        assert_eq!(
            exhausted(&policy),
            EngineError::GenerationExhausted(
                "no free code after 4 attempts (lengths 6..=7)".to_string()
            )
        );
    }

    #[test]
    fn policy_lengths_are_bounded() {
        let policy = |length, max_length, attempts_per_length| CodePolicy {
            length,
            max_length,
            attempts_per_length,
        };
        assert!(policy(6, 8, 5).validate().is_ok());
        assert!(policy(8, 8, 1).validate().is_ok());
        assert!(policy(3, 8, 5).validate().is_err());
        assert!(policy(6, 9, 5).validate().is_err());
        assert!(policy(7, 6, 5).validate().is_err());
        assert!(policy(6, 8, 0).validate().is_err());
    }

    #[test]
    fn partial_policy_fills_in_defaults() {
        let policy: CodePolicy = serde_json::from_str(r#"{"length": 7}"#).unwrap();
        assert_eq!(
            policy,
            CodePolicy {
                length: 7,
                ..CodePolicy::default()
            }
        );
    }
}
