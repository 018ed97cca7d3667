//! Split allocation.
//!
//! Divides a canonical amount evenly across a set of participants, one share
//! each. Shares are integer minor units, so the division remainder is assigned
//! explicitly according to a [`RemainderPolicy`] and `Σ share == amount` always
//! holds exactly.
//!
//! Membership of the payer and participants is a precondition enforced by the
//! caller before allocation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{EngineError, Money, ResultEngine};

/// Who receives the minor units left over by `amount / n`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// The whole remainder goes to the participant with the lowest id.
    #[default]
    FirstParticipant,
    /// One minor unit each to the first `remainder` participants by id.
    Spread,
}

/// One participant's portion of an expense.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub user_id: i64,
    pub amount: Money,
}

/// Splits `amount` evenly across `participants`.
///
/// Shares are returned ordered by participant id. Fails when the set is empty,
/// contains duplicates, or `amount` is not positive.
pub fn allocate(
    amount: Money,
    participants: &[i64],
    policy: RemainderPolicy,
) -> ResultEngine<Vec<Share>> {
    if !amount.is_positive() {
        return Err(EngineError::Validation("amount: must be > 0".to_string()));
    }
    if participants.is_empty() {
        return Err(EngineError::Validation(
            "participant_ids: must not be empty".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(participants.len());
    if let Some(dup) = participants.iter().find(|id| !seen.insert(**id)) {
        return Err(EngineError::Validation(format!(
            "participant_ids: duplicate participant {dup}"
        )));
    }

    let mut ordered = participants.to_vec();
    ordered.sort_unstable();

    let n = ordered.len() as i64;
    let base = amount.minor() / n;
    let remainder = amount.minor() % n;

    let shares = ordered
        .into_iter()
        .enumerate()
        .map(|(idx, user_id)| {
            let extra = match policy {
                RemainderPolicy::FirstParticipant if idx == 0 => remainder,
                RemainderPolicy::FirstParticipant => 0,
                RemainderPolicy::Spread => i64::from((idx as i64) < remainder),
            };
            Share {
                user_id,
                amount: Money::new(base + extra),
            }
        })
        .collect();

    Ok(shares)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn even_division() {
        let shares = allocate(Money::new(9000), &[3, 1, 2], RemainderPolicy::default()).unwrap();
        assert_eq!(
            shares,
            vec![
                Share { user_id: 1, amount: Money::new(3000) },
                Share { user_id: 2, amount: Money::new(3000) },
                Share { user_id: 3, amount: Money::new(3000) },
            ]
        );
    }

    #[test]
    fn remainder_goes_to_first_participant() {
        let shares =
            allocate(Money::new(1000), &[7, 4, 9], RemainderPolicy::FirstParticipant).unwrap();
        let amounts: Vec<i64> = shares.iter().map(|s| s.amount.minor()).collect();
        assert_eq!(shares[0].user_id, 4);
        assert_eq!(amounts, vec![334, 333, 333]);
    }

    #[test]
    fn remainder_is_spread() {
        let shares = allocate(Money::new(1001), &[1, 2, 3, 4], RemainderPolicy::Spread).unwrap();
        let amounts: Vec<i64> = shares.iter().map(|s| s.amount.minor()).collect();
        assert_eq!(amounts, vec![251, 250, 250, 250]);

        let shares = allocate(Money::new(1003), &[1, 2, 3, 4], RemainderPolicy::Spread).unwrap();
        let amounts: Vec<i64> = shares.iter().map(|s| s.amount.minor()).collect();
        assert_eq!(amounts, vec![251, 251, 251, 250]);
    }

    #[test]
    fn rejects_empty_and_duplicates() {
        assert_eq!(
            allocate(Money::new(100), &[], RemainderPolicy::default()).unwrap_err(),
            EngineError::Validation("participant_ids: must not be empty".to_string())
        );
        assert_eq!(
            allocate(Money::new(100), &[1, 2, 1], RemainderPolicy::default()).unwrap_err(),
            EngineError::Validation("participant_ids: duplicate participant 1".to_string())
        );
    }

    proptest! {
        #[test]
        fn shares_sum_to_amount(
            amount in 1i64..10_000_000,
            ids in proptest::collection::hash_set(1i64..500, 1..20),
            spread in any::<bool>(),
        ) {
            let ids: Vec<i64> = ids.into_iter().collect();
            let policy = if spread { RemainderPolicy::Spread } else { RemainderPolicy::FirstParticipant };
            let shares = allocate(Money::new(amount), &ids, policy).unwrap();
            prop_assert_eq!(shares.len(), ids.len());
            let total: Money = shares.iter().map(|s| s.amount).sum();
            prop_assert_eq!(total, Money::new(amount));
            let min = shares.iter().map(|s| s.amount).min().unwrap();
            let max = shares.iter().map(|s| s.amount).max().unwrap();
            if spread {
                prop_assert!(max.minor() - min.minor() <= 1);
            }
        }
    }
}
