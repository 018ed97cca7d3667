//! Balance aggregation and debt simplification.
//!
//! Both halves are pure: the engine reads the ledger inside one store
//! transaction, hands the sums to [`aggregate_balances`], then feeds the
//! resulting net balances to [`simplify`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError, Money, ResultEngine};

/// Net position of one member within a trip.
///
/// `balance == paid - owed` always holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberBalance {
    pub user_id: i64,
    pub display_name: String,
    pub paid: Money,
    pub owed: Money,
    pub balance: Money,
}

/// A payment `from` a debtor `to` a creditor. Informational, never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: i64,
    pub to: i64,
    pub amount: Money,
}

/// Balances plus the transfer plan that zeroes them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Base currency of the trip; every amount below is in its minor units.
    pub currency: Currency,
    pub balances: Vec<MemberBalance>,
    pub transfers: Vec<Transfer>,
    pub total_expenses: Money,
}

/// Builds one [`MemberBalance`] per member, in the order `members` is given.
///
/// `paid` maps payer id to the sum of the expenses they paid; `owed` maps
/// participant id to the sum of their shares. Members missing from either map
/// count as zero. A balance outside the `i64` range is an invariant
/// violation.
pub fn aggregate_balances(
    members: &[(i64, String)],
    paid: &HashMap<i64, Money>,
    owed: &HashMap<i64, Money>,
) -> ResultEngine<Vec<MemberBalance>> {
    members
        .iter()
        .map(|(user_id, display_name)| {
            let paid = paid.get(user_id).copied().unwrap_or_default();
            let owed = owed.get(user_id).copied().unwrap_or_default();
            let balance = paid.checked_sub(owed).ok_or_else(|| {
                EngineError::InvariantViolation(format!("balance of member {user_id} overflows"))
            })?;
            Ok(MemberBalance {
                user_id: *user_id,
                display_name: display_name.clone(),
                paid,
                owed,
                balance,
            })
        })
        .collect()
}

/// Index of the party with the largest remaining amount; ties go to the lower
/// member id.
fn largest(side: &[(i64, Money)]) -> Option<usize> {
    side.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
        .map(|(idx, _)| idx)
}

/// Reduces net balances to a short list of transfers that settles everyone.
///
/// Greedy max-creditor / max-debtor matching: every step pays off at least one
/// party completely, so the plan has at most `parties - 1` transfers. The
/// output is deterministic for a given input (ties break on the lower member
/// id), and zero balances are ignored.
///
/// Fails with [`EngineError::InvariantViolation`] when the balances do not sum
/// to zero, since then one side runs out before the other.
pub fn simplify(balances: &[(i64, Money)]) -> ResultEngine<Vec<Transfer>> {
    let mut seen = HashSet::with_capacity(balances.len());
    if let Some((dup, _)) = balances.iter().find(|(id, _)| !seen.insert(*id)) {
        return Err(EngineError::Validation(format!(
            "balances: duplicate member {dup}"
        )));
    }

    let mut creditors: Vec<(i64, Money)> = balances
        .iter()
        .filter(|(_, b)| b.is_positive())
        .copied()
        .collect();
    let mut debtors: Vec<(i64, Money)> = balances
        .iter()
        .filter(|(_, b)| b.is_negative())
        .map(|(id, b)| {
            b.checked_neg().map(|debt| (*id, debt)).ok_or_else(|| {
                EngineError::InvariantViolation(format!("debt of member {id} overflows"))
            })
        })
        .collect::<ResultEngine<_>>()?;

    let mut transfers = Vec::with_capacity(creditors.len() + debtors.len());
    loop {
        let (c_idx, d_idx) = match (largest(&creditors), largest(&debtors)) {
            (None, None) => break,
            (Some(c), Some(d)) => (c, d),
            (Some(_), None) | (None, Some(_)) => {
                let credit = Money::checked_sum(creditors.iter().map(|(_, b)| *b));
                let debt = Money::checked_sum(debtors.iter().map(|(_, b)| *b));
                let message = match credit.zip(debt).and_then(|(c, d)| c.checked_sub(d)) {
                    Some(left) => {
                        format!("balances do not sum to zero (off by {left} minor units)")
                    }
                    None => "balances do not sum to zero".to_string(),
                };
                return Err(EngineError::InvariantViolation(message));
            }
        };

        let (creditor, credit) = creditors[c_idx];
        let (debtor, debt) = debtors[d_idx];
        let amount = credit.min(debt);
        transfers.push(Transfer {
            from: debtor,
            to: creditor,
            amount,
        });

        creditors[c_idx].1 -= amount;
        debtors[d_idx].1 -= amount;
        if creditors[c_idx].1.is_zero() {
            creditors.swap_remove(c_idx);
        }
        if debtors[d_idx].1.is_zero() {
            debtors.swap_remove(d_idx);
        }
    }

    Ok(transfers)
}
