//! Transaction domain entity and its payment status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

/// Payment status of a transaction.
///
/// `Pending` is the only non-terminal state. Every legal move goes from
/// `Pending` to one of the terminal states; nothing leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Paid,
    Denied,
    Expired,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal status transition {from} -> {to}")]
pub struct TransitionError {
    pub from: TransactionStatus,
    pub to: TransactionStatus,
}

impl TransactionStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Paid => "paid",
            TransactionStatus::Denied => "denied",
            TransactionStatus::Expired => "expired",
            TransactionStatus::Canceled => "canceled",
        }
    }

    /// Checks a move from `self` to `next`.
    ///
    /// Returns `Ok(true)` when the move changes the status, `Ok(false)` when it
    /// repeats the current terminal status (redelivery), and an error otherwise.
    pub fn transition(self, next: TransactionStatus) -> Result<bool, TransitionError> {
        match (self, next) {
            (TransactionStatus::Pending, TransactionStatus::Pending) => {
                Err(TransitionError { from: self, to: next })
            }
            (TransactionStatus::Pending, _) => Ok(true),
            (current, requested) if current == requested => Ok(false),
            _ => Err(TransitionError { from: self, to: next }),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "paid" => Ok(TransactionStatus::Paid),
            "denied" => Ok(TransactionStatus::Denied),
            "expired" => Ok(TransactionStatus::Expired),
            "canceled" => Ok(TransactionStatus::Canceled),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    pub id: i64,
    pub campaign_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub status: TransactionStatus,
    pub payment_code: Option<String>,
    pub payment_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub campaign_id: i64,
    pub user_id: i64,
    pub amount: i64,
}

/// Result of applying a status transition.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub transaction: Transaction,
    pub previous: TransactionStatus,
    /// Campaign total after the credit, set only when this change moved the
    /// transaction into `Paid`.
    pub campaign_backed_amount: Option<i64>,
}

impl StatusChange {
    /// True only for the single transition that moves a transaction into `Paid`.
    pub fn newly_paid(&self) -> bool {
        self.previous == TransactionStatus::Pending
            && self.transaction.status == TransactionStatus::Paid
    }

    pub fn is_redelivery(&self) -> bool {
        self.previous == self.transaction.status
    }
}

/// A user's transaction joined with its campaign's name and primary image.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub campaign_name: String,
    pub campaign_primary_image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TERMINAL: [TransactionStatus; 4] = [
        TransactionStatus::Paid,
        TransactionStatus::Denied,
        TransactionStatus::Expired,
        TransactionStatus::Canceled,
    ];

    #[test]
    fn pending_moves_to_every_terminal_state() {
        for next in TERMINAL {
            assert_eq!(TransactionStatus::Pending.transition(next), Ok(true));
        }
    }

    #[test]
    fn pending_to_pending_is_rejected() {
        assert!(TransactionStatus::Pending
            .transition(TransactionStatus::Pending)
            .is_err());
    }

    #[test]
    fn terminal_repeat_is_a_no_op() {
        for state in TERMINAL {
            assert_eq!(state.transition(state), Ok(false));
        }
    }

    #[test]
    fn terminal_states_never_move() {
        for from in TERMINAL {
            for to in TERMINAL.iter().copied().chain([TransactionStatus::Pending]) {
                if from != to {
                    let err = from.transition(to).unwrap_err();
                    assert_eq!(err.from, from);
                    assert_eq!(err.to, to);
                }
            }
        }
    }

    #[test]
    fn status_string_roundtrip() {
        for state in TERMINAL.iter().copied().chain([TransactionStatus::Pending]) {
            assert_eq!(state.as_str().parse::<TransactionStatus>(), Ok(state));
        }
        assert!("settled".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn newly_paid_requires_pending_origin() {
        let now = Utc::now();
        let tx = Transaction {
            id: 1,
            campaign_id: 1,
            user_id: 2,
            amount: 100,
            status: TransactionStatus::Paid,
            payment_code: None,
            payment_url: None,
            created_at: now,
            updated_at: now,
        };

        let first = StatusChange {
            transaction: tx.clone(),
            previous: TransactionStatus::Pending,
            campaign_backed_amount: Some(100),
        };
        let again = StatusChange {
            transaction: tx,
            previous: TransactionStatus::Paid,
            campaign_backed_amount: None,
        };

        assert!(first.newly_paid());
        assert!(!again.newly_paid());
        assert!(again.is_redelivery());
    }
}
