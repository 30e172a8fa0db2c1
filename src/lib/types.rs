use std::{
    fmt,
    ops::{Add, Neg, Sub},
};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Default, Hash, Eq, PartialEq, Clone, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Time-ordered identifier for a freshly created record.
            pub fn generate() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn value(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(UserId);
string_id!(CustomerId);
string_id!(TransactionId);

#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonetaryAmount(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl MonetaryAmount {
    pub const ZERO: MonetaryAmount = MonetaryAmount(Decimal::ZERO);

    /// Decimal places kept for amounts and balances.
    pub const SCALE: u32 = 2;

    /// Largest magnitude stored, 9,999,999,999,999.99. That is 15 significant digits,
    /// which a JSON number (f64) carries without loss.
    pub fn max() -> Self {
        Self(Decimal::new(999_999_999_999_999, Self::SCALE))
    }

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// True when the value survives a save and load unchanged.
    pub fn is_storable(&self) -> bool {
        self.0.abs() <= Self::max().0 && self.0.normalize().scale() <= Self::SCALE
    }

    /// Sum of two amounts, or `None` if it leaves the storable range.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0
            .checked_add(rhs.0)
            .map(MonetaryAmount)
            .filter(MonetaryAmount::is_storable)
    }
}

impl From<Decimal> for MonetaryAmount {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl Add for MonetaryAmount {
    type Output = MonetaryAmount;

    fn add(self, rhs: Self) -> Self::Output {
        MonetaryAmount(self.value() + rhs.value())
    }
}

impl Sub for MonetaryAmount {
    type Output = MonetaryAmount;

    fn sub(self, rhs: Self) -> Self::Output {
        MonetaryAmount(self.value() - rhs.value())
    }
}

impl Neg for MonetaryAmount {
    type Output = MonetaryAmount;

    fn neg(self) -> Self::Output {
        MonetaryAmount(-self.value())
    }
}

impl std::iter::Sum for MonetaryAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(MonetaryAmount::ZERO, |acc, x| acc + x)
    }
}

impl fmt::Display for MonetaryAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Increases the customer's balance: they owe the ledger owner more.
    Debt,
    /// Decreases the customer's balance.
    Repayment,
}

impl TransactionType {
    /// The amount as it contributes to the customer's balance.
    pub fn signed(&self, amount: MonetaryAmount) -> MonetaryAmount {
        match self {
            TransactionType::Debt => amount,
            TransactionType::Repayment => -amount,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransactionType::Debt => "Debt",
            TransactionType::Repayment => "Payment",
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub phone: String,
    pub pin: String,
    pub created_at: DateTime<Utc>,
}

/// Which user is acting. Passed explicitly into every ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: UserId,
    pub name: String,
}

impl Session {
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            name: user.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceStatus {
    /// The customer owes the ledger owner.
    Owes,
    /// The ledger owner owes the customer.
    Credit,
    Settled,
}

impl BalanceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BalanceStatus::Owes => "owes",
            BalanceStatus::Credit => "credit",
            BalanceStatus::Settled => "settled",
        }
    }
}

/// A customer of the ledger owner. `balance` is a running total kept in step with the
/// customer's transactions; positive means the customer owes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub notes: String,
    pub balance: MonetaryAmount,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn phone(&self) -> Option<&str> {
        non_empty(&self.phone)
    }

    pub fn notes(&self) -> Option<&str> {
        non_empty(&self.notes)
    }

    pub fn status(&self) -> BalanceStatus {
        if self.balance.is_positive() {
            BalanceStatus::Owes
        } else if self.balance.is_negative() {
            BalanceStatus::Credit
        } else {
            BalanceStatus::Settled
        }
    }

    pub fn map_balance<F: FnOnce(MonetaryAmount) -> MonetaryAmount>(&self, f: F) -> Self {
        Self {
            balance: f(self.balance),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub customer_id: CustomerId,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub amount: MonetaryAmount,
    #[serde(default)]
    pub description: String,
    pub date: DateTime<Utc>,
}

impl Transaction {
    pub fn description(&self) -> Option<&str> {
        non_empty(&self.description)
    }

    pub fn signed_amount(&self) -> MonetaryAmount {
        self.tx_type.signed(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardTotals {
    /// Sum of positive balances.
    pub total_owed: MonetaryAmount,
    /// Sum of the magnitudes of negative balances.
    pub total_credit: MonetaryAmount,
    pub top_debtors: Vec<Customer>,
}

/// A customer whose cached balance disagrees with their transaction log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDrift {
    pub customer_id: CustomerId,
    pub cached: MonetaryAmount,
    pub recomputed: MonetaryAmount,
}
