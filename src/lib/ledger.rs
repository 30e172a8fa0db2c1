use std::str::FromStr;

use chrono::{DateTime, Utc};
use im::Vector;
use rust_decimal::Decimal;

use crate::error::{LedgerError, LedgerResult};
use crate::types::{
    BalanceDrift, Customer, CustomerId, DashboardTotals, MonetaryAmount, Session, Transaction,
    TransactionId, TransactionType, User, UserId,
};
use crate::utils::{clean_field, PushImmut, ReplaceImmut};

pub const PIN_LENGTH: usize = 4;

/// A debt or repayment as entered, before it is applied to a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub customer_id: CustomerId,
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub description: Option<String>,
}

/// Result of applying a transaction: the new records plus both collections as they
/// should be persisted.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub transaction: Transaction,
    pub customer: Customer,
    pub transactions: Vector<Transaction>,
    pub customers: Vector<Customer>,
}

pub fn validate_pin(pin: &str) -> LedgerResult<()> {
    if pin.len() == PIN_LENGTH && pin.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(LedgerError::validation("PIN must be exactly 4 digits"))
    }
}

/// Checks made by the sign-up form before a user is created.
pub fn validate_sign_up(name: &str, phone: &str, pin: &str) -> LedgerResult<()> {
    if name.trim().is_empty() || phone.trim().is_empty() {
        return Err(LedgerError::validation("name and phone are required"));
    }
    validate_pin(pin)
}

/// Registers a user. The pin is expected to have passed [`validate_pin`] already.
pub fn create_user(
    users: &Vector<User>,
    name: &str,
    phone: &str,
    pin: &str,
    now: DateTime<Utc>,
) -> LedgerResult<(User, Vector<User>)> {
    if users.iter().any(|u| u.phone == phone) {
        return Err(LedgerError::DuplicatePhone);
    }
    let user = User {
        id: UserId::generate(),
        name: name.to_string(),
        phone: phone.to_string(),
        pin: pin.to_string(),
        created_at: now,
    };
    let users = users.push(user.clone());
    Ok((user, users))
}

pub fn authenticate(users: &Vector<User>, phone: &str, pin: &str) -> LedgerResult<Session> {
    users
        .iter()
        .find(|u| u.phone == phone && u.pin == pin)
        .map(Session::for_user)
        .ok_or(LedgerError::InvalidCredentials)
}

pub fn add_customer(
    customers: &Vector<Customer>,
    user_id: &UserId,
    name: &str,
    phone: Option<&str>,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> LedgerResult<(Customer, Vector<Customer>)> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::validation("customer name is required"));
    }
    let customer = Customer {
        id: CustomerId::generate(),
        name: name.to_string(),
        phone: clean_field(phone),
        notes: clean_field(notes),
        balance: MonetaryAmount::ZERO,
        user_id: user_id.clone(),
        created_at: now,
    };
    let customers = customers.push(customer.clone());
    Ok((customer, customers))
}

/// The user's customers in the order they were added.
pub fn list_customers(customers: &Vector<Customer>, user_id: &UserId) -> Vec<Customer> {
    customers
        .iter()
        .filter(|c| &c.user_id == user_id)
        .cloned()
        .collect()
}

fn position_of(
    customers: &Vector<Customer>,
    user_id: &UserId,
    customer_id: &CustomerId,
) -> LedgerResult<usize> {
    customers
        .iter()
        .position(|c| &c.id == customer_id && &c.user_id == user_id)
        .ok_or_else(|| LedgerError::not_found(format!("customer {}", customer_id)))
}

/// Looks up one of the user's customers. Customers owned by someone else are reported as
/// missing.
pub fn find_customer(
    customers: &Vector<Customer>,
    user_id: &UserId,
    customer_id: &CustomerId,
) -> LedgerResult<Customer> {
    let idx = position_of(customers, user_id, customer_id)?;
    Ok(customers[idx].clone())
}

/// The customer's transactions, newest first.
pub fn customer_transactions(
    transactions: &Vector<Transaction>,
    customer_id: &CustomerId,
) -> Vec<Transaction> {
    let mut history: Vec<Transaction> = transactions
        .iter()
        .filter(|t| &t.customer_id == customer_id)
        .cloned()
        .collect();
    // stable: same-instant entries keep insertion order
    history.sort_by(|a, b| b.date.cmp(&a.date));
    history
}

/// Parses a typed-in amount. Anything that is not a number greater than zero, in cents,
/// and no larger than [`MonetaryAmount::max`] is rejected.
pub fn parse_amount(input: &str) -> LedgerResult<Decimal> {
    let trimmed = input.trim();
    let amount = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| LedgerError::InvalidAmount(input.to_string()))?;
    ensure_valid_amount(amount)
}

fn ensure_valid_amount(amount: Decimal) -> LedgerResult<Decimal> {
    if amount > Decimal::ZERO && MonetaryAmount::new(amount).is_storable() {
        Ok(amount.normalize())
    } else {
        Err(LedgerError::InvalidAmount(amount.to_string()))
    }
}

/// Appends the transaction and moves the customer's balance by its signed amount. Both
/// collections are returned together; on error neither has changed.
pub fn record_transaction(
    customers: &Vector<Customer>,
    transactions: &Vector<Transaction>,
    user_id: &UserId,
    request: TransactionRequest,
    now: DateTime<Utc>,
) -> LedgerResult<Recorded> {
    let amount = MonetaryAmount::new(ensure_valid_amount(request.amount)?);
    let idx = position_of(customers, user_id, &request.customer_id)?;

    let transaction = Transaction {
        id: TransactionId::generate(),
        customer_id: request.customer_id,
        tx_type: request.tx_type,
        amount,
        description: clean_field(request.description.as_deref()),
        date: now,
    };
    let current = &customers[idx];
    let balance = current
        .balance
        .checked_add(transaction.signed_amount())
        .ok_or_else(|| {
            LedgerError::InvalidAmount(format!(
                "{} would take the balance of {} past {}",
                transaction.amount,
                current.id,
                MonetaryAmount::max()
            ))
        })?;
    let customer = current.map_balance(|_| balance);

    Ok(Recorded {
        transactions: transactions.push(transaction.clone()),
        customers: customers.replace_idx(idx, customer.clone()),
        transaction,
        customer,
    })
}

pub fn compute_dashboard_totals(
    customers: &Vector<Customer>,
    user_id: &UserId,
    limit: usize,
) -> DashboardTotals {
    let owned = list_customers(customers, user_id);

    let total_owed = owned
        .iter()
        .filter(|c| c.balance.is_positive())
        .map(|c| c.balance)
        .sum();
    let total_credit = owned
        .iter()
        .filter(|c| c.balance.is_negative())
        .map(|c| c.balance.abs())
        .sum();

    let mut top_debtors: Vec<Customer> = owned
        .into_iter()
        .filter(|c| c.balance.is_positive())
        .collect();
    top_debtors.sort_by(|a, b| b.balance.cmp(&a.balance));
    top_debtors.truncate(limit);

    DashboardTotals {
        total_owed,
        total_credit,
        top_debtors,
    }
}

/// The balance implied by the customer's transaction log.
pub fn balance_from_history(
    transactions: &Vector<Transaction>,
    customer_id: &CustomerId,
) -> MonetaryAmount {
    transactions
        .iter()
        .filter(|t| &t.customer_id == customer_id)
        .map(Transaction::signed_amount)
        .sum()
}

/// Customers of the user whose stored balance no longer matches their transactions.
pub fn audit_balances(
    customers: &Vector<Customer>,
    transactions: &Vector<Transaction>,
    user_id: &UserId,
) -> Vec<BalanceDrift> {
    customers
        .iter()
        .filter(|c| &c.user_id == user_id)
        .filter_map(|c| {
            let recomputed = balance_from_history(transactions, &c.id);
            (recomputed != c.balance).then(|| BalanceDrift {
                customer_id: c.id.clone(),
                cached: c.balance,
                recomputed,
            })
        })
        .collect()
}

/// Rewrites the user's stored balances from the transaction log.
pub fn reconcile_balances(
    customers: &Vector<Customer>,
    transactions: &Vector<Transaction>,
    user_id: &UserId,
) -> Vector<Customer> {
    customers
        .iter()
        .map(|c| {
            if &c.user_id == user_id {
                c.map_balance(|_| balance_from_history(transactions, &c.id))
            } else {
                c.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use im::Vector;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::types::{Customer, MonetaryAmount, TransactionType, UserId};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn owner() -> UserId {
        UserId::new("owner")
    }

    fn with_customer(name: &str) -> (Customer, Vector<Customer>) {
        add_customer(&Vector::new(), &owner(), name, None, None, now()).unwrap()
    }

    fn request(customer: &Customer, tx_type: TransactionType, amount: Decimal) -> TransactionRequest {
        TransactionRequest {
            customer_id: customer.id.clone(),
            tx_type,
            amount,
            description: None,
        }
    }

    fn customer_with_balance(user_id: &UserId, name: &str, balance: Decimal) -> Customer {
        Customer {
            id: CustomerId::new(name),
            name: name.to_string(),
            phone: String::new(),
            notes: String::new(),
            balance: MonetaryAmount::new(balance),
            user_id: user_id.clone(),
            created_at: now(),
        }
    }

    #[test]
    fn duplicate_phone_is_rejected() {
        let (_, users) = create_user(&Vector::new(), "Ada", "+15550100", "1234", now()).unwrap();
        let err = create_user(&users, "Bob", "+15550100", "9999", now()).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicatePhone));
        assert_eq!(users.len(), 1);
    }

    #[test]
    fn authenticate_requires_matching_pin() {
        let (user, users) = create_user(&Vector::new(), "Ada", "+15550100", "1234", now()).unwrap();

        let err = authenticate(&users, "+15550100", "4321").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCredentials));

        let session = authenticate(&users, "+15550100", "1234").unwrap();
        assert_eq!(session.user_id, user.id);
        assert_eq!(session.name, "Ada");
    }

    #[test]
    fn pins_must_be_four_digits() {
        assert!(validate_pin("0420").is_ok());
        assert!(validate_pin("123").is_err());
        assert!(validate_pin("12345").is_err());
        assert!(validate_pin("12a4").is_err());
        assert!(validate_sign_up(" ", "+1555", "1234").is_err());
        assert!(validate_sign_up("Ada", "", "1234").is_err());
    }

    #[test]
    fn blank_customer_name_is_rejected() {
        let customers = Vector::new();
        let err = add_customer(&customers, &owner(), "   ", Some("+1"), None, now()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(customers.is_empty());
    }

    #[test]
    fn new_customer_is_trimmed_and_settled() {
        let (customer, customers) =
            add_customer(&Vector::new(), &owner(), "  Ada ", Some(" +1555 "), Some(""), now())
                .unwrap();
        assert_eq!(customer.name, "Ada");
        assert_eq!(customer.phone(), Some("+1555"));
        assert_eq!(customer.notes(), None);
        assert_eq!(customer.balance, MonetaryAmount::ZERO);
        assert_eq!(customers.len(), 1);
    }

    #[test]
    fn customers_are_listed_per_owner_in_insertion_order() {
        let other = UserId::new("other");
        let (_, customers) = add_customer(&Vector::new(), &owner(), "Zed", None, None, now()).unwrap();
        let (_, customers) = add_customer(&customers, &other, "Mia", None, None, now()).unwrap();
        let (_, customers) = add_customer(&customers, &owner(), "Abe", None, None, now()).unwrap();

        let names: Vec<String> = list_customers(&customers, &owner())
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Zed", "Abe"]);
    }

    #[test]
    fn balance_follows_debts_and_repayments() {
        let (customer, customers) = with_customer("Ada");
        let transactions = Vector::new();

        let steps = [
            (TransactionType::Debt, dec!(100), dec!(100)),
            (TransactionType::Repayment, dec!(40), dec!(60)),
            (TransactionType::Debt, dec!(10), dec!(70)),
        ];

        let (customers, transactions) = steps.iter().fold(
            (customers, transactions),
            |(customers, transactions), (tx_type, amount, expected)| {
                let recorded = record_transaction(
                    &customers,
                    &transactions,
                    &owner(),
                    request(&customer, *tx_type, *amount),
                    now(),
                )
                .unwrap();
                assert_eq!(recorded.customer.balance, MonetaryAmount::new(*expected));
                (recorded.customers, recorded.transactions)
            },
        );

        assert_eq!(transactions.len(), 3);
        assert_eq!(customers[0].balance, MonetaryAmount::new(dec!(70)));
    }

    #[test]
    fn non_positive_amount_changes_nothing() {
        let (customer, customers) = with_customer("Ada");
        let transactions = Vector::new();

        for amount in [dec!(0), dec!(-5)] {
            let err = record_transaction(
                &customers,
                &transactions,
                &owner(),
                request(&customer, TransactionType::Debt, amount),
                now(),
            )
            .unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount(_)));
        }
        assert!(transactions.is_empty());
        assert_eq!(customers[0].balance, MonetaryAmount::ZERO);
    }

    #[test]
    fn unknown_customer_is_not_found() {
        let (_, customers) = with_customer("Ada");
        let req = TransactionRequest {
            customer_id: CustomerId::new("missing"),
            tx_type: TransactionType::Debt,
            amount: dec!(5),
            description: None,
        };
        let err = record_transaction(&customers, &Vector::new(), &owner(), req, now()).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn another_owners_customer_is_not_found() {
        let (customer, customers) = with_customer("Ada");
        let err = record_transaction(
            &customers,
            &Vector::new(),
            &UserId::new("intruder"),
            request(&customer, TransactionType::Debt, dec!(5)),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
        assert!(find_customer(&customers, &UserId::new("intruder"), &customer.id).is_err());
    }

    #[test]
    fn amounts_parse_strictly() {
        assert_eq!(parse_amount(" 12.50 ").unwrap(), dec!(12.50));
        assert_eq!(parse_amount("1e2").unwrap(), dec!(100));
        for bad in ["", "abc", "0", "-3", "0.00"] {
            assert!(
                matches!(parse_amount(bad), Err(LedgerError::InvalidAmount(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn amounts_outside_storable_range_are_rejected() {
        assert_eq!(parse_amount("9999999999999.99").unwrap(), dec!(9999999999999.99));
        assert_eq!(parse_amount("12.500").unwrap(), dec!(12.5));
        for bad in [
            "10000000000000",
            "79228162514264337593543950335",
            "12345678901234567.89",
            "0.001",
            "1.255",
        ] {
            assert!(
                matches!(parse_amount(bad), Err(LedgerError::InvalidAmount(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn oversized_request_changes_nothing() {
        let (customer, customers) = with_customer("Ada");
        let transactions = Vector::new();
        for amount in [Decimal::MAX, dec!(0.005)] {
            let err = record_transaction(
                &customers,
                &transactions,
                &owner(),
                request(&customer, TransactionType::Debt, amount),
                now(),
            )
            .unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount(_)));
        }
        assert!(transactions.is_empty());
        assert_eq!(customers[0].balance, MonetaryAmount::ZERO);
    }

    #[test]
    fn balance_cannot_overflow() {
        let near_max = customer_with_balance(&owner(), "a", dec!(9999999999999.00));
        let customers: Vector<Customer> = vec![near_max.clone()].into_iter().collect();
        let transactions = Vector::new();

        let err = record_transaction(
            &customers,
            &transactions,
            &owner(),
            request(&near_max, TransactionType::Debt, dec!(1)),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
        assert_eq!(customers[0], near_max);

        let recorded = record_transaction(
            &customers,
            &transactions,
            &owner(),
            request(&near_max, TransactionType::Repayment, dec!(1)),
            now(),
        )
        .unwrap();
        assert_eq!(recorded.customer.balance, MonetaryAmount::new(dec!(9999999999998)));
    }

    #[test]
    fn history_is_newest_first() {
        let (customer, customers) = with_customer("Ada");
        let first = record_transaction(
            &customers,
            &Vector::new(),
            &owner(),
            request(&customer, TransactionType::Debt, dec!(1)),
            now(),
        )
        .unwrap();
        let second = record_transaction(
            &first.customers,
            &first.transactions,
            &owner(),
            request(&customer, TransactionType::Repayment, dec!(1)),
            now() + Duration::days(1),
        )
        .unwrap();

        let history = customer_transactions(&second.transactions, &customer.id);
        assert_eq!(history[0].id, second.transaction.id);
        assert_eq!(history[1].id, first.transaction.id);
    }

    #[test]
    fn dashboard_splits_owed_and_credit() {
        let customers: Vector<Customer> = vec![
            customer_with_balance(&owner(), "a", dec!(50)),
            customer_with_balance(&owner(), "b", dec!(-20)),
            customer_with_balance(&UserId::new("other"), "c", dec!(999)),
        ]
        .into_iter()
        .collect();

        let totals = compute_dashboard_totals(&customers, &owner(), 5);
        assert_eq!(totals.total_owed, MonetaryAmount::new(dec!(50)));
        assert_eq!(totals.total_credit, MonetaryAmount::new(dec!(20)));
        assert_eq!(totals.top_debtors.len(), 1);
        assert_eq!(totals.top_debtors[0].name, "a");
    }

    #[test]
    fn top_debtors_are_capped_and_ties_keep_list_order() {
        let balances = [dec!(10), dec!(30), dec!(0), dec!(30), dec!(5), dec!(-8), dec!(20), dec!(1)];
        let customers: Vector<Customer> = balances
            .iter()
            .enumerate()
            .map(|(i, b)| customer_with_balance(&owner(), &format!("c{i}"), *b))
            .collect();

        let names: Vec<String> = compute_dashboard_totals(&customers, &owner(), 5)
            .top_debtors
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["c1", "c3", "c6", "c0", "c4"]);
    }

    #[test]
    fn audit_reports_and_reconcile_repairs_drift() {
        let (customer, customers) = with_customer("Ada");
        let recorded = record_transaction(
            &customers,
            &Vector::new(),
            &owner(),
            request(&customer, TransactionType::Debt, dec!(25)),
            now(),
        )
        .unwrap();
        assert!(audit_balances(&recorded.customers, &recorded.transactions, &owner()).is_empty());

        // a write path that forgot to update the balance
        let stale = recorded
            .customers
            .iter()
            .map(|c| c.map_balance(|_| MonetaryAmount::ZERO))
            .collect();
        let drift = audit_balances(&stale, &recorded.transactions, &owner());
        assert_eq!(
            drift,
            vec![BalanceDrift {
                customer_id: customer.id.clone(),
                cached: MonetaryAmount::ZERO,
                recomputed: MonetaryAmount::new(dec!(25)),
            }]
        );

        let repaired = reconcile_balances(&stale, &recorded.transactions, &owner());
        assert_eq!(repaired[0].balance, MonetaryAmount::new(dec!(25)));
    }

    fn tx_strategy() -> impl Strategy<Value = (bool, i64)> {
        (any::<bool>(), 1i64..1_000_000i64)
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// The cached balance always equals the signed sum of the recorded amounts.
        #[test]
        fn balance_equals_signed_sum(txs in prop::collection::vec(tx_strategy(), 0..40)) {
            let (customer, mut customers) = with_customer("Ada");
            let mut transactions = Vector::new();
            let mut expected = Decimal::ZERO;

            for (is_debt, cents) in txs {
                let amount = Decimal::new(cents, 2);
                let tx_type = if is_debt { TransactionType::Debt } else { TransactionType::Repayment };
                expected += if is_debt { amount } else { -amount };

                let recorded = record_transaction(
                    &customers,
                    &transactions,
                    &owner(),
                    request(&customer, tx_type, amount),
                    now(),
                ).unwrap();
                customers = recorded.customers;
                transactions = recorded.transactions;
            }

            prop_assert_eq!(customers[0].balance, MonetaryAmount::new(expected));
            prop_assert_eq!(balance_from_history(&transactions, &customer.id), MonetaryAmount::new(expected));
        }

        /// Top debtors hold at most five customers, all owing, largest balance first.
        #[test]
        fn top_debtors_are_bounded_and_sorted(balances in prop::collection::vec(-10_000i64..10_000i64, 0..20)) {
            let customers: Vector<Customer> = balances
                .iter()
                .enumerate()
                .map(|(i, b)| customer_with_balance(&owner(), &format!("c{i}"), Decimal::new(*b, 2)))
                .collect();

            let top = compute_dashboard_totals(&customers, &owner(), 5).top_debtors;
            prop_assert!(top.len() <= 5);
            prop_assert!(top.iter().all(|c| c.balance.is_positive()));
            prop_assert!(top.windows(2).all(|w| w[0].balance >= w[1].balance));
        }
    }
}
