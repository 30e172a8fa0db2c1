use chrono::{DateTime, Utc};
use im::Vector;
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult, StoreError};
use crate::ledger::{self, TransactionRequest};
use crate::reminder::{self, PaymentReminder};
use crate::store::{LedgerStore, TRANSACTIONS_KEY};
use crate::types::{
    BalanceDrift, Customer, CustomerId, DashboardTotals, Session, Transaction, TransactionType,
};

/// Where a freshly opened app should land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRoute {
    Onboarding,
    Auth,
    Customers,
}

/// Reads records from the store, runs them through the ledger functions and writes the
/// results back. The acting user is always passed in as a [`Session`].
pub struct CommunityLedger<S: LedgerStore> {
    store: S,
    config: LedgerConfig,
    clock: fn() -> DateTime<Utc>,
}

fn log_rejection<T>(op: &'static str, result: LedgerResult<T>) -> LedgerResult<T> {
    if let Err(e) = &result {
        warn!(op, error = %e, "request rejected");
    }
    result
}

impl<S: LedgerStore> CommunityLedger<S> {
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self {
            store,
            config,
            clock: Utc::now,
        }
    }

    pub fn with_clock(self, clock: fn() -> DateTime<Utc>) -> Self {
        Self { clock, ..self }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sign_up(&self, name: &str, phone: &str, pin: &str) -> LedgerResult<Session> {
        log_rejection("sign_up", self.try_sign_up(name, phone, pin))
    }

    fn try_sign_up(&self, name: &str, phone: &str, pin: &str) -> LedgerResult<Session> {
        ledger::validate_sign_up(name, phone, pin)?;
        let users = self.store.load_users()?;
        let (user, users) = ledger::create_user(&users, name, phone, pin, (self.clock)())?;
        self.store.save_users(&users)?;

        let session = Session::for_user(&user);
        self.store.save_session(&session)?;
        info!(user_id = %user.id, "account created");
        Ok(session)
    }

    pub fn log_in(&self, phone: &str, pin: &str) -> LedgerResult<Session> {
        log_rejection("log_in", self.try_log_in(phone, pin))
    }

    fn try_log_in(&self, phone: &str, pin: &str) -> LedgerResult<Session> {
        if phone.is_empty() {
            return Err(LedgerError::validation("phone is required"));
        }
        ledger::validate_pin(pin)?;
        let users = self.store.load_users()?;
        let session = ledger::authenticate(&users, phone, pin)?;
        self.store.save_session(&session)?;
        info!(user_id = %session.user_id, "logged in");
        Ok(session)
    }

    pub fn log_out(&self) -> LedgerResult<()> {
        self.store.clear_session()?;
        info!("logged out");
        Ok(())
    }

    pub fn current_session(&self) -> LedgerResult<Option<Session>> {
        Ok(self.store.load_session()?)
    }

    /// The stored session, or [`LedgerError::Unauthorized`] when nobody is logged in.
    pub fn require_session(&self) -> LedgerResult<Session> {
        self.current_session()?.ok_or(LedgerError::Unauthorized)
    }

    pub fn complete_onboarding(&self) -> LedgerResult<()> {
        Ok(self.store.mark_onboarding_complete()?)
    }

    pub fn entry_route(&self) -> LedgerResult<EntryRoute> {
        if self.store.load_session()?.is_some() {
            Ok(EntryRoute::Customers)
        } else if self.store.onboarding_complete()? {
            Ok(EntryRoute::Auth)
        } else {
            Ok(EntryRoute::Onboarding)
        }
    }

    pub fn add_customer(
        &self,
        session: &Session,
        name: &str,
        phone: Option<&str>,
        notes: Option<&str>,
    ) -> LedgerResult<Customer> {
        log_rejection("add_customer", self.try_add_customer(session, name, phone, notes))
    }

    fn try_add_customer(
        &self,
        session: &Session,
        name: &str,
        phone: Option<&str>,
        notes: Option<&str>,
    ) -> LedgerResult<Customer> {
        let customers = self.store.load_customers()?;
        let (customer, customers) =
            ledger::add_customer(&customers, &session.user_id, name, phone, notes, (self.clock)())?;
        self.store.save_customers(&customers)?;
        info!(user_id = %session.user_id, customer_id = %customer.id, "customer added");
        Ok(customer)
    }

    pub fn customers(&self, session: &Session) -> LedgerResult<Vec<Customer>> {
        let customers = self.store.load_customers()?;
        Ok(ledger::list_customers(&customers, &session.user_id))
    }

    /// The customer together with their transactions, newest first.
    pub fn customer_details(
        &self,
        session: &Session,
        customer_id: &CustomerId,
    ) -> LedgerResult<(Customer, Vec<Transaction>)> {
        let customers = self.store.load_customers()?;
        let customer = ledger::find_customer(&customers, &session.user_id, customer_id)?;
        let transactions = self.store.load_transactions()?;
        let history = ledger::customer_transactions(&transactions, customer_id);
        Ok((customer, history))
    }

    /// Records a debt or repayment typed in as text.
    pub fn record_transaction(
        &self,
        session: &Session,
        customer_id: &CustomerId,
        tx_type: TransactionType,
        amount: &str,
        description: Option<&str>,
    ) -> LedgerResult<(Transaction, Customer)> {
        let request = ledger::parse_amount(amount).map(|amount| TransactionRequest {
            customer_id: customer_id.clone(),
            tx_type,
            amount,
            description: description.map(str::to_string),
        });
        log_rejection(
            "record_transaction",
            request.and_then(|r| self.apply(session, r)),
        )
    }

    /// Applies an already-parsed request.
    pub fn apply(
        &self,
        session: &Session,
        request: TransactionRequest,
    ) -> LedgerResult<(Transaction, Customer)> {
        let mut applied = self.apply_batch(session, vec![request])?;
        applied.pop().ok_or_else(|| LedgerError::not_found("recorded transaction"))
    }

    /// Applies every request or none of them. The whole batch is folded in memory and
    /// written once.
    pub fn apply_batch(
        &self,
        session: &Session,
        requests: Vec<TransactionRequest>,
    ) -> LedgerResult<Vec<(Transaction, Customer)>> {
        let customers = self.store.load_customers()?;
        let transactions = self.store.load_transactions()?;

        let mut next_customers = customers;
        let mut next_transactions = transactions.clone();
        let mut applied = Vec::with_capacity(requests.len());
        for request in requests {
            let recorded = ledger::record_transaction(
                &next_customers,
                &next_transactions,
                &session.user_id,
                request,
                (self.clock)(),
            )?;
            next_customers = recorded.customers;
            next_transactions = recorded.transactions;
            applied.push((recorded.transaction, recorded.customer));
        }

        self.commit(&transactions, &next_transactions, &next_customers)?;

        for (transaction, customer) in &applied {
            info!(
                customer_id = %customer.id,
                tx_type = transaction.tx_type.label(),
                amount = %transaction.amount,
                balance = %customer.balance,
                "transaction recorded"
            );
        }
        Ok(applied)
    }

    // Transactions are written before customers; if the customer write fails the
    // previous transaction list is put back.
    fn commit(
        &self,
        previous: &Vector<Transaction>,
        transactions: &Vector<Transaction>,
        customers: &Vector<Customer>,
    ) -> LedgerResult<()> {
        self.store.save_transactions(transactions)?;
        if let Err(e) = self.store.save_customers(customers) {
            warn!(error = %e, "customer write failed, restoring transactions");
            return Err(match self.store.save_transactions(previous) {
                Ok(()) => e.into(),
                Err(rollback) => StoreError::Rollback {
                    key: TRANSACTIONS_KEY,
                    reason: rollback.to_string(),
                }
                .into(),
            });
        }
        Ok(())
    }

    pub fn dashboard(&self, session: &Session) -> LedgerResult<DashboardTotals> {
        let customers = self.store.load_customers()?;
        let totals = ledger::compute_dashboard_totals(
            &customers,
            &session.user_id,
            self.config.top_debtors_limit,
        );
        debug!(
            total_owed = %totals.total_owed,
            total_credit = %totals.total_credit,
            "dashboard computed"
        );
        Ok(totals)
    }

    pub fn audit(&self, session: &Session) -> LedgerResult<Vec<BalanceDrift>> {
        let customers = self.store.load_customers()?;
        let transactions = self.store.load_transactions()?;
        let drift = ledger::audit_balances(&customers, &transactions, &session.user_id);
        for d in &drift {
            warn!(
                customer_id = %d.customer_id,
                cached = %d.cached,
                recomputed = %d.recomputed,
                "balance out of step with transactions"
            );
        }
        Ok(drift)
    }

    /// Rewrites drifted balances from the transaction log and returns what was fixed.
    pub fn reconcile(&self, session: &Session) -> LedgerResult<Vec<BalanceDrift>> {
        let drift = self.audit(session)?;
        if !drift.is_empty() {
            let customers = self.store.load_customers()?;
            let transactions = self.store.load_transactions()?;
            let repaired = ledger::reconcile_balances(&customers, &transactions, &session.user_id);
            self.store.save_customers(&repaired)?;
            info!(repaired = drift.len(), "balances reconciled");
        }
        Ok(drift)
    }

    pub fn payment_reminder(
        &self,
        session: &Session,
        customer_id: &CustomerId,
    ) -> LedgerResult<PaymentReminder> {
        let customers = self.store.load_customers()?;
        let customer = ledger::find_customer(&customers, &session.user_id, customer_id)?;
        log_rejection(
            "payment_reminder",
            reminder::payment_reminder(&customer, &session.name),
        )
    }
}
