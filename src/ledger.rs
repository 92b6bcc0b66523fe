//! Append-only wallet and XP-bank history with running totals.
//!
//! Entries are the source of truth; the per-account total is a projection
//! updated under the same lock as the append, so it always equals the sum of
//! that account's deltas. Appends for one account are serialized; different
//! accounts never contend on the same lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// Coins paid for label quality.
    Wallet,
    /// Experience points paid for annotations.
    XpBank,
}

/// One balance: which ledger, whose account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountKey {
    pub kind: LedgerKind,
    pub account_id: String,
}

impl AccountKey {
    pub fn wallet(account_id: impl Into<String>) -> Self {
        Self {
            kind: LedgerKind::Wallet,
            account_id: account_id.into(),
        }
    }

    pub fn xp(account_id: impl Into<String>) -> Self {
        Self {
            kind: LedgerKind::XpBank,
            account_id: account_id.into(),
        }
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            LedgerKind::Wallet => "wallet",
            LedgerKind::XpBank => "xp",
        };
        write!(f, "{kind}:{}", self.account_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub account: AccountKey,
    pub delta: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(account: AccountKey, delta: i64, reason: impl Into<String>) -> Self {
        Self {
            account,
            delta,
            reason: reason.into(),
            created_at: Utc::now(),
        }
    }
}

/// Persistence collaborator for ledger history.
pub trait LedgerStore: Send + Sync {
    /// Append one entry; returns the account's new running total.
    fn append(&self, entry: LedgerEntry) -> Result<i64>;
    /// Sum of all deltas for `account` (0 for unknown accounts).
    fn running_total(&self, account: &AccountKey) -> i64;
    /// History for `account` in insertion order.
    fn entries(&self, account: &AccountKey) -> Vec<LedgerEntry>;
}

#[derive(Debug, Default)]
struct Book {
    entries: Vec<LedgerEntry>,
    total: i64,
}

/// Process-local ledger with one lock per account.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    books: RwLock<HashMap<AccountKey, Arc<Mutex<Book>>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn book(&self, account: &AccountKey) -> Option<Arc<Mutex<Book>>> {
        self.books
            .read()
            .expect("ledger index lock poisoned")
            .get(account)
            .cloned()
    }

    fn book_or_create(&self, account: &AccountKey) -> Arc<Mutex<Book>> {
        if let Some(b) = self.book(account) {
            return b;
        }
        let mut books = self.books.write().expect("ledger index lock poisoned");
        books.entry(account.clone()).or_default().clone()
    }

    /// Recompute the sum from history and compare with the cached total.
    pub fn verify(&self, account: &AccountKey) -> bool {
        match self.book(account) {
            Some(b) => {
                let book = b.lock().expect("ledger book mutex poisoned");
                book.entries.iter().map(|e| e.delta).sum::<i64>() == book.total
            }
            None => true,
        }
    }

    pub fn accounts(&self) -> Vec<AccountKey> {
        self.books
            .read()
            .expect("ledger index lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl LedgerStore for InMemoryLedger {
    fn append(&self, entry: LedgerEntry) -> Result<i64> {
        if entry.reason.trim().is_empty() {
            return Err(EngineError::invalid("ledger entry needs a reason"));
        }
        if entry.account.account_id.trim().is_empty() {
            return Err(EngineError::invalid("ledger entry needs an account id"));
        }

        let book = self.book_or_create(&entry.account);
        let mut book = book.lock().expect("ledger book mutex poisoned");
        let total = book.total.checked_add(entry.delta).ok_or_else(|| {
            EngineError::invalid(format!(
                "delta {} would overflow the balance of {}",
                entry.delta, entry.account
            ))
        })?;

        debug!(account = %entry.account, delta = entry.delta, total, "ledger append");
        counter!("ledger_entries_total").increment(1);

        book.entries.push(entry);
        book.total = total;
        Ok(total)
    }

    fn running_total(&self, account: &AccountKey) -> i64 {
        self.book(account)
            .map(|b| b.lock().expect("ledger book mutex poisoned").total)
            .unwrap_or(0)
    }

    fn entries(&self, account: &AccountKey) -> Vec<LedgerEntry> {
        self.book(account)
            .map(|b| b.lock().expect("ledger book mutex poisoned").entries.clone())
            .unwrap_or_default()
    }
}
