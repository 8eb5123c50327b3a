//! Treasury state-transition engine.
//!
//! A shared ledger of membership, funds, and spending rules governed by
//! threshold approval: proposal lifecycle, per-member spending limits with
//! windowed resets, pre-authorized recurring payments, period-bucketed
//! analytics, and a hash-chained transaction history.

#![deny(unsafe_code)]

pub mod analytics;
pub mod connectors;
pub mod error;
pub mod history;
pub mod limits;
pub mod members;
pub mod proposals;
pub mod recurring;
pub mod runtime;
pub mod types;

pub use analytics::{
    ActivitySummary, AnalyticsBook, AnalyticsConfig, MemberStats, PeriodStats, TxDirection,
};
pub use connectors::{LedgerConnector, TransferError};
pub use error::TreasuryError;
pub use history::{HistoryEntry, TransactionKind, TransactionLog};
pub use limits::{LimitWindowConfig, SpendingLimit, SpendingLimitBook, UNLIMITED};
pub use members::{Member, MemberRegistry, Role};
pub use proposals::{Proposal, ProposalBook, ProposalKind, ProposalStatus, Vote};
pub use recurring::{BatchOutcome, PaymentScheduler, RecurringPayment};
pub use runtime::{EmergencySeedVote, EngineConfig, TreasuryEngine};
pub use types::{CallContext, Principal, Tick, VaultStats};
