use crate::error::TreasuryError;
use crate::types::{Principal, Tick};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Direction of a recorded treasury transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxDirection {
    Inflow,
    Outflow,
}

/// Analytics bucketing and burn-rate window configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Width of one aggregation bucket, in ticks.
    pub period_length: Tick,
    /// Number of trailing periods the burn rate averages over.
    pub burn_window: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            period_length: 1_440,
            burn_window: 30,
        }
    }
}

/// Aggregated volume for one fixed-width time bucket. Created lazily on the
/// first transaction in the bucket, updated additively, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub period_index: u64,
    pub starts_at: Tick,
    pub ends_at: Tick,
    pub inflows_minor: u64,
    pub outflows_minor: u64,
    pub tx_count: u64,
    pub avg_tx_minor: u64,
}

/// Additive per-member activity counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberStats {
    pub proposals_created: u64,
    pub votes_cast: u64,
    pub transactions_executed: u64,
    pub last_active: Tick,
    pub total_proposed_minor: u64,
    pub total_executed_minor: u64,
}

/// Derived activity report for one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub member: Principal,
    pub proposals_created: u64,
    pub votes_cast: u64,
    pub transactions_executed: u64,
    pub last_active: Tick,
    pub total_proposed_minor: u64,
    pub total_executed_minor: u64,
    pub avg_execution_minor: u64,
}

/// Period-bucketed treasury analytics, fed by every execution event.
///
/// A pure read/derive layer: nothing here gates execution, and all
/// arithmetic is integer (truncating division is expected).
#[derive(Debug, Clone)]
pub struct AnalyticsBook {
    periods: BTreeMap<u64, PeriodStats>,
    members: BTreeMap<Principal, MemberStats>,
    config: AnalyticsConfig,
}

impl AnalyticsBook {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            periods: BTreeMap::new(),
            members: BTreeMap::new(),
            config,
        }
    }

    pub fn record_transaction(&mut self, now: Tick, amount_minor: u64, direction: TxDirection) {
        let period_index = now / self.config.period_length;
        let period_length = self.config.period_length;
        let stats = self.periods.entry(period_index).or_insert_with(|| PeriodStats {
            period_index,
            starts_at: period_index * period_length,
            ends_at: (period_index + 1) * period_length - 1,
            inflows_minor: 0,
            outflows_minor: 0,
            tx_count: 0,
            avg_tx_minor: 0,
        });

        match direction {
            TxDirection::Inflow => stats.inflows_minor += amount_minor,
            TxDirection::Outflow => stats.outflows_minor += amount_minor,
        }
        stats.tx_count += 1;
        stats.avg_tx_minor = (stats.inflows_minor + stats.outflows_minor) / stats.tx_count;
    }

    /// Record member activity; one call may cover any subset of
    /// {proposal created, vote cast, execution}.
    pub fn record_member_activity(
        &mut self,
        member: &Principal,
        now: Tick,
        proposed_minor: u64,
        executed_minor: u64,
        voted: bool,
        executed: bool,
    ) {
        let stats = self.members.entry(member.clone()).or_default();
        if proposed_minor > 0 {
            stats.proposals_created += 1;
            stats.total_proposed_minor += proposed_minor;
        }
        if voted {
            stats.votes_cast += 1;
        }
        if executed {
            stats.transactions_executed += 1;
            stats.total_executed_minor += executed_minor;
        }
        stats.last_active = now;
    }

    pub fn period(&self, period_index: u64) -> Option<&PeriodStats> {
        self.periods.get(&period_index)
    }

    pub fn member(&self, member: &Principal) -> Option<&MemberStats> {
        self.members.get(member)
    }

    /// Average outflow per period over the trailing burn window ending at
    /// the current period. Missing buckets count as zero; integer division.
    pub fn burn_rate(&self, now: Tick) -> u64 {
        let current = now / self.config.period_length;
        let window = self.config.burn_window.max(1);
        let first = current.saturating_sub(window - 1);

        let outflows: u64 = (first..=current)
            .filter_map(|index| self.periods.get(&index))
            .map(|stats| stats.outflows_minor)
            .sum();
        outflows / window
    }

    /// Map the runway estimate (`balance / burn_rate`) onto a discrete
    /// health score. A zero burn rate counts as effectively infinite runway.
    pub fn health_score(&self, balance_minor: u64, now: Tick) -> u8 {
        let burn = self.burn_rate(now);
        if burn == 0 {
            return 100;
        }
        match balance_minor / burn {
            runway if runway > 12 => 100,
            runway if runway > 6 => 75,
            runway if runway > 3 => 50,
            _ => 25,
        }
    }

    /// Derived activity report. Unlike the plain lookups, this surfaces
    /// `NotFound` when the member has no recorded activity.
    pub fn activity_summary(&self, member: &Principal) -> Result<ActivitySummary, TreasuryError> {
        let stats = self
            .members
            .get(member)
            .ok_or_else(|| TreasuryError::NotFound(format!("no activity for '{member}'")))?;
        let avg_execution_minor = if stats.transactions_executed == 0 {
            0
        } else {
            stats.total_executed_minor / stats.transactions_executed
        };
        Ok(ActivitySummary {
            member: member.clone(),
            proposals_created: stats.proposals_created,
            votes_cast: stats.votes_cast,
            transactions_executed: stats.transactions_executed,
            last_active: stats.last_active,
            total_proposed_minor: stats.total_proposed_minor,
            total_executed_minor: stats.total_executed_minor,
            avg_execution_minor,
        })
    }
}
