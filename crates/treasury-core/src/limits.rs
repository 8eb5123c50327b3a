use crate::error::TreasuryError;
use crate::types::{Principal, Tick};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Sentinel cap for members without an explicit spending policy.
pub const UNLIMITED: u64 = u64::MAX;

/// Window lengths for the daily and monthly rolling caps, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitWindowConfig {
    pub daily_window: Tick,
    pub monthly_window: Tick,
}

impl Default for LimitWindowConfig {
    fn default() -> Self {
        Self {
            daily_window: 1_440,
            monthly_window: 43_200,
        }
    }
}

/// Per-member spending caps with lazily rolled accumulators.
///
/// `last_day` / `last_month` hold the period index (`tick / window`) of the
/// last update; an accumulator is zeroed exactly once when its period index
/// advances, never retroactively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingLimit {
    pub daily_limit_minor: u64,
    pub monthly_limit_minor: u64,
    pub total_limit_minor: u64,
    pub daily_spent_minor: u64,
    pub monthly_spent_minor: u64,
    pub total_spent_minor: u64,
    pub last_day: u64,
    pub last_month: u64,
}

impl SpendingLimit {
    fn fresh(daily: u64, monthly: u64, total: u64, now: Tick, windows: LimitWindowConfig) -> Self {
        Self {
            daily_limit_minor: daily,
            monthly_limit_minor: monthly,
            total_limit_minor: total,
            daily_spent_minor: 0,
            monthly_spent_minor: 0,
            total_spent_minor: 0,
            last_day: now / windows.daily_window,
            last_month: now / windows.monthly_window,
        }
    }

    /// Accumulator values after applying any due rollover, without mutating.
    fn rolled_spent(&self, now: Tick, windows: LimitWindowConfig) -> (u64, u64) {
        let day = now / windows.daily_window;
        let month = now / windows.monthly_window;
        let daily = if day > self.last_day {
            0
        } else {
            self.daily_spent_minor
        };
        let monthly = if month > self.last_month {
            0
        } else {
            self.monthly_spent_minor
        };
        (daily, monthly)
    }
}

/// Per-member rolling spending caps.
///
/// Split into a pure `validate` and a mutating `consume` so the check can be
/// run as a pre-flight gate (or a dry run) with no side effects on failure.
/// The execution path calls them strictly in the order
/// validate -> transfer -> consume; a failed transfer means `consume` is
/// never reached.
#[derive(Debug, Clone, Default)]
pub struct SpendingLimitBook {
    limits: BTreeMap<Principal, SpendingLimit>,
    windows: LimitWindowConfig,
}

impl SpendingLimitBook {
    pub fn new(windows: LimitWindowConfig) -> Self {
        Self {
            limits: BTreeMap::new(),
            windows,
        }
    }

    /// Install or replace a member's spending policy. Reconfiguration resets
    /// every accumulator and reset marker.
    pub fn configure(
        &mut self,
        member: Principal,
        daily_limit_minor: u64,
        monthly_limit_minor: u64,
        total_limit_minor: u64,
        now: Tick,
    ) {
        self.limits.insert(
            member,
            SpendingLimit::fresh(
                daily_limit_minor,
                monthly_limit_minor,
                total_limit_minor,
                now,
                self.windows,
            ),
        );
    }

    /// Pure pre-flight check: would `amount_minor` fit within all three caps
    /// after any due rollover? Members without a policy pass unconditionally.
    pub fn validate(
        &self,
        member: &Principal,
        amount_minor: u64,
        now: Tick,
    ) -> Result<(), TreasuryError> {
        let Some(limit) = self.limits.get(member) else {
            return Ok(());
        };

        let (daily_spent, monthly_spent) = limit.rolled_spent(now, self.windows);
        let checks = [
            ("daily", daily_spent, limit.daily_limit_minor),
            ("monthly", monthly_spent, limit.monthly_limit_minor),
            ("total", limit.total_spent_minor, limit.total_limit_minor),
        ];

        for (window, spent, cap) in checks {
            let projected = spent.checked_add(amount_minor);
            if projected.map(|total| total > cap).unwrap_or(true) {
                debug!(%member, window, spent, cap, amount_minor, "spending limit check failed");
                return Err(TreasuryError::LimitExceeded(format!(
                    "{window} cap {cap} would be exceeded by '{member}' \
                     ({spent} spent + {amount_minor} requested)"
                )));
            }
        }
        Ok(())
    }

    /// Commit phase: roll due windows and add `amount_minor` to all three
    /// accumulators. Must only run after `validate` succeeded within the
    /// same operation. Members without a policy get a lazily created
    /// unlimited entry so lifetime totals still accrue.
    pub fn consume(&mut self, member: &Principal, amount_minor: u64, now: Tick) {
        let windows = self.windows;
        let limit = self.limits.entry(member.clone()).or_insert_with(|| {
            SpendingLimit::fresh(UNLIMITED, UNLIMITED, UNLIMITED, now, windows)
        });

        let day = now / windows.daily_window;
        let month = now / windows.monthly_window;
        if day > limit.last_day {
            limit.daily_spent_minor = 0;
            limit.last_day = day;
        }
        if month > limit.last_month {
            limit.monthly_spent_minor = 0;
            limit.last_month = month;
        }

        limit.daily_spent_minor += amount_minor;
        limit.monthly_spent_minor += amount_minor;
        limit.total_spent_minor = limit.total_spent_minor.saturating_add(amount_minor);
    }

    pub fn get(&self, member: &Principal) -> Option<&SpendingLimit> {
        self.limits.get(member)
    }

    /// Remaining headroom in the current daily window, with any due rollover
    /// applied virtually. Members without a policy report the unlimited
    /// sentinel.
    pub fn remaining_daily(&self, member: &Principal, now: Tick) -> u64 {
        match self.limits.get(member) {
            Some(limit) => {
                let (daily_spent, _) = limit.rolled_spent(now, self.windows);
                limit.daily_limit_minor.saturating_sub(daily_spent)
            }
            None => UNLIMITED,
        }
    }
}
