use crate::error::TreasuryError;
use crate::types::{Principal, Tick};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Transaction history entry kinds. Recurring payouts are tagged distinctly
/// from proposal-driven transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    ProposalPayout,
    EmergencyPayout,
    RecurringPayout,
}

impl TransactionKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::ProposalPayout => "proposal_payout",
            Self::EmergencyPayout => "emergency_payout",
            Self::RecurringPayout => "recurring_payout",
        }
    }
}

/// Hash-chained transaction record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub entry_id: String,
    pub index: u64,
    pub kind: TransactionKind,
    pub amount_minor: u64,
    pub from: Principal,
    pub to: Principal,
    pub tick: Tick,
    pub memo: String,
    pub previous_hash: Option<String>,
    pub entry_hash: String,
}

/// Append-only transaction history with hash-chain proofs.
///
/// No in-place mutation APIs are exposed; every executed transfer becomes
/// one additional record, so the full payout trail stays auditable.
#[derive(Debug, Default, Clone)]
pub struct TransactionLog {
    entries: Vec<HistoryEntry>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Rebuild a log from persisted entries and verify hash-chain integrity.
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Result<Self, TreasuryError> {
        let log = Self { entries };

        for (expected_index, entry) in log.entries.iter().enumerate() {
            if entry.index != expected_index as u64 {
                return Err(TreasuryError::ExecutionFailed(format!(
                    "history index gap at position {} (found {})",
                    expected_index, entry.index
                )));
            }
        }

        if !log.verify_chain() {
            return Err(TreasuryError::ExecutionFailed(
                "persisted history hash-chain verification failed".to_string(),
            ));
        }

        Ok(log)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, index: u64) -> Option<&HistoryEntry> {
        self.entries.get(index as usize)
    }

    pub fn len(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(
        &mut self,
        kind: TransactionKind,
        amount_minor: u64,
        from: Principal,
        to: Principal,
        tick: Tick,
        memo: impl Into<String>,
    ) -> &HistoryEntry {
        let index = self.entries.len() as u64;
        let memo = memo.into();
        let previous_hash = self.entries.last().map(|entry| entry.entry_hash.clone());
        let entry_hash = compute_entry_hash(
            index,
            kind,
            amount_minor,
            &from,
            &to,
            tick,
            &memo,
            previous_hash.as_deref(),
        );

        self.entries.push(HistoryEntry {
            entry_id: Uuid::new_v4().to_string(),
            index,
            kind,
            amount_minor,
            from,
            to,
            tick,
            memo,
            previous_hash,
            entry_hash,
        });
        self.entries.last().expect("entry just pushed")
    }

    pub fn verify_chain(&self) -> bool {
        let mut previous_hash: Option<String> = None;
        for entry in &self.entries {
            let expected_hash = compute_entry_hash(
                entry.index,
                entry.kind,
                entry.amount_minor,
                &entry.from,
                &entry.to,
                entry.tick,
                &entry.memo,
                previous_hash.as_deref(),
            );
            if entry.entry_hash != expected_hash {
                return false;
            }
            if entry.previous_hash != previous_hash {
                return false;
            }
            previous_hash = Some(entry.entry_hash.clone());
        }
        true
    }
}

#[allow(clippy::too_many_arguments)]
fn compute_entry_hash(
    index: u64,
    kind: TransactionKind,
    amount_minor: u64,
    from: &Principal,
    to: &Principal,
    tick: Tick,
    memo: &str,
    previous_hash: Option<&str>,
) -> String {
    let material = serde_json::json!({
        "index": index,
        "kind": kind,
        "amount_minor": amount_minor,
        "from": from,
        "to": to,
        "tick": tick,
        "memo": memo,
        "previous_hash": previous_hash,
    });

    let bytes = serde_json::to_vec(&material).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> TransactionLog {
        let mut log = TransactionLog::new();
        log.append(
            TransactionKind::Deposit,
            5_000,
            Principal::from("alice"),
            Principal::from("vault"),
            100,
            "seed funding",
        );
        log.append(
            TransactionKind::ProposalPayout,
            1_200,
            Principal::from("vault"),
            Principal::from("vendor"),
            250,
            "proposal 1",
        );
        log
    }

    #[test]
    fn verifies_hash_chain() {
        let log = sample_log();
        assert_eq!(log.len(), 2);
        assert!(log.verify_chain());
        assert_eq!(log.get(1).unwrap().previous_hash, Some(log.get(0).unwrap().entry_hash.clone()));
    }

    #[test]
    fn detects_tampered_entries() {
        let log = sample_log();

        // Tamper outside of append APIs to validate proof behavior.
        let mut tampered = log.clone();
        tampered.entries[1].amount_minor = 999_999;

        assert!(!tampered.verify_chain());
    }

    #[test]
    fn rebuild_accepts_intact_entries() {
        let log = sample_log();
        let rebuilt = TransactionLog::from_entries(log.entries().to_vec()).unwrap();
        assert_eq!(rebuilt.len(), 2);
    }

    #[test]
    fn rebuild_rejects_index_gaps() {
        let log = sample_log();
        let mut entries = log.entries().to_vec();
        entries.remove(0);

        let err = TransactionLog::from_entries(entries).unwrap_err();
        assert!(matches!(err, TreasuryError::ExecutionFailed(_)));
    }
}
