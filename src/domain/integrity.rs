use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use super::{AccountId, Cents, Transfer};

/// Net movement per account implied by a set of transfers:
/// incoming amounts minus outgoing amounts.
pub fn compute_net_flows(transfers: &[Transfer]) -> HashMap<AccountId, Cents> {
    let mut flows: HashMap<AccountId, Cents> = HashMap::new();

    for transfer in transfers {
        *flows.entry(transfer.from_account_id).or_insert(0) -= transfer.amount;
        *flows.entry(transfer.to_account_id).or_insert(0) += transfer.amount;
    }

    flows
}

/// An account whose entries disagree with the transfers that touched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryMismatch {
    pub account_id: AccountId,
    pub entry_total: Cents,
    pub transfer_total: Cents,
}

/// Result of a ledger integrity check.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub account_count: i64,
    pub transfer_count: i64,
    pub entry_count: i64,
    /// Sum of every entry ever written. Must be zero.
    pub entry_sum: Cents,
    pub non_positive_transfers: i64,
    pub mismatches: Vec<EntryMismatch>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.entry_sum == 0
            && self.entry_count == 2 * self.transfer_count
            && self.non_positive_transfers == 0
            && self.mismatches.is_empty()
    }
}

/// Compare per-account entry totals with the net flows implied by transfers.
pub fn build_integrity_report(
    account_count: i64,
    transfers: &[Transfer],
    entry_count: i64,
    entry_totals: &HashMap<AccountId, Cents>,
) -> IntegrityReport {
    let flows = compute_net_flows(transfers);

    let mismatches: Vec<EntryMismatch> = flows
        .keys()
        .chain(entry_totals.keys())
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .filter_map(|account_id| {
            let entry_total = entry_totals.get(&account_id).copied().unwrap_or(0);
            let transfer_total = flows.get(&account_id).copied().unwrap_or(0);
            (entry_total != transfer_total).then_some(EntryMismatch {
                account_id,
                entry_total,
                transfer_total,
            })
        })
        .collect();

    IntegrityReport {
        account_count,
        transfer_count: transfers.len() as i64,
        entry_count,
        entry_sum: entry_totals.values().sum(),
        non_positive_transfers: transfers.iter().filter(|t| t.amount <= 0).count() as i64,
        mismatches,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn make_transfer(id: i64, from: AccountId, to: AccountId, amount: Cents) -> Transfer {
        Transfer {
            id,
            from_account_id: from,
            to_account_id: to,
            amount,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_net_flows_sum_to_zero() {
        let transfers = vec![
            make_transfer(1, 1, 2, 1000),
            make_transfer(2, 2, 3, 500),
            make_transfer(3, 3, 1, 200),
        ];

        let flows = compute_net_flows(&transfers);

        assert_eq!(flows.get(&1), Some(&-800));
        assert_eq!(flows.get(&2), Some(&500));
        assert_eq!(flows.get(&3), Some(&300));
        assert_eq!(flows.values().sum::<Cents>(), 0);
    }

    #[test]
    fn test_report_healthy_when_entries_match() {
        let transfers = vec![make_transfer(1, 1, 2, 100)];
        let entries = HashMap::from([(1, -100), (2, 100)]);

        let report = build_integrity_report(2, &transfers, 2, &entries);

        assert!(report.is_healthy());
        assert_eq!(report.entry_sum, 0);
    }

    #[test]
    fn test_report_flags_missing_entry() {
        let transfers = vec![make_transfer(1, 1, 2, 100)];
        let entries = HashMap::from([(1, -100)]);

        let report = build_integrity_report(2, &transfers, 1, &entries);

        assert!(!report.is_healthy());
        assert_eq!(report.entry_sum, -100);
        assert_eq!(
            report.mismatches,
            vec![EntryMismatch {
                account_id: 2,
                entry_total: 0,
                transfer_total: 100,
            }]
        );
    }
}
