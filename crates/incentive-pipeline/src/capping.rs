//! Performance amount capping
//!
//! The per-contract cap is applied first, then the project limit clamps the
//! project's running total. Excess is dropped, never carried forward.

use incentive_common::{ContractData, PerformanceLimits, ProjectStats};
use rust_decimal::Decimal;

/// Result of capping one contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CappedAmount {
    pub amount: Decimal,
    pub contract_cap_applied: bool,
    pub project_limit_applied: bool,
}

impl CappedAmount {
    fn zero() -> Self {
        Self {
            amount: Decimal::ZERO,
            contract_cap_applied: false,
            project_limit_applied: false,
        }
    }
}

/// Whether the project aggregate must be loaded for this contract
pub fn needs_project_stats(contract: &ContractData, limits: &PerformanceLimits) -> bool {
    !contract.is_historical
        && contract.project_id.is_some()
        && limits.project_limit_for(contract.order_type).is_some()
}

/// Compute the contract's performance contribution.
///
/// `project` is the project's aggregate before this contract; it is only
/// consulted when a project limit applies.
pub fn cap_amount(
    contract: &ContractData,
    limits: &PerformanceLimits,
    project: Option<&ProjectStats>,
) -> CappedAmount {
    if contract.is_historical {
        return CappedAmount::zero();
    }

    let mut capped = CappedAmount {
        amount: contract.contract_amount,
        contract_cap_applied: false,
        project_limit_applied: false,
    };

    if let Some(cap) = limits.contract_cap_for(contract.order_type) {
        if capped.amount > cap {
            capped.amount = cap;
            capped.contract_cap_applied = true;
        }
    }

    if let (Some(limit), Some(project)) = (limits.project_limit_for(contract.order_type), project) {
        let remaining = (limit - project.performance_amount).max(Decimal::ZERO);
        if capped.amount > remaining {
            capped.amount = remaining;
            capped.project_limit_applied = true;
        }
    }

    capped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use incentive_common::OrderType;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn contract(amount: Decimal) -> ContractData {
        ContractData::new("c", "H", amount, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap())
            .with_project("P")
    }

    fn limits(enable: bool) -> PerformanceLimits {
        PerformanceLimits {
            enable_cap: enable,
            single_contract_cap: Some(dec!(50000)),
            ..Default::default()
        }
    }

    fn project(amount: Decimal) -> ProjectStats {
        ProjectStats {
            project_id: "P".into(),
            activity_code: "bj".into(),
            contract_count: 1,
            total_amount: amount,
            performance_amount: amount,
        }
    }

    #[test]
    fn test_contract_cap() {
        let capped = cap_amount(&contract(dec!(80000)), &limits(true), None);
        assert_eq!(capped.amount, dec!(50000));
        assert!(capped.contract_cap_applied);

        let uncapped = cap_amount(&contract(dec!(80000)), &limits(false), None);
        assert_eq!(uncapped.amount, dec!(80000));
        assert!(!uncapped.contract_cap_applied);
    }

    #[test]
    fn test_project_limit_clamps_remaining() {
        let mut l = limits(true);
        l.single_project_limit = Some(dec!(50000));

        let first = cap_amount(&contract(dec!(30000)), &l, Some(&project(Decimal::ZERO)));
        assert_eq!(first.amount, dec!(30000));

        let second = cap_amount(&contract(dec!(30000)), &l, Some(&project(dec!(30000))));
        assert_eq!(second.amount, dec!(20000));
        assert!(second.project_limit_applied);

        let exhausted = cap_amount(&contract(dec!(30000)), &l, Some(&project(dec!(50000))));
        assert_eq!(exhausted.amount, Decimal::ZERO);
    }

    #[test]
    fn test_project_limit_without_cap_switch() {
        let mut l = limits(false);
        l.single_project_limit = Some(dec!(50000));
        assert!(needs_project_stats(&contract(dec!(30000)), &l));

        let second = cap_amount(&contract(dec!(30000)), &l, Some(&project(dec!(30000))));
        assert_eq!(second.amount, dec!(20000));
        assert!(second.project_limit_applied);
        assert!(!second.contract_cap_applied);
    }

    #[test]
    fn test_self_referral_cap_replaces_generic() {
        let mut l = limits(true);
        l.self_referral_contract_cap = Some(dec!(20000));
        let c = contract(dec!(40000)).with_order_type(OrderType::SelfReferral);
        assert_eq!(cap_amount(&c, &l, None).amount, dec!(20000));
    }

    #[test]
    fn test_historical_contributes_zero() {
        let c = contract(dec!(40000)).historical();
        assert_eq!(cap_amount(&c, &limits(false), None).amount, Decimal::ZERO);
        assert!(!needs_project_stats(&c, &limits(true)));
    }

    proptest! {
        #[test]
        fn prop_capped_within_cap_and_allowance(
            amount in 0u64..500_000,
            cap in 1u64..200_000,
            limit in 1u64..300_000,
            used in 0u64..400_000,
        ) {
            let l = PerformanceLimits {
                enable_cap: true,
                single_contract_cap: Some(Decimal::from(cap)),
                single_project_limit: Some(Decimal::from(limit)),
                ..Default::default()
            };
            let capped = cap_amount(&contract(Decimal::from(amount)), &l, Some(&project(Decimal::from(used))));
            let allowance = (Decimal::from(limit) - Decimal::from(used)).max(Decimal::ZERO);

            prop_assert!(capped.amount >= Decimal::ZERO);
            prop_assert!(capped.amount <= Decimal::from(amount));
            prop_assert!(capped.amount <= Decimal::from(cap));
            prop_assert!(capped.amount <= allowance);
        }
    }
}
