//! Budget reconciliation — compares a simulated order total to the
//! buyer's spending cap.

use crate::{format::round_money, types::Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What the deposit percentage is applied to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositBasis {
    /// Deposit sized on the order actually being placed (grand total).
    #[default]
    Order,
    /// Deposit reserved against the whole budget cap.
    Allocation,
}

/// Buyer-configurable budget parameters. Persisted as a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSettings {
    pub budget_cap:         Money,
    /// 0..=100
    pub deposit_percentage: Decimal,
    #[serde(default)]
    pub deposit_basis:      DepositBasis,
}

impl Default for BudgetSettings {
    fn default() -> Self {
        Self {
            budget_cap:         Decimal::ZERO,
            deposit_percentage: Decimal::ZERO,
            deposit_basis:      DepositBasis::Order,
        }
    }
}

impl std::fmt::Display for DepositBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Order      => write!(f, "order"),
            Self::Allocation => write!(f, "allocation"),
        }
    }
}

impl BudgetSettings {
    pub fn valid_cap(value: Money) -> bool {
        value >= Decimal::ZERO
    }

    pub fn valid_deposit_percentage(value: Decimal) -> bool {
        (Decimal::ZERO..=Decimal::ONE_HUNDRED).contains(&value)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub deposit_amount:   Money,
    /// Negative when the order exceeds the cap.
    pub remaining_budget: Money,
    /// 0 when the cap is 0.
    pub percent_used:     Decimal,
}

impl BudgetSummary {
    /// None when a figure does not fit in a `Decimal` (e.g. a tiny cap
    /// against a large order).
    pub fn compute(grand_total: Money, settings: &BudgetSettings) -> Option<Self> {
        let deposit_base = match settings.deposit_basis {
            DepositBasis::Order => grand_total,
            DepositBasis::Allocation => settings.budget_cap,
        };
        let deposit_amount = deposit_base
            .checked_mul(settings.deposit_percentage)?
            .checked_div(Decimal::ONE_HUNDRED)?;

        let percent_used = if settings.budget_cap.is_zero() {
            Decimal::ZERO
        } else {
            grand_total
                .checked_div(settings.budget_cap)?
                .checked_mul(Decimal::ONE_HUNDRED)?
        };

        Some(Self {
            deposit_amount:   round_money(deposit_amount),
            remaining_budget: round_money(settings.budget_cap.checked_sub(grand_total)?),
            percent_used:     round_money(percent_used),
        })
    }

    pub fn is_over_budget(&self) -> bool {
        self.remaining_budget < Decimal::ZERO
    }
}
