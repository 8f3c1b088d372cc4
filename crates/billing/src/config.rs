use serde::{Deserialize, Serialize};

/// What to do when a payment exceeds the open balance.
///
/// Observed shop behavior differs here, so it is a policy, not a rule:
/// `Reject` refuses the payment outright; `CreditToAccount` settles the
/// balance and parks the excess as the customer's store credit. Walk-in
/// overpayments are always rejected (no account to credit).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverpaymentPolicy {
    #[default]
    Reject,
    CreditToAccount,
}

/// Settings the billing workflows consume.
///
/// Mirrors the dashboard's settings page: invoice number format, loyalty
/// accrual rate, receivables aging. Currency *formatting* is display-only and
/// stays out of the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Prefix for human-facing invoice numbers.
    pub invoice_prefix: String,
    /// First number the allocator will issue for that prefix.
    pub next_invoice_number: u64,
    /// Loyalty accrual: one point per this many currency units of grand
    /// total (integer division). Zero disables accrual.
    pub points_per_unit: u64,
    /// An unpaid invoice older than this many days marks the customer's
    /// receivable as overdue.
    pub overdue_after_days: i64,
    pub overpayment_policy: OverpaymentPolicy,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            invoice_prefix: "INV-".to_string(),
            next_invoice_number: 1025,
            points_per_unit: 100,
            overdue_after_days: 30,
            overpayment_policy: OverpaymentPolicy::Reject,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_settings_page() {
        let config = BillingConfig::default();
        assert_eq!(config.invoice_prefix, "INV-");
        assert_eq!(config.next_invoice_number, 1025);
        assert_eq!(config.points_per_unit, 100);
        // Documented default: receivables age out at 30 days.
        assert_eq!(config.overdue_after_days, 30);
        assert_eq!(config.overpayment_policy, OverpaymentPolicy::Reject);
    }
}
