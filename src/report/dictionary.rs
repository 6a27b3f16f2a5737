//! Broker vocabulary recognized by the aggregation engine
//!
//! Action labels are matched exactly (case-sensitive).

/// Transaction actions counted as gross dividend income
pub const DIVIDEND_ACTIONS: &[&str] = &[
    "Qualified Dividend",
    "Cash Dividend",
    "Non-Qualified Div",
    "Special Dividend",
];

/// Transaction actions counted as tax withheld at source (negative amounts)
pub const TAX_ACTIONS: &[&str] = &["NRA Tax Adj", "Foreign Tax Paid"];

/// Realized gain/loss column names, most preferred first
pub const GAIN_LOSS_COLUMNS: &[&str] = &[
    "Gain/Loss ($)",
    "Total Transaction Gain/Loss ($)",
    "Total Transaction GainLoss",
    "GainLoss",
];

/// Realized export columns holding dollar amounts
pub const NUMERIC_COLUMNS: &[&str] = &[
    "Proceeds Per Share",
    "Cost Per Share",
    "Proceeds",
    "Cost Basis (CB)",
    "Gain/Loss ($)",
    "Long Term Gain/Loss",
    "Short Term Gain/Loss",
    "Unadjusted Cost Basis",
    "Disallowed Loss",
    "Transaction Cost Basis",
    "Total Transaction Gain/Loss ($)",
    "LT Transaction Gain/Loss ($)",
    "ST Transaction Gain/Loss ($)",
];

/// Category of a transaction row for dividend aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionClass {
    Dividend,
    ForeignTax,
    Other,
}

pub fn classify_action(action: &str) -> ActionClass {
    if DIVIDEND_ACTIONS.contains(&action) {
        ActionClass::Dividend
    } else if TAX_ACTIONS.contains(&action) {
        ActionClass::ForeignTax
    } else {
        ActionClass::Other
    }
}

/// First gain/loss column, by priority, present in `columns`
pub fn find_gain_loss_column<S: AsRef<str>>(columns: &[S]) -> Option<&'static str> {
    GAIN_LOSS_COLUMNS
        .iter()
        .copied()
        .find(|candidate| columns.iter().any(|c| c.as_ref() == *candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_is_exact_match() {
        assert_eq!(classify_action("Qualified Dividend"), ActionClass::Dividend);
        assert_eq!(classify_action("Foreign Tax Paid"), ActionClass::ForeignTax);
        assert_eq!(classify_action("qualified dividend"), ActionClass::Other);
        assert_eq!(classify_action("Buy"), ActionClass::Other);
        assert_eq!(classify_action(""), ActionClass::Other);
    }

    #[test]
    fn test_gain_loss_column_priority() {
        let columns = ["Symbol", "GainLoss", "Total Transaction Gain/Loss ($)"];
        assert_eq!(
            find_gain_loss_column(&columns),
            Some("Total Transaction Gain/Loss ($)")
        );

        let columns = ["Gain/Loss ($)", "GainLoss"];
        assert_eq!(find_gain_loss_column(&columns), Some("Gain/Loss ($)"));

        let columns = ["Symbol", "Proceeds"];
        assert_eq!(find_gain_loss_column(&columns), None);
    }
}
