//! Operation domain model.
//!
//! An `Operation` is a derived open-to-close trading cycle for one
//! (account, instrument, currency): everything between a position opening
//! from flat and returning to flat. Operations are fully recomputable from
//! movement history and are regenerated wholesale whenever that history
//! changes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: String,
    pub account_id: String,
    pub instrument_id: String,
    pub currency: String,
    pub is_open: bool,
    pub open_date: DateTime<Utc>,
    pub close_date: Option<DateTime<Utc>>,
    /// Realized P&L over the whole life of the operation, including
    /// future-dated movements.
    pub realized_total: Decimal,
    /// Realized P&L counting only movements dated on or before today.
    pub realized_as_of_today: Decimal,
    pub commissions: Decimal,
    pub fees: Decimal,
    /// Net option premium collected (negative when premium was paid).
    pub premium_net: Decimal,
    pub dividends: Decimal,
    pub dividend_taxes: Decimal,
    /// Peak committed capital over the operation's life. Never reduced
    /// before closure, even through partial unwind/regrowth cycles.
    pub capital_deployed: Decimal,
    /// Peak committed capital counting only movements dated on or before
    /// today.
    pub capital_deployed_today: Decimal,
    pub performance_pct: Decimal,
}

impl Operation {
    pub(crate) fn open(
        account_id: &str,
        instrument_id: &str,
        currency: &str,
        open_date: DateTime<Utc>,
    ) -> Self {
        Operation {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            instrument_id: instrument_id.to_string(),
            currency: currency.to_string(),
            is_open: true,
            open_date,
            close_date: None,
            realized_total: Decimal::ZERO,
            realized_as_of_today: Decimal::ZERO,
            commissions: Decimal::ZERO,
            fees: Decimal::ZERO,
            premium_net: Decimal::ZERO,
            dividends: Decimal::ZERO,
            dividend_taxes: Decimal::ZERO,
            capital_deployed: Decimal::ZERO,
            capital_deployed_today: Decimal::ZERO,
            performance_pct: Decimal::ZERO,
        }
    }

    /// Recomputes `performance_pct` from realized P&L and peak capital.
    pub(crate) fn refresh_performance(&mut self) {
        self.performance_pct = if self.capital_deployed > Decimal::ZERO {
            Decimal::ONE_HUNDRED * self.realized_total / self.capital_deployed
        } else {
            Decimal::ZERO
        };
    }
}
