//! Database model for operations.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use tradelens_core::constants::{DECIMAL_PRECISION, TIMESTAMP_FORMAT};
use tradelens_core::operations::Operation;

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::operations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct OperationDB {
    pub id: String,
    pub account_id: String,
    pub instrument_id: String,
    pub currency: String,
    pub is_open: bool,
    pub open_date: String,
    pub close_date: Option<String>,
    pub realized_total: String,
    pub realized_as_of_today: String,
    pub commissions: String,
    pub fees: String,
    pub premium_net: String,
    pub dividends: String,
    pub dividend_taxes: String,
    pub capital_deployed: String,
    pub capital_deployed_today: String,
    pub performance_pct: String,
}

fn parse_decimal(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap_or_default()
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::error!("Failed to parse DB operation date '{}': {}", value, e);
            Utc::now()
        })
}

impl From<OperationDB> for Operation {
    fn from(db: OperationDB) -> Self {
        Operation {
            id: db.id,
            account_id: db.account_id,
            instrument_id: db.instrument_id,
            currency: db.currency,
            is_open: db.is_open,
            open_date: parse_timestamp(&db.open_date),
            close_date: db.close_date.as_deref().map(parse_timestamp),
            realized_total: parse_decimal(&db.realized_total),
            realized_as_of_today: parse_decimal(&db.realized_as_of_today),
            commissions: parse_decimal(&db.commissions),
            fees: parse_decimal(&db.fees),
            premium_net: parse_decimal(&db.premium_net),
            dividends: parse_decimal(&db.dividends),
            dividend_taxes: parse_decimal(&db.dividend_taxes),
            capital_deployed: parse_decimal(&db.capital_deployed),
            capital_deployed_today: parse_decimal(&db.capital_deployed_today),
            performance_pct: parse_decimal(&db.performance_pct),
        }
    }
}

impl From<Operation> for OperationDB {
    fn from(domain: Operation) -> Self {
        let to_text = |d: Decimal| d.round_dp(DECIMAL_PRECISION).to_string();
        OperationDB {
            id: domain.id,
            account_id: domain.account_id,
            instrument_id: domain.instrument_id,
            currency: domain.currency,
            is_open: domain.is_open,
            open_date: domain.open_date.format(TIMESTAMP_FORMAT).to_string(),
            close_date: domain
                .close_date
                .map(|d| d.format(TIMESTAMP_FORMAT).to_string()),
            realized_total: to_text(domain.realized_total),
            realized_as_of_today: to_text(domain.realized_as_of_today),
            commissions: to_text(domain.commissions),
            fees: to_text(domain.fees),
            premium_net: to_text(domain.premium_net),
            dividends: to_text(domain.dividends),
            dividend_taxes: to_text(domain.dividend_taxes),
            capital_deployed: to_text(domain.capital_deployed),
            capital_deployed_today: to_text(domain.capital_deployed_today),
            performance_pct: to_text(domain.performance_pct),
        }
    }
}
