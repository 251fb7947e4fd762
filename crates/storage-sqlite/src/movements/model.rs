//! Database model for movements.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use tradelens_core::constants::{DECIMAL_PRECISION, TIMESTAMP_FORMAT};
use tradelens_core::movements::{Movement, MovementKind, TradeSide};

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::movements)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct MovementDB {
    pub id: String,
    pub account_id: String,
    pub kind: String,
    pub instrument_id: Option<String>,
    pub currency: String,
    pub event_timestamp: String,
    pub quantity: Option<String>,
    pub gross_amount: Option<String>,
    pub commission: Option<String>,
    pub fee: Option<String>,
    pub side: Option<String>,
}

fn parse_decimal(value: &Option<String>) -> Option<Decimal> {
    value.as_deref().and_then(|s| Decimal::from_str(s).ok())
}

impl From<MovementDB> for Movement {
    fn from(db: MovementDB) -> Self {
        Movement {
            id: db.id,
            kind: MovementKind::from_str(&db.kind).unwrap_or(MovementKind::Trade),
            account_id: db.account_id,
            instrument_id: db.instrument_id,
            currency: db.currency,
            timestamp: DateTime::parse_from_rfc3339(&db.event_timestamp)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|e| {
                    log::error!(
                        "Failed to parse DB event_timestamp '{}': {}",
                        db.event_timestamp,
                        e
                    );
                    Utc::now()
                }),
            quantity: parse_decimal(&db.quantity),
            gross_amount: parse_decimal(&db.gross_amount),
            commission: parse_decimal(&db.commission),
            fee: parse_decimal(&db.fee),
            side: db.side.as_deref().and_then(|s| TradeSide::from_str(s).ok()),
        }
    }
}

impl From<Movement> for MovementDB {
    fn from(domain: Movement) -> Self {
        MovementDB {
            id: domain.id,
            account_id: domain.account_id,
            kind: domain.kind.as_str().to_string(),
            instrument_id: domain.instrument_id,
            currency: domain.currency,
            event_timestamp: domain.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            quantity: domain
                .quantity
                .map(|d| d.round_dp(DECIMAL_PRECISION).to_string()),
            gross_amount: domain
                .gross_amount
                .map(|d| d.round_dp(DECIMAL_PRECISION).to_string()),
            commission: domain
                .commission
                .map(|d| d.round_dp(DECIMAL_PRECISION).to_string()),
            fee: domain.fee.map(|d| d.round_dp(DECIMAL_PRECISION).to_string()),
            side: domain.side.map(|s| s.as_str().to_string()),
        }
    }
}
