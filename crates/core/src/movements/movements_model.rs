//! Movement domain models.
//!
//! A `Movement` is an immutable recorded financial event: a share trade, an
//! option trade, a dividend (or its withholding tax), or a cash transfer.
//! Movements are append-only facts; everything else in the engine is derived
//! from them and can be regenerated at any time.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{Result, ValidationError};

/// Kind of recorded financial event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Trade,
    OptionTrade,
    Dividend,
    DividendTax,
    CashTransfer,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Trade => "TRADE",
            MovementKind::OptionTrade => "OPTION_TRADE",
            MovementKind::Dividend => "DIVIDEND",
            MovementKind::DividendTax => "DIVIDEND_TAX",
            MovementKind::CashTransfer => "CASH_TRANSFER",
        }
    }
}

impl FromStr for MovementKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "TRADE" => Ok(MovementKind::Trade),
            "OPTION_TRADE" => Ok(MovementKind::OptionTrade),
            "DIVIDEND" => Ok(MovementKind::Dividend),
            "DIVIDEND_TAX" => Ok(MovementKind::DividendTax),
            "CASH_TRANSFER" => Ok(MovementKind::CashTransfer),
            other => Err(ValidationError::InvalidInput(format!(
                "Unknown movement kind: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a trade movement.
///
/// Plain `Buy`/`Sell` are used for share trades; the open/close variants are
/// used for option trades where the broker statement distinguishes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Buy,
    Sell,
    BuyToOpen,
    SellToOpen,
    BuyToClose,
    SellToClose,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
            TradeSide::BuyToOpen => "BUY_TO_OPEN",
            TradeSide::SellToOpen => "SELL_TO_OPEN",
            TradeSide::BuyToClose => "BUY_TO_CLOSE",
            TradeSide::SellToClose => "SELL_TO_CLOSE",
        }
    }

    /// True for all buy-side variants (cash leaves the account).
    pub fn is_buy(&self) -> bool {
        matches!(
            self,
            TradeSide::Buy | TradeSide::BuyToOpen | TradeSide::BuyToClose
        )
    }
}

impl FromStr for TradeSide {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(TradeSide::Buy),
            "SELL" => Ok(TradeSide::Sell),
            "BUY_TO_OPEN" => Ok(TradeSide::BuyToOpen),
            "SELL_TO_OPEN" => Ok(TradeSide::SellToOpen),
            "BUY_TO_CLOSE" => Ok(TradeSide::BuyToClose),
            "SELL_TO_CLOSE" => Ok(TradeSide::SellToClose),
            other => Err(ValidationError::InvalidInput(format!(
                "Unknown trade side: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable recorded financial event.
///
/// `gross_amount` is the total money amount of the event (quantity × unit
/// price for trades, the cash amount for dividends and transfers). For cash
/// transfers it is signed: positive for deposits, negative for withdrawals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: String,
    pub kind: MovementKind,
    pub account_id: String,
    /// None for pure cash movements (transfers).
    pub instrument_id: Option<String>,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub gross_amount: Option<Decimal>,
    #[serde(default)]
    pub commission: Option<Decimal>,
    #[serde(default)]
    pub fee: Option<Decimal>,
    #[serde(default)]
    pub side: Option<TradeSide>,
}

impl Movement {
    /// Calendar date of the movement.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.naive_utc().date()
    }

    /// Quantity, defaulting to zero if not set.
    pub fn qty(&self) -> Decimal {
        self.quantity.unwrap_or(Decimal::ZERO)
    }

    /// Gross amount, defaulting to zero if not set.
    pub fn gross(&self) -> Decimal {
        self.gross_amount.unwrap_or(Decimal::ZERO)
    }

    /// Commission, defaulting to zero if not set.
    pub fn commission_amt(&self) -> Decimal {
        self.commission.unwrap_or(Decimal::ZERO)
    }

    /// Fee, defaulting to zero if not set.
    pub fn fee_amt(&self) -> Decimal {
        self.fee.unwrap_or(Decimal::ZERO)
    }

    /// Commission plus fee.
    pub fn costs(&self) -> Decimal {
        self.commission_amt() + self.fee_amt()
    }

    /// True for share and option trades.
    pub fn is_trade(&self) -> bool {
        matches!(self.kind, MovementKind::Trade | MovementKind::OptionTrade)
    }

    /// Position delta of a trade movement: positive for buys, negative for
    /// sells. Zero for non-trade movements.
    pub fn signed_quantity(&self) -> Decimal {
        match self.side {
            Some(side) if self.is_trade() => {
                if side.is_buy() {
                    self.qty()
                } else {
                    -self.qty()
                }
            }
            _ => Decimal::ZERO,
        }
    }

    /// Net cash effect of this movement on the account: negative when cash
    /// leaves the account, positive when it arrives. Commissions and fees
    /// always reduce the inflow / increase the outflow.
    pub fn net_cash_flow(&self) -> Decimal {
        match self.kind {
            MovementKind::Trade | MovementKind::OptionTrade => match self.side {
                Some(side) if side.is_buy() => -(self.gross() + self.costs()),
                Some(_) => self.gross() - self.costs(),
                None => Decimal::ZERO,
            },
            MovementKind::Dividend => self.gross() - self.costs(),
            MovementKind::DividendTax => -self.gross().abs(),
            MovementKind::CashTransfer => self.gross() - self.costs(),
        }
    }

    /// Validates the movement before it enters the pipeline.
    ///
    /// Malformed movements are rejected here, never silently coerced.
    pub fn validate(&self) -> Result<()> {
        if self.account_id.is_empty() {
            return Err(ValidationError::MissingField("accountId".to_string()).into());
        }
        if self.currency.is_empty() {
            return Err(ValidationError::MissingField("currency".to_string()).into());
        }
        match self.kind {
            MovementKind::Trade | MovementKind::OptionTrade => {
                if self.instrument_id.as_deref().unwrap_or("").is_empty() {
                    return Err(ValidationError::MissingField("instrumentId".to_string()).into());
                }
                if self.side.is_none() {
                    return Err(ValidationError::MissingField("side".to_string()).into());
                }
                if self.qty() <= Decimal::ZERO {
                    return Err(ValidationError::InvalidInput(format!(
                        "Trade movement {} must have a positive quantity, got {}",
                        self.id,
                        self.qty()
                    ))
                    .into());
                }
                if self.gross() < Decimal::ZERO {
                    return Err(ValidationError::InvalidInput(format!(
                        "Trade movement {} must have a non-negative gross amount",
                        self.id
                    ))
                    .into());
                }
            }
            MovementKind::Dividend | MovementKind::DividendTax => {
                if self.instrument_id.as_deref().unwrap_or("").is_empty() {
                    return Err(ValidationError::MissingField("instrumentId".to_string()).into());
                }
                if self.quantity.is_some() {
                    return Err(ValidationError::InvalidInput(format!(
                        "Dividend movement {} must not carry a quantity",
                        self.id
                    ))
                    .into());
                }
            }
            MovementKind::CashTransfer => {
                if self.instrument_id.is_some() {
                    return Err(ValidationError::InvalidInput(format!(
                        "Cash transfer {} must not reference an instrument",
                        self.id
                    ))
                    .into());
                }
            }
        }
        if self.commission_amt() < Decimal::ZERO || self.fee_amt() < Decimal::ZERO {
            return Err(ValidationError::InvalidInput(format!(
                "Movement {} has negative commission or fee",
                self.id
            ))
            .into());
        }
        Ok(())
    }
}
