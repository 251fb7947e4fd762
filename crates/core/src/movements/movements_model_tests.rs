use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;

use super::*;

fn ts(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, hour, 0, 0).unwrap()
}

fn base_trade(side: TradeSide) -> Movement {
    Movement {
        id: "m1".to_string(),
        kind: MovementKind::Trade,
        account_id: "acct-1".to_string(),
        instrument_id: Some("AAPL".to_string()),
        currency: "USD".to_string(),
        timestamp: ts(10),
        quantity: Some(dec!(10)),
        gross_amount: Some(dec!(1000)),
        commission: Some(dec!(1)),
        fee: Some(dec!(0.5)),
        side: Some(side),
    }
}

#[test]
fn test_kind_round_trips_through_strings() {
    for kind in [
        MovementKind::Trade,
        MovementKind::OptionTrade,
        MovementKind::Dividend,
        MovementKind::DividendTax,
        MovementKind::CashTransfer,
    ] {
        assert_eq!(MovementKind::from_str(kind.as_str()).unwrap(), kind);
    }
    assert!(MovementKind::from_str("SPLIT").is_err());
}

#[test]
fn test_side_round_trips_through_strings() {
    for side in [
        TradeSide::Buy,
        TradeSide::Sell,
        TradeSide::BuyToOpen,
        TradeSide::SellToOpen,
        TradeSide::BuyToClose,
        TradeSide::SellToClose,
    ] {
        assert_eq!(TradeSide::from_str(side.as_str()).unwrap(), side);
    }
}

#[test]
fn test_signed_quantity_follows_side() {
    assert_eq!(base_trade(TradeSide::Buy).signed_quantity(), dec!(10));
    assert_eq!(base_trade(TradeSide::BuyToClose).signed_quantity(), dec!(10));
    assert_eq!(base_trade(TradeSide::Sell).signed_quantity(), dec!(-10));
    assert_eq!(base_trade(TradeSide::SellToOpen).signed_quantity(), dec!(-10));
}

#[test]
fn test_net_cash_flow_nets_costs() {
    // Buys: gross plus costs leave the account.
    assert_eq!(base_trade(TradeSide::Buy).net_cash_flow(), dec!(-1001.5));
    // Sells: costs reduce the proceeds.
    assert_eq!(base_trade(TradeSide::Sell).net_cash_flow(), dec!(998.5));
}

#[test]
fn test_net_cash_flow_for_income_and_transfers() {
    let dividend = Movement {
        kind: MovementKind::Dividend,
        quantity: None,
        gross_amount: Some(dec!(25)),
        commission: None,
        fee: None,
        side: None,
        ..base_trade(TradeSide::Buy)
    };
    assert_eq!(dividend.net_cash_flow(), dec!(25));

    let tax = Movement {
        kind: MovementKind::DividendTax,
        gross_amount: Some(dec!(3.75)),
        ..dividend.clone()
    };
    assert_eq!(tax.net_cash_flow(), dec!(-3.75));

    let withdrawal = Movement {
        kind: MovementKind::CashTransfer,
        instrument_id: None,
        gross_amount: Some(dec!(-500)),
        ..dividend
    };
    assert_eq!(withdrawal.net_cash_flow(), dec!(-500));
}

#[test]
fn test_validate_accepts_well_formed_trade() {
    assert!(base_trade(TradeSide::Buy).validate().is_ok());
}

#[test]
fn test_validate_rejects_malformed_movements() {
    let mut no_account = base_trade(TradeSide::Buy);
    no_account.account_id = String::new();
    assert!(no_account.validate().is_err());

    let mut no_side = base_trade(TradeSide::Buy);
    no_side.side = None;
    assert!(no_side.validate().is_err());

    let mut zero_quantity = base_trade(TradeSide::Buy);
    zero_quantity.quantity = Some(Decimal::ZERO);
    assert!(zero_quantity.validate().is_err());

    let mut negative_fee = base_trade(TradeSide::Buy);
    negative_fee.fee = Some(dec!(-1));
    assert!(negative_fee.validate().is_err());

    let mut dividend_with_quantity = base_trade(TradeSide::Buy);
    dividend_with_quantity.kind = MovementKind::Dividend;
    dividend_with_quantity.side = None;
    assert!(dividend_with_quantity.validate().is_err());

    let mut transfer_with_instrument = base_trade(TradeSide::Buy);
    transfer_with_instrument.kind = MovementKind::CashTransfer;
    transfer_with_instrument.side = None;
    transfer_with_instrument.quantity = None;
    assert!(transfer_with_instrument.validate().is_err());
}

#[test]
fn test_grouping_splits_cash_and_sorts_within_day() {
    let later = Movement {
        id: "m2".to_string(),
        timestamp: ts(15),
        ..base_trade(TradeSide::Sell)
    };
    let earlier = base_trade(TradeSide::Buy);
    let transfer = Movement {
        id: "m3".to_string(),
        kind: MovementKind::CashTransfer,
        instrument_id: None,
        quantity: None,
        gross_amount: Some(dec!(5000)),
        commission: None,
        fee: None,
        side: None,
        ..base_trade(TradeSide::Buy)
    };

    let (grouped, cash) = group_by_key_and_date(vec![later, transfer, earlier]);

    assert_eq!(grouped.len(), 1);
    let key = MovementKey {
        instrument_id: "AAPL".to_string(),
        currency: "USD".to_string(),
    };
    let day = &grouped[&key][&ts(10).date_naive()];
    assert_eq!(day.len(), 2);
    assert_eq!(day[0].id, "m1");
    assert_eq!(day[1].id, "m2");

    assert_eq!(cash["USD"][&ts(10).date_naive()].len(), 1);
}
