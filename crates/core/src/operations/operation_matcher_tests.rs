use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::*;
use crate::movements::{Movement, MovementKind, TradeSide};

const ACCOUNT: &str = "acct-1";
const INSTRUMENT: &str = "AAPL  250321C00150000";

fn ts(y: i32, m: u32, d: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, hour, 0, 0).unwrap()
}

fn trade(
    id: &str,
    kind: MovementKind,
    side: TradeSide,
    quantity: Decimal,
    gross: Decimal,
    timestamp: DateTime<Utc>,
) -> Movement {
    Movement {
        id: id.to_string(),
        kind,
        account_id: ACCOUNT.to_string(),
        instrument_id: Some(INSTRUMENT.to_string()),
        currency: "USD".to_string(),
        timestamp,
        quantity: Some(quantity),
        gross_amount: Some(gross),
        commission: None,
        fee: None,
        side: Some(side),
    }
}

fn option_trade(id: &str, side: TradeSide, gross: Decimal, timestamp: DateTime<Utc>) -> Movement {
    trade(id, MovementKind::OptionTrade, side, dec!(1), gross, timestamp)
}

#[test]
fn test_short_option_open_stays_open() {
    let matcher = OperationMatcher::new();
    let open = option_trade("o1", TradeSide::SellToOpen, dec!(33.86), ts(2025, 3, 3, 14));

    let operations = matcher.match_movements(&[open]).unwrap();

    assert_eq!(operations.len(), 1);
    let op = &operations[0];
    assert!(op.is_open);
    assert_eq!(op.premium_net, dec!(33.86));
    assert_eq!(op.realized_total, Decimal::ZERO);
    assert_eq!(op.capital_deployed, dec!(33.86));
    assert_eq!(op.close_date, None);
}

#[test]
fn test_close_and_reopen_produces_two_operations() {
    let matcher = OperationMatcher::new();
    let movements = vec![
        option_trade("o1", TradeSide::SellToOpen, dec!(33.86), ts(2025, 3, 3, 14)),
        option_trade("o2", TradeSide::BuyToClose, dec!(17.13), ts(2025, 3, 4, 14)),
        option_trade("o3", TradeSide::SellToOpen, dec!(15.86), ts(2025, 3, 4, 15)),
    ];

    let operations = matcher.match_movements(&movements).unwrap();

    assert_eq!(operations.len(), 2);
    let closed = &operations[0];
    assert!(!closed.is_open);
    assert_eq!(closed.realized_total, dec!(16.73));
    assert_eq!(closed.premium_net, dec!(33.86) - dec!(17.13));
    assert_eq!(closed.close_date, Some(ts(2025, 3, 4, 14)));

    let reopened = &operations[1];
    assert!(reopened.is_open);
    assert_eq!(reopened.premium_net, dec!(15.86));
    assert_eq!(reopened.open_date, ts(2025, 3, 4, 15));
    assert_eq!(reopened.realized_total, Decimal::ZERO);
}

#[test]
fn test_fifo_matches_oldest_contribution_first() {
    let matcher = OperationMatcher::new();
    let movements = vec![
        trade("b1", MovementKind::Trade, TradeSide::Buy, dec!(10), dec!(1000), ts(2025, 1, 6, 10)),
        trade("b2", MovementKind::Trade, TradeSide::Buy, dec!(10), dec!(1100), ts(2025, 1, 7, 10)),
        trade("s1", MovementKind::Trade, TradeSide::Sell, dec!(15), dec!(1800), ts(2025, 1, 8, 10)),
    ];

    let operations = matcher.match_movements(&movements).unwrap();

    assert_eq!(operations.len(), 1);
    let op = &operations[0];
    assert!(op.is_open);
    // 1800 proceeds against 10 @ 100 plus 5 @ 110.
    assert_eq!(op.realized_total, dec!(250));
    assert_eq!(op.capital_deployed, dec!(2100));
}

#[test]
fn test_zero_crossing_splits_into_two_operations() {
    let matcher = OperationMatcher::new();
    let movements = vec![
        trade("b1", MovementKind::Trade, TradeSide::Buy, dec!(5), dec!(500), ts(2025, 1, 6, 10)),
        trade("s1", MovementKind::Trade, TradeSide::Sell, dec!(8), dec!(880), ts(2025, 1, 6, 11)),
    ];

    let operations = matcher.match_movements(&movements).unwrap();

    assert_eq!(operations.len(), 2);
    let closed = &operations[0];
    assert!(!closed.is_open);
    assert_eq!(closed.realized_total, dec!(50));
    // Both halves of the crossing trade carry the same timestamp.
    assert_eq!(closed.close_date, Some(ts(2025, 1, 6, 11)));

    let short = &operations[1];
    assert!(short.is_open);
    assert_eq!(short.open_date, ts(2025, 1, 6, 11));
    assert_eq!(short.realized_total, Decimal::ZERO);
    assert_eq!(short.capital_deployed, dec!(330));
}

#[test]
fn test_zero_crossing_with_repeating_fraction_conserves_cash() {
    // The buy crosses zero matching 3 of 7 units; 3/7 has no finite
    // decimal expansion, so the split only balances if the reopened side
    // takes the exact complement of the prorated closing flow.
    let matcher = OperationMatcher::new();
    let movements = vec![
        trade("s1", MovementKind::Trade, TradeSide::Sell, dec!(3), dec!(300), ts(2025, 1, 6, 10)),
        trade("b1", MovementKind::Trade, TradeSide::Buy, dec!(7), dec!(700), ts(2025, 1, 7, 10)),
        trade("s2", MovementKind::Trade, TradeSide::Sell, dec!(4), dec!(400), ts(2025, 1, 8, 10)),
    ];

    let operations = matcher.match_movements(&movements).unwrap();

    assert_eq!(operations.len(), 2);
    assert!(operations.iter().all(|op| !op.is_open));
    // Position ends flat with zero total cash moved, so realized P&L
    // across the two cycles must be exactly zero.
    let total_realized: Decimal = operations.iter().map(|op| op.realized_total).sum();
    assert_eq!(total_realized, Decimal::ZERO);
}

#[test]
fn test_unordered_input_is_replayed_by_timestamp() {
    let matcher = OperationMatcher::new();
    let movements = vec![
        trade("s1", MovementKind::Trade, TradeSide::Sell, dec!(10), dec!(1200), ts(2025, 1, 8, 10)),
        trade("b1", MovementKind::Trade, TradeSide::Buy, dec!(10), dec!(1000), ts(2025, 1, 6, 10)),
    ];

    let operations = matcher.match_movements(&movements).unwrap();

    assert_eq!(operations.len(), 1);
    assert!(!operations[0].is_open);
    assert_eq!(operations[0].realized_total, dec!(200));
}

#[test]
fn test_dividends_attach_to_current_then_last_closed() {
    let matcher = OperationMatcher::new();
    let dividend = Movement {
        id: "d1".to_string(),
        kind: MovementKind::Dividend,
        account_id: ACCOUNT.to_string(),
        instrument_id: Some(INSTRUMENT.to_string()),
        currency: "USD".to_string(),
        timestamp: ts(2025, 1, 7, 9),
        quantity: None,
        gross_amount: Some(dec!(25)),
        commission: None,
        fee: None,
        side: None,
    };

    // While open: attaches to the running operation.
    let open_case = vec![
        trade("b1", MovementKind::Trade, TradeSide::Buy, dec!(10), dec!(1000), ts(2025, 1, 6, 10)),
        dividend.clone(),
    ];
    let operations = matcher.match_movements(&open_case).unwrap();
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0].dividends, dec!(25));

    // After closure: ex-date payouts land on the closed operation.
    let mut late_dividend = dividend;
    late_dividend.timestamp = ts(2025, 1, 9, 9);
    let closed_case = vec![
        trade("b1", MovementKind::Trade, TradeSide::Buy, dec!(10), dec!(1000), ts(2025, 1, 6, 10)),
        trade("s1", MovementKind::Trade, TradeSide::Sell, dec!(10), dec!(1200), ts(2025, 1, 8, 10)),
        late_dividend,
    ];
    let operations = matcher.match_movements(&closed_case).unwrap();
    assert_eq!(operations.len(), 1);
    assert!(!operations[0].is_open);
    assert_eq!(operations[0].dividends, dec!(25));
}

#[test]
fn test_as_of_today_excludes_future_movements() {
    let matcher = OperationMatcher::with_today(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
    let movements = vec![
        option_trade("o1", TradeSide::SellToOpen, dec!(33.86), ts(2025, 3, 3, 14)),
        option_trade("o2", TradeSide::BuyToClose, dec!(17.13), ts(2025, 3, 4, 14)),
    ];

    let operations = matcher.match_movements(&movements).unwrap();

    assert_eq!(operations.len(), 1);
    let op = &operations[0];
    assert_eq!(op.realized_total, dec!(16.73));
    assert_eq!(op.realized_as_of_today, Decimal::ZERO);
    assert_eq!(op.capital_deployed, dec!(33.86));
    assert_eq!(op.capital_deployed_today, dec!(33.86));
}

#[test]
fn test_capital_deployed_ratchets_through_partial_unwind() {
    let matcher = OperationMatcher::new();
    let movements = vec![
        trade("b1", MovementKind::Trade, TradeSide::Buy, dec!(10), dec!(1000), ts(2025, 1, 6, 10)),
        trade("s1", MovementKind::Trade, TradeSide::Sell, dec!(5), dec!(600), ts(2025, 1, 7, 10)),
        trade("b2", MovementKind::Trade, TradeSide::Buy, dec!(5), dec!(550), ts(2025, 1, 8, 10)),
    ];

    let operations = matcher.match_movements(&movements).unwrap();

    assert_eq!(operations.len(), 1);
    // 1000 committed, 500 released by the partial sale, 550 re-committed.
    assert_eq!(operations[0].capital_deployed, dec!(1050));
}

#[test]
fn test_commissions_and_fees_accumulate() {
    let matcher = OperationMatcher::new();
    let mut buy =
        trade("b1", MovementKind::Trade, TradeSide::Buy, dec!(10), dec!(1000), ts(2025, 1, 6, 10));
    buy.commission = Some(dec!(1));
    buy.fee = Some(dec!(0.5));
    let mut sell =
        trade("s1", MovementKind::Trade, TradeSide::Sell, dec!(10), dec!(1200), ts(2025, 1, 8, 10));
    sell.commission = Some(dec!(1));

    let operations = matcher.match_movements(&[buy, sell]).unwrap();

    assert_eq!(operations.len(), 1);
    let op = &operations[0];
    assert_eq!(op.commissions, dec!(2));
    assert_eq!(op.fees, dec!(0.5));
    // Realized nets all costs: 1199 proceeds against 1001.5 cost.
    assert_eq!(op.realized_total, dec!(197.5));
}

#[test]
fn test_currency_mismatch_rejected() {
    let matcher = OperationMatcher::new();
    let open =
        trade("b1", MovementKind::Trade, TradeSide::Buy, dec!(10), dec!(1000), ts(2025, 1, 6, 10));
    let mut foreign =
        trade("b2", MovementKind::Trade, TradeSide::Buy, dec!(10), dec!(1000), ts(2025, 1, 7, 10));
    foreign.currency = "EUR".to_string();

    assert!(matcher.match_movements(&[open, foreign]).is_err());
}
