use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::*;
use crate::errors::{CalculatorError, Error};
use crate::movements::{Movement, MovementKind, TradeSide};

const ACCOUNT: &str = "acct-1";
const INSTRUMENT: &str = "AAPL";
const CURRENCY: &str = "USD";

fn ts(y: i32, m: u32, d: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, hour, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
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
        currency: CURRENCY.to_string(),
        timestamp,
        quantity: Some(quantity),
        gross_amount: Some(gross),
        commission: None,
        fee: None,
        side: Some(side),
    }
}

fn dividend(id: &str, kind: MovementKind, gross: Decimal, timestamp: DateTime<Utc>) -> Movement {
    Movement {
        id: id.to_string(),
        kind,
        account_id: ACCOUNT.to_string(),
        instrument_id: Some(INSTRUMENT.to_string()),
        currency: CURRENCY.to_string(),
        timestamp,
        quantity: None,
        gross_amount: Some(gross),
        commission: None,
        fee: None,
        side: None,
    }
}

#[test]
fn test_first_appearance_share_buy() {
    let mut movement = trade(
        "m1",
        MovementKind::Trade,
        TradeSide::Buy,
        dec!(10),
        dec!(1000),
        ts(2025, 1, 6, 10),
    );
    movement.commission = Some(dec!(1));
    movement.fee = Some(dec!(0.5));

    let snapshot = first_appearance(
        ACCOUNT,
        INSTRUMENT,
        CURRENCY,
        &[movement],
        date(2025, 1, 6),
        None,
    )
    .unwrap();

    assert_eq!(snapshot.date, date(2025, 1, 6));
    assert_eq!(snapshot.figures.total_shares, dec!(10));
    assert_eq!(snapshot.figures.cost_basis, dec!(1001.5));
    assert_eq!(snapshot.figures.net_cash_flow, dec!(-1001.5));
    assert_eq!(snapshot.figures.commissions, dec!(1));
    assert_eq!(snapshot.figures.fees, dec!(0.5));
    assert_eq!(snapshot.figures.realized_gains, Decimal::ZERO);
    assert!(snapshot.figures.has_open_trades);
    assert_eq!(snapshot.open_lots.len(), 1);
}

#[test]
fn test_fifo_partial_sell_realizes_oldest_lots_first() {
    let buys = vec![
        trade(
            "b1",
            MovementKind::Trade,
            TradeSide::Buy,
            dec!(10),
            dec!(1000),
            ts(2025, 1, 6, 10),
        ),
        trade(
            "b2",
            MovementKind::Trade,
            TradeSide::Buy,
            dec!(10),
            dec!(1100),
            ts(2025, 1, 6, 11),
        ),
    ];
    let day1 = first_appearance(ACCOUNT, INSTRUMENT, CURRENCY, &buys, date(2025, 1, 6), None)
        .unwrap();

    let sell = trade(
        "s1",
        MovementKind::Trade,
        TradeSide::Sell,
        dec!(15),
        dec!(1800),
        ts(2025, 1, 7, 10),
    );
    let day2 = continue_from(&day1, &[sell], date(2025, 1, 7), None).unwrap();

    // 1800 proceeds against 10 @ 100 plus 5 @ 110.
    assert_eq!(day2.figures.realized_gains, dec!(250));
    assert_eq!(day2.figures.total_shares, dec!(5));
    assert_eq!(day2.figures.cost_basis, dec!(550));
    assert_eq!(day2.open_lots.len(), 1);
    assert_eq!(day2.open_lots[0].quantity, dec!(5));
}

#[test]
fn test_short_option_cycle_income_and_realized() {
    let open = trade(
        "o1",
        MovementKind::OptionTrade,
        TradeSide::SellToOpen,
        dec!(1),
        dec!(33.86),
        ts(2025, 3, 3, 14),
    );
    let day1 = first_appearance(ACCOUNT, INSTRUMENT, CURRENCY, &[open], date(2025, 3, 3), None)
        .unwrap();

    assert_eq!(day1.figures.options_income, dec!(33.86));
    assert_eq!(day1.figures.realized_gains, Decimal::ZERO);
    assert!(day1.figures.has_open_trades);

    let close = trade(
        "o2",
        MovementKind::OptionTrade,
        TradeSide::BuyToClose,
        dec!(1),
        dec!(17.13),
        ts(2025, 3, 4, 14),
    );
    let reopen = trade(
        "o3",
        MovementKind::OptionTrade,
        TradeSide::SellToOpen,
        dec!(1),
        dec!(15.86),
        ts(2025, 3, 4, 15),
    );
    let day2 = continue_from(&day1, &[close, reopen], date(2025, 3, 4), None).unwrap();

    assert_eq!(day2.figures.options_income, dec!(32.59));
    assert_eq!(day2.figures.realized_gains, dec!(16.73));
    assert!(day2.figures.has_open_trades);
    assert_eq!(day2.open_lots.len(), 1);
    assert_eq!(day2.open_lots[0].quantity, dec!(-1));
    assert_eq!(day2.open_lots[0].kind, LotKind::OptionContract);
}

#[test]
fn test_zero_crossing_opens_opposite_lot() {
    let buy = trade(
        "b1",
        MovementKind::Trade,
        TradeSide::Buy,
        dec!(5),
        dec!(500),
        ts(2025, 1, 6, 10),
    );
    let sell = trade(
        "s1",
        MovementKind::Trade,
        TradeSide::Sell,
        dec!(8),
        dec!(880),
        ts(2025, 1, 6, 11),
    );
    let snapshot = first_appearance(
        ACCOUNT,
        INSTRUMENT,
        CURRENCY,
        &[buy, sell],
        date(2025, 1, 6),
        None,
    )
    .unwrap();

    // 5 matched at 110 each against 100 cost, 3 remain short.
    assert_eq!(snapshot.figures.realized_gains, dec!(50));
    assert_eq!(snapshot.figures.total_shares, dec!(-3));
    assert_eq!(snapshot.open_lots.len(), 1);
    assert_eq!(snapshot.open_lots[0].quantity, dec!(-3));
    assert_eq!(snapshot.open_lots[0].cash_flow, dec!(330));
}

#[test]
fn test_zero_crossing_with_repeating_fraction_conserves_cash() {
    // Matching 3 of 7 units prorates by 3/7, which has no finite decimal
    // expansion. The reopened lot must carry the exact complement of the
    // closing flow or realized gains drift away from the cash total.
    let movements = vec![
        trade("s1", MovementKind::Trade, TradeSide::Sell, dec!(3), dec!(300), ts(2025, 1, 6, 10)),
        trade("b1", MovementKind::Trade, TradeSide::Buy, dec!(7), dec!(700), ts(2025, 1, 6, 11)),
        trade("s2", MovementKind::Trade, TradeSide::Sell, dec!(4), dec!(400), ts(2025, 1, 6, 12)),
    ];

    let snapshot = first_appearance(
        ACCOUNT,
        INSTRUMENT,
        CURRENCY,
        &movements,
        date(2025, 1, 6),
        None,
    )
    .unwrap();

    // Flat position, zero net cash: realized gains must be exactly zero.
    assert_eq!(snapshot.figures.net_cash_flow, Decimal::ZERO);
    assert_eq!(snapshot.figures.realized_gains, Decimal::ZERO);
    assert_eq!(snapshot.figures.total_shares, Decimal::ZERO);
    assert!(snapshot.open_lots.is_empty());
}

#[test]
fn test_carry_forward_preserves_cumulative_and_marks_to_market() {
    let buy = trade(
        "b1",
        MovementKind::Trade,
        TradeSide::Buy,
        dec!(10),
        dec!(1000),
        ts(2025, 1, 6, 10),
    );
    let day1 = first_appearance(ACCOUNT, INSTRUMENT, CURRENCY, &[buy], date(2025, 1, 6), None)
        .unwrap();

    let day2 = carry_forward(&day1, date(2025, 1, 7), Some(dec!(120)));

    assert_eq!(day2.date, date(2025, 1, 7));
    assert_eq!(day2.figures.total_shares, day1.figures.total_shares);
    assert_eq!(day2.figures.cost_basis, day1.figures.cost_basis);
    assert_eq!(day2.figures.net_cash_flow, day1.figures.net_cash_flow);
    // 10 shares marked at 120 against a 1000 cost.
    assert_eq!(day2.figures.unrealized_gains, dec!(200));
    assert_eq!(day2.figures.unrealized_pct, dec!(20));
}

#[test]
fn test_unrealized_skipped_without_price() {
    let buy = trade(
        "b1",
        MovementKind::Trade,
        TradeSide::Buy,
        dec!(10),
        dec!(1000),
        ts(2025, 1, 6, 10),
    );
    let snapshot = first_appearance(ACCOUNT, INSTRUMENT, CURRENCY, &[buy], date(2025, 1, 6), None)
        .unwrap();

    assert_eq!(snapshot.figures.unrealized_gains, Decimal::ZERO);
    assert_eq!(snapshot.figures.unrealized_pct, Decimal::ZERO);
}

#[test]
fn test_option_lots_not_marked_to_market() {
    let open = trade(
        "o1",
        MovementKind::OptionTrade,
        TradeSide::SellToOpen,
        dec!(2),
        dec!(100),
        ts(2025, 1, 6, 10),
    );
    let snapshot = first_appearance(
        ACCOUNT,
        INSTRUMENT,
        CURRENCY,
        &[open],
        date(2025, 1, 6),
        Some(dec!(55)),
    )
    .unwrap();

    assert_eq!(snapshot.figures.total_shares, Decimal::ZERO);
    assert_eq!(snapshot.figures.unrealized_gains, Decimal::ZERO);
    assert!(snapshot.figures.has_open_trades);
}

#[test]
fn test_dividend_and_withholding_tax() {
    let buy = trade(
        "b1",
        MovementKind::Trade,
        TradeSide::Buy,
        dec!(10),
        dec!(1000),
        ts(2025, 1, 6, 10),
    );
    let day1 = first_appearance(ACCOUNT, INSTRUMENT, CURRENCY, &[buy], date(2025, 1, 6), None)
        .unwrap();

    let div = dividend("d1", MovementKind::Dividend, dec!(25), ts(2025, 2, 3, 9));
    let tax = dividend("d2", MovementKind::DividendTax, dec!(3.75), ts(2025, 2, 3, 9));
    let day2 = continue_from(&day1, &[div, tax], date(2025, 2, 3), None).unwrap();

    assert_eq!(day2.figures.dividends_received, dec!(21.25));
    assert_eq!(day2.figures.net_cash_flow, dec!(-1000) + dec!(21.25));
}

#[test]
fn test_currency_mismatch_rejected() {
    let mut movement = trade(
        "m1",
        MovementKind::Trade,
        TradeSide::Buy,
        dec!(1),
        dec!(100),
        ts(2025, 1, 6, 10),
    );
    movement.currency = "EUR".to_string();

    let previous = CurrencySnapshot::baseline(ACCOUNT, INSTRUMENT, CURRENCY);
    let result = continue_from(&previous, &[movement], date(2025, 1, 6), None);

    assert!(matches!(
        result,
        Err(Error::Calculation(CalculatorError::CurrencyMismatch { .. }))
    ));
}

#[test]
fn test_update_existing_adopts_identity() {
    let mut existing = CurrencySnapshot::baseline(ACCOUNT, INSTRUMENT, CURRENCY);
    existing.parent_id = Some(42);

    let buy = trade(
        "b1",
        MovementKind::Trade,
        TradeSide::Buy,
        dec!(1),
        dec!(100),
        ts(2025, 1, 6, 10),
    );
    let recomputed =
        first_appearance(ACCOUNT, INSTRUMENT, CURRENCY, &[buy], date(2025, 1, 6), None).unwrap();
    assert_eq!(recomputed.parent_id, None);

    let updated = update_existing(&existing, recomputed);
    assert_eq!(updated.parent_id, Some(42));
    assert_eq!(updated.figures.total_shares, dec!(1));
}

#[test]
fn test_full_close_clears_lots() {
    let buy = trade(
        "b1",
        MovementKind::Trade,
        TradeSide::Buy,
        dec!(10),
        dec!(1000),
        ts(2025, 1, 6, 10),
    );
    let day1 = first_appearance(ACCOUNT, INSTRUMENT, CURRENCY, &[buy], date(2025, 1, 6), None)
        .unwrap();

    let sell = trade(
        "s1",
        MovementKind::Trade,
        TradeSide::Sell,
        dec!(10),
        dec!(1200),
        ts(2025, 1, 8, 10),
    );
    let day2 = continue_from(&day1, &[sell], date(2025, 1, 8), Some(dec!(999))).unwrap();

    assert_eq!(day2.figures.realized_gains, dec!(200));
    assert_eq!(day2.figures.total_shares, Decimal::ZERO);
    assert_eq!(day2.figures.cost_basis, Decimal::ZERO);
    assert_eq!(day2.figures.unrealized_gains, Decimal::ZERO);
    assert!(!day2.figures.has_open_trades);
    assert!(day2.open_lots.is_empty());
}
