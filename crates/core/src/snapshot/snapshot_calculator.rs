//! Pure snapshot calculation - no I/O.
//!
//! Folds one date's movements onto the previous snapshot of the same
//! (instrument, currency) key. Four scenarios, selected by the batch
//! calculator per cell:
//!
//! - continuation: previous snapshot exists and movements exist;
//! - first appearance: movements exist but no previous snapshot;
//! - carry-forward: no movements, cumulative fields copied, only
//!   mark-to-market fields refreshed;
//! - update existing: forced recalculation replaces a persisted row's
//!   computed fields while preserving its identity.
//!
//! All arithmetic is exact decimal; floating point is forbidden here.

use chrono::{NaiveDate, Utc};
use log::warn;
use rust_decimal::Decimal;

use super::{is_quantity_significant, CurrencySnapshot, LotKind, OpenLot};
use crate::errors::{CalculatorError, Result};
use crate::movements::{Movement, MovementKind};

/// Scenario A: previous snapshot exists, movements occurred on `date`.
pub fn continue_from(
    previous: &CurrencySnapshot,
    movements: &[Movement],
    date: NaiveDate,
    mark_price: Option<Decimal>,
) -> Result<CurrencySnapshot> {
    let mut next = previous.clone();
    next.date = date;
    next.parent_id = None;
    next.calculated_at = Utc::now().naive_utc();

    for movement in movements {
        apply_movement(&mut next, movement)?;
    }

    refresh_derived(&mut next, mark_price);
    Ok(next)
}

/// Scenario B: first appearance of a key - computed from a zero baseline.
pub fn first_appearance(
    account_id: &str,
    instrument_id: &str,
    currency: &str,
    movements: &[Movement],
    date: NaiveDate,
    mark_price: Option<Decimal>,
) -> Result<CurrencySnapshot> {
    let baseline = CurrencySnapshot::baseline(account_id, instrument_id, currency);
    continue_from(&baseline, movements, date, mark_price)
}

/// Scenario C: no movements - cumulative fields carry forward unchanged,
/// only the mark-to-market fields are refreshed.
pub fn carry_forward(
    previous: &CurrencySnapshot,
    date: NaiveDate,
    mark_price: Option<Decimal>,
) -> CurrencySnapshot {
    let mut next = previous.clone();
    next.date = date;
    next.parent_id = None;
    next.calculated_at = Utc::now().naive_utc();
    refresh_derived(&mut next, mark_price);
    next
}

/// Scenario D: forced recalculation of an already persisted row. The
/// recomputed snapshot adopts the existing row's identity so child-row
/// references stay valid.
pub fn update_existing(existing: &CurrencySnapshot, mut recomputed: CurrencySnapshot) -> CurrencySnapshot {
    recomputed.parent_id = existing.parent_id;
    recomputed
}

/// Applies a single movement to the running state.
fn apply_movement(snapshot: &mut CurrencySnapshot, movement: &Movement) -> Result<()> {
    if movement.currency != snapshot.currency {
        return Err(CalculatorError::CurrencyMismatch {
            movement_id: movement.id.clone(),
            movement_currency: movement.currency.clone(),
            expected_currency: snapshot.currency.clone(),
        }
        .into());
    }

    let figures = &mut snapshot.figures;
    figures.commissions += movement.commission_amt();
    figures.fees += movement.fee_amt();
    figures.net_cash_flow += movement.net_cash_flow();

    match movement.kind {
        MovementKind::Trade => {
            apply_trade(snapshot, movement, LotKind::Share)?;
        }
        MovementKind::OptionTrade => {
            // Every option cash flow runs through options income, open or
            // close alike; realized P&L is booked on FIFO matches below.
            snapshot.figures.options_income += movement.net_cash_flow();
            apply_trade(snapshot, movement, LotKind::OptionContract)?;
        }
        MovementKind::Dividend => {
            snapshot.figures.dividends_received += movement.gross();
        }
        MovementKind::DividendTax => {
            snapshot.figures.dividends_received -= movement.gross().abs();
        }
        MovementKind::CashTransfer => {
            warn!(
                "Cash transfer {} reached an instrument snapshot cell. Ignored.",
                movement.id
            );
        }
    }
    Ok(())
}

/// FIFO trade application for one lot kind. Extending pushes a lot;
/// reducing matches the oldest lots of the same kind and books realized
/// P&L; crossing through zero opens the remainder in the new direction.
fn apply_trade(snapshot: &mut CurrencySnapshot, movement: &Movement, kind: LotKind) -> Result<()> {
    let delta = movement.signed_quantity();
    if delta.is_zero() {
        return Err(CalculatorError::InvalidMovement(format!(
            "Trade movement {} has no signed quantity",
            movement.id
        ))
        .into());
    }

    let open_qty: Decimal = snapshot
        .open_lots
        .iter()
        .filter(|l| l.kind == kind)
        .map(|l| l.quantity)
        .sum();

    let same_direction = open_qty.is_zero() || open_qty.is_sign_positive() == delta.is_sign_positive();
    if same_direction {
        push_lot(snapshot, movement, kind, delta, movement.net_cash_flow());
        return Ok(());
    }

    // Prorate the closing flow once; a zero-crossing remainder reopens with
    // the exact complement so the two portions always sum to the movement's
    // net cash flow.
    let matched = open_qty.abs().min(delta.abs());
    let fraction = matched / delta.abs();
    let total_flow = movement.net_cash_flow();
    let close_flow = total_flow * fraction;
    let open_flow = relieve_lots(snapshot, kind, matched);
    snapshot.figures.realized_gains += close_flow + open_flow;

    let remainder = delta.abs() - matched;
    if remainder > Decimal::ZERO {
        let signed = if delta.is_sign_positive() {
            remainder
        } else {
            -remainder
        };
        push_lot(snapshot, movement, kind, signed, total_flow - close_flow);
    }
    Ok(())
}

fn push_lot(
    snapshot: &mut CurrencySnapshot,
    movement: &Movement,
    kind: LotKind,
    signed_quantity: Decimal,
    cash_flow: Decimal,
) {
    snapshot.open_lots.push(OpenLot {
        kind,
        quantity: signed_quantity,
        cash_flow,
        opened: movement.date(),
    });
}

/// Relieves `matched` absolute quantity from the oldest lots of `kind`,
/// returning the signed open cash flow of the matched portions.
fn relieve_lots(snapshot: &mut CurrencySnapshot, kind: LotKind, matched: Decimal) -> Decimal {
    let mut to_match = matched;
    let mut open_flow = Decimal::ZERO;

    for lot in snapshot.open_lots.iter_mut().filter(|l| l.kind == kind) {
        if to_match <= Decimal::ZERO {
            break;
        }
        let available = lot.quantity.abs();
        if available.is_zero() {
            continue;
        }
        let take = available.min(to_match);
        // Full consumption moves the lot's whole remaining flow.
        let flow_portion = if take == available {
            lot.cash_flow
        } else {
            lot.cash_flow * take / available
        };
        open_flow += flow_portion;
        lot.cash_flow -= flow_portion;
        lot.quantity -= if lot.quantity.is_sign_positive() {
            take
        } else {
            -take
        };
        to_match -= take;
    }
    if to_match > Decimal::ZERO {
        warn!(
            "FIFO lots exhausted with {} unmatched quantity; history may be incomplete",
            to_match
        );
    }

    snapshot
        .open_lots
        .retain(|l| is_quantity_significant(&l.quantity));
    open_flow
}

/// Recomputes the fields derived from open lots and the mark price.
///
/// Unrealized gains apply only where an open share quantity exists; pure
/// option positions are never marked to market.
fn refresh_derived(snapshot: &mut CurrencySnapshot, mark_price: Option<Decimal>) {
    let figures = &mut snapshot.figures;

    figures.total_shares = snapshot
        .open_lots
        .iter()
        .filter(|l| l.kind == LotKind::Share)
        .map(|l| l.quantity)
        .sum();

    figures.cost_basis = snapshot
        .open_lots
        .iter()
        .filter(|l| l.kind == LotKind::Share && l.quantity.is_sign_positive())
        .map(|l| -l.cash_flow)
        .sum();

    figures.has_open_trades = !snapshot.open_lots.is_empty();

    figures.unrealized_gains = Decimal::ZERO;
    if is_quantity_significant(&figures.total_shares) {
        if let Some(price) = mark_price {
            figures.unrealized_gains = snapshot
                .open_lots
                .iter()
                .filter(|l| l.kind == LotKind::Share)
                .map(|l| l.quantity * price + l.cash_flow)
                .sum();
        }
    }

    figures.refresh_percentages();
}
