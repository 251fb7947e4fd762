//! FIFO pairing of opening and closing trades into Operations.
//!
//! The matcher replays the movement history of one (account, instrument,
//! currency) in timestamp order, maintaining a running signed open-quantity
//! counter and a FIFO queue of open contributions. Closing trades match
//! against the oldest unmatched contribution; realized P&L for the matched
//! portion is closing proceeds minus opening cost, both net of costs.

use chrono::{NaiveDate, Utc};
use log::{debug, warn};
use rust_decimal::Decimal;
use std::collections::VecDeque;

use super::Operation;
use crate::errors::{CalculatorError, Result};
use crate::movements::{Movement, MovementKind};

/// One unmatched opening contribution. `cash_flow` is the signed net cash
/// at open: negative for purchases, positive for premium received.
#[derive(Debug, Clone)]
struct OpenContribution {
    quantity: Decimal,
    cash_flow: Decimal,
}

pub struct OperationMatcher {
    today: NaiveDate,
}

impl Default for OperationMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationMatcher {
    pub fn new() -> Self {
        OperationMatcher {
            today: Utc::now().date_naive(),
        }
    }

    /// Fixes the reference date used for the `*_as_of_today` fields.
    pub fn with_today(today: NaiveDate) -> Self {
        OperationMatcher { today }
    }

    /// Produces the Operations for one (account, instrument, currency)
    /// movement history. The history may arrive unordered; it is replayed
    /// in timestamp order.
    pub fn match_movements(&self, movements: &[Movement]) -> Result<Vec<Operation>> {
        let mut ordered: Vec<&Movement> = movements.iter().collect();
        ordered.sort_by_key(|m| m.timestamp);

        let mut state = MatchState::default();

        for movement in ordered {
            match movement.kind {
                MovementKind::Trade | MovementKind::OptionTrade => {
                    self.apply_trade(movement, &mut state)?;
                }
                MovementKind::Dividend => {
                    let net = movement.gross() - movement.costs();
                    self.attach_income(&mut state, movement, |op| op.dividends += net);
                }
                MovementKind::DividendTax => {
                    let tax = movement.gross().abs();
                    self.attach_income(&mut state, movement, |op| op.dividend_taxes += tax);
                }
                MovementKind::CashTransfer => {
                    // Cash transfers never belong to an instrument cycle.
                }
            }
        }

        let mut operations = state.closed;
        if let Some(mut open) = state.current {
            open.refresh_performance();
            operations.push(open);
        }
        debug!(
            "Matched {} movements into {} operations",
            movements.len(),
            operations.len()
        );
        Ok(operations)
    }

    fn apply_trade(&self, movement: &Movement, state: &mut MatchState) -> Result<()> {
        let delta = movement.signed_quantity();
        if delta.is_zero() {
            warn!(
                "Trade movement {} has zero signed quantity. Skipped.",
                movement.id
            );
            return Ok(());
        }

        if let Some(current) = &state.current {
            if current.currency != movement.currency {
                return Err(CalculatorError::CurrencyMismatch {
                    movement_id: movement.id.clone(),
                    movement_currency: movement.currency.clone(),
                    expected_currency: current.currency.clone(),
                }
                .into());
            }
        }

        let same_direction = state.open_quantity.is_zero()
            || state.open_quantity.is_sign_positive() == delta.is_sign_positive();

        if same_direction {
            self.open_portion(
                movement,
                state,
                delta,
                movement.net_cash_flow(),
                movement.commission_amt(),
                movement.fee_amt(),
            );
            return Ok(());
        }

        // Closing trade: match FIFO up to the open quantity; any excess
        // crosses through zero and opens a new opposite-direction cycle.
        // The money amounts are prorated once and the reopened side takes
        // the exact complement, so the split conserves cash: two rounded
        // fractions of the same amount need not sum back to it.
        let matched = state.open_quantity.abs().min(delta.abs());
        let fraction = matched / delta.abs();
        let total_flow = movement.net_cash_flow();
        let close_flow = total_flow * fraction;
        let close_commission = movement.commission_amt() * fraction;
        let close_fee = movement.fee_amt() * fraction;
        self.close_portion(movement, state, matched, close_flow, close_commission, close_fee);

        let remainder = delta.abs() - matched;
        if remainder > Decimal::ZERO {
            let signed_remainder = if delta.is_sign_positive() {
                remainder
            } else {
                -remainder
            };
            self.open_portion(
                movement,
                state,
                signed_remainder,
                total_flow - close_flow,
                movement.commission_amt() - close_commission,
                movement.fee_amt() - close_fee,
            );
        }
        Ok(())
    }

    /// Applies the opening side of a trade with its already prorated money
    /// amounts, creating a new Operation when flat.
    fn open_portion(
        &self,
        movement: &Movement,
        state: &mut MatchState,
        signed_quantity: Decimal,
        cash_flow: Decimal,
        commission: Decimal,
        fee: Decimal,
    ) {
        let op = state.current.get_or_insert_with(|| {
            Operation::open(
                &movement.account_id,
                movement.instrument_id.as_deref().unwrap_or(""),
                &movement.currency,
                movement.timestamp,
            )
        });

        op.commissions += commission;
        op.fees += fee;
        if movement.kind == MovementKind::OptionTrade {
            op.premium_net += cash_flow;
        }

        state.fifo.push_back(OpenContribution {
            quantity: signed_quantity.abs(),
            cash_flow,
        });
        state.open_quantity += signed_quantity;

        // Capital deployed only ever ratchets up before closure.
        state.committed += cash_flow.abs();
        op.capital_deployed = op.capital_deployed.max(state.committed);
        if movement.date() <= self.today {
            state.committed_today += cash_flow.abs();
            op.capital_deployed_today = op.capital_deployed_today.max(state.committed_today);
        }
    }

    /// Applies the closing side of a trade (money amounts already prorated)
    /// against the FIFO queue and closes the current Operation if the
    /// position returns to flat.
    fn close_portion(
        &self,
        movement: &Movement,
        state: &mut MatchState,
        matched: Decimal,
        close_flow: Decimal,
        commission: Decimal,
        fee: Decimal,
    ) {
        let op = match state.current.as_mut() {
            Some(op) => op,
            None => {
                warn!(
                    "Closing movement {} arrived with no open operation. Skipped.",
                    movement.id
                );
                return;
            }
        };

        op.commissions += commission;
        op.fees += fee;
        if movement.kind == MovementKind::OptionTrade {
            op.premium_net += close_flow;
        }

        // Relieve the oldest contributions first. A fully consumed lot
        // surrenders its entire remaining cash flow, so nothing is lost to
        // prorating a lot against itself.
        let mut to_match = matched;
        let mut open_flow_matched = Decimal::ZERO;
        while to_match > Decimal::ZERO {
            let Some(front) = state.fifo.front_mut() else {
                warn!(
                    "FIFO queue exhausted while matching movement {}; history may be incomplete",
                    movement.id
                );
                break;
            };
            let take = front.quantity.min(to_match);
            let flow_portion = if take == front.quantity {
                front.cash_flow
            } else {
                front.cash_flow * take / front.quantity
            };
            open_flow_matched += flow_portion;
            front.quantity -= take;
            front.cash_flow -= flow_portion;
            to_match -= take;
            if front.quantity.is_zero() {
                state.fifo.pop_front();
            }
        }

        let realized = close_flow + open_flow_matched;
        op.realized_total += realized;
        if movement.date() <= self.today {
            op.realized_as_of_today += realized;
            state.committed_today -= open_flow_matched.abs();
        }
        state.committed -= open_flow_matched.abs();

        let signed_matched = if state.open_quantity.is_sign_positive() {
            -matched
        } else {
            matched
        };
        state.open_quantity += signed_matched;

        if state.open_quantity.is_zero() {
            let mut closed = state.current.take().expect("operation present while closing");
            closed.is_open = false;
            closed.close_date = Some(movement.timestamp);
            closed.refresh_performance();
            state.closed.push(closed);
            state.fifo.clear();
            state.committed = Decimal::ZERO;
            state.committed_today = Decimal::ZERO;
        }
    }

    /// Attaches dividend-type income to the open Operation, or to the most
    /// recently closed one when the position is already flat (ex-date
    /// payouts commonly settle after closure).
    fn attach_income<F>(&self, state: &mut MatchState, movement: &Movement, apply: F)
    where
        F: FnOnce(&mut Operation),
    {
        if let Some(op) = state.current.as_mut() {
            apply(op);
        } else if let Some(op) = state.closed.last_mut() {
            apply(op);
            op.refresh_performance();
        } else {
            warn!(
                "Income movement {} has no operation to attach to. Skipped.",
                movement.id
            );
        }
    }
}

#[derive(Default)]
struct MatchState {
    closed: Vec<Operation>,
    current: Option<Operation>,
    fifo: VecDeque<OpenContribution>,
    /// Signed open quantity: positive long, negative short.
    open_quantity: Decimal,
    /// Outstanding committed capital (sum of absolute open cash flows).
    committed: Decimal,
    committed_today: Decimal,
}
