//! Per-symbol order book
//!
//! Bid and ask sides are price-level maps; a lookup index maps order ids to
//! their side and price so cancels avoid scanning the book. Matching walks
//! the opposite side best-price-first, filling FIFO within each level, and
//! assigns trade ids from a per-book monotonic counter.
//!
//! The book carries no locks of its own: the order manager serializes all
//! mutation behind its lifecycle mutex.

pub mod ask_book;
pub mod bid_book;
pub mod price_level;

pub use ask_book::AskBook;
pub use bid_book::BidBook;
pub use price_level::{PriceLevel, Reduction};

use std::collections::HashMap;

use thiserror::Error;
use tracing::warn;

use types::{fixed, Order, OrderType, Side, Trade};

/// Book-level failures. Matching itself never fails; these cover mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error("invalid order {order_id}: {reason}")]
    InvalidOrder { order_id: u64, reason: &'static str },

    #[error("order {0} already present in book")]
    DuplicateOrder(u64),

    #[error("order {0} not found in book")]
    UnknownOrder(u64),

    #[error("failed to restore order {0} while rolling back a modify")]
    RollbackFailed(u64),
}

/// Outcome of a partial cancel.
#[derive(Debug, Clone, PartialEq)]
pub enum PartialCancel {
    /// Reduction consumed the whole remaining size; the order left the book.
    Canceled(Order),
    /// The order shrank in place, keeping its time priority.
    Reduced(Order),
}

#[derive(Debug, Clone, Copy)]
struct OrderLocator {
    side: Side,
    price_ticks: i64,
}

/// Limit order book for a single instrument.
#[derive(Debug)]
pub struct OrderBook {
    symbol: String,
    bids: BidBook,
    asks: AskBook,
    lookup: HashMap<u64, OrderLocator>,
    next_trade_id: u64,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BidBook::new(),
            asks: AskBook::new(),
            lookup: HashMap::new(),
            next_trade_id: 1,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Rest an order on its own side and record its locator.
    pub fn add_order(&mut self, order: Order) -> Result<(), BookError> {
        validate_for_book(&order)?;
        if self.lookup.contains_key(&order.order_id) {
            return Err(BookError::DuplicateOrder(order.order_id));
        }

        let locator = OrderLocator {
            side: order.side,
            price_ticks: order.price_ticks,
        };
        match order.side {
            Side::Buy => self.bids.insert(order.clone()),
            Side::Sell => self.asks.insert(order.clone()),
        }
        self.lookup.insert(order.order_id, locator);
        Ok(())
    }

    /// Remove a resting order, returning it. `None` for unknown ids.
    pub fn cancel_order(&mut self, order_id: u64) -> Option<Order> {
        let locator = self.lookup.remove(&order_id)?;
        let removed = match locator.side {
            Side::Buy => self.bids.remove(order_id, locator.price_ticks),
            Side::Sell => self.asks.remove(order_id, locator.price_ticks),
        };
        if removed.is_none() {
            // Index said the order existed but the level disagreed; the index
            // entry was already dropped above, so just report the miss.
            warn!(order_id, symbol = self.symbol.as_str(), "dangling order locator");
        }
        removed
    }

    /// Reduce a resting order by `reduce_lots`. Reducing by the full
    /// remaining size behaves exactly like `cancel_order`; anything less
    /// decrements in place and preserves time priority.
    pub fn cancel_order_partial(&mut self, order_id: u64, reduce_lots: i64) -> Option<PartialCancel> {
        if reduce_lots <= 0 {
            return None;
        }
        let locator = *self.lookup.get(&order_id)?;
        let level = match locator.side {
            Side::Buy => self.bids.level_mut(locator.price_ticks)?,
            Side::Sell => self.asks.level_mut(locator.price_ticks)?,
        };

        match level.reduce(order_id, reduce_lots)? {
            Reduction::Removed(order) => {
                let emptied = level.is_empty();
                if emptied {
                    match locator.side {
                        Side::Buy => self.bids.remove_level(locator.price_ticks),
                        Side::Sell => self.asks.remove_level(locator.price_ticks),
                    }
                }
                self.lookup.remove(&order_id);
                Some(PartialCancel::Canceled(order))
            }
            Reduction::Reduced(order) => Some(PartialCancel::Reduced(order)),
        }
    }

    /// Cancel + re-add under the original order id. On a failed re-add the
    /// original order is restored (at the tail of its level) and the error is
    /// reported. A successful modify forfeits time priority.
    pub fn modify_order(&mut self, order_id: u64, mut replacement: Order) -> Result<(), BookError> {
        replacement.order_id = order_id;
        let original = self
            .cancel_order(order_id)
            .ok_or(BookError::UnknownOrder(order_id))?;

        if let Err(err) = self.add_order(replacement) {
            if self.add_order(original).is_err() {
                return Err(BookError::RollbackFailed(order_id));
            }
            return Err(err);
        }
        Ok(())
    }

    /// Match an incoming order against the opposite side.
    ///
    /// Fills happen at the maker's price, FIFO within each level, best level
    /// first; exhausted makers and emptied levels are pruned as matching
    /// proceeds. A limit residual rests on its own side; market residuals are
    /// the caller's to release. Stop orders do not participate in matching.
    pub fn match_order(&mut self, incoming: &Order) -> Vec<Trade> {
        let mut trades = Vec::new();
        if incoming.quantity_lots <= 0 || incoming.order_type == OrderType::Stop {
            return trades;
        }

        let remaining = match incoming.side {
            Side::Buy => self.match_against_asks(incoming, &mut trades),
            Side::Sell => self.match_against_bids(incoming, &mut trades),
        };

        if remaining > 0 && incoming.order_type == OrderType::Limit {
            let mut residual = incoming.clone();
            residual.quantity_lots = remaining;
            residual.quantity = fixed::from_quantity_lots(remaining);
            if let Err(err) = self.add_order(residual) {
                warn!(
                    order_id = incoming.order_id,
                    symbol = self.symbol.as_str(),
                    %err,
                    "failed to rest limit residual"
                );
            }
        }

        trades
    }

    fn match_against_asks(&mut self, incoming: &Order, trades: &mut Vec<Trade>) -> i64 {
        let mut remaining = incoming.quantity_lots;
        while remaining > 0 {
            let Some(level_price) = self.asks.best_price() else {
                break;
            };
            if incoming.order_type == OrderType::Limit && level_price > incoming.price_ticks {
                break;
            }

            let level = self.asks.level_mut(level_price).expect("best level present");
            while remaining > 0 {
                let Some(maker) = level.front() else {
                    break;
                };
                let fill = remaining.min(maker.quantity_lots);
                trades.push(Trade {
                    trade_id: self.next_trade_id,
                    maker_order_id: maker.order_id,
                    taker_order_id: incoming.order_id,
                    timestamp_ns: incoming.timestamp_ns,
                    price_ticks: level_price,
                    quantity_lots: fill,
                    side: incoming.side,
                });
                self.next_trade_id += 1;
                remaining -= fill;

                let (maker_id, exhausted) = level.fill_front(fill).expect("front present");
                if exhausted {
                    self.lookup.remove(&maker_id);
                }
            }

            let emptied = level.is_empty();
            if emptied {
                self.asks.remove_level(level_price);
            }
        }
        remaining
    }

    fn match_against_bids(&mut self, incoming: &Order, trades: &mut Vec<Trade>) -> i64 {
        let mut remaining = incoming.quantity_lots;
        while remaining > 0 {
            let Some(level_price) = self.bids.best_price() else {
                break;
            };
            if incoming.order_type == OrderType::Limit && level_price < incoming.price_ticks {
                break;
            }

            let level = self.bids.level_mut(level_price).expect("best level present");
            while remaining > 0 {
                let Some(maker) = level.front() else {
                    break;
                };
                let fill = remaining.min(maker.quantity_lots);
                trades.push(Trade {
                    trade_id: self.next_trade_id,
                    maker_order_id: maker.order_id,
                    taker_order_id: incoming.order_id,
                    timestamp_ns: incoming.timestamp_ns,
                    price_ticks: level_price,
                    quantity_lots: fill,
                    side: incoming.side,
                });
                self.next_trade_id += 1;
                remaining -= fill;

                let (maker_id, exhausted) = level.fill_front(fill).expect("front present");
                if exhausted {
                    self.lookup.remove(&maker_id);
                }
            }

            let emptied = level.is_empty();
            if emptied {
                self.bids.remove_level(level_price);
            }
        }
        remaining
    }

    /// Best bid in ticks.
    pub fn best_bid(&self) -> Option<i64> {
        self.bids.best_price()
    }

    /// Best ask in ticks.
    pub fn best_ask(&self) -> Option<i64> {
        self.asks.best_price()
    }

    /// Best ask minus best bid, when both sides are populated.
    pub fn spread(&self) -> Option<i64> {
        Some(self.best_ask()? - self.best_bid()?)
    }

    /// Volume-weighted average price in ticks for consuming `quantity_lots`.
    ///
    /// A buy walks the asks, a sell walks the bids. `None` when the opposite
    /// side is too shallow to fill the requested size.
    pub fn vwap(&self, side: Side, quantity_lots: i64) -> Option<i64> {
        if quantity_lots <= 0 {
            return None;
        }

        let mut remaining = quantity_lots;
        let mut notional: i128 = 0;

        let levels: Box<dyn Iterator<Item = (i64, &PriceLevel)>> = match side {
            Side::Buy => Box::new(self.asks.iter_priority()),
            Side::Sell => Box::new(self.bids.iter_priority()),
        };
        for (price_ticks, level) in levels {
            let take = remaining.min(level.total_lots());
            notional += price_ticks as i128 * take as i128;
            remaining -= take;
            if remaining == 0 {
                break;
            }
        }

        if remaining > 0 {
            return None;
        }
        Some((notional / quantity_lots as i128) as i64)
    }

    /// Look up a resting order by id.
    pub fn get_order(&self, order_id: u64) -> Option<&Order> {
        let locator = self.lookup.get(&order_id)?;
        match locator.side {
            Side::Buy => self.bids.level(locator.price_ticks)?.get(order_id),
            Side::Sell => self.asks.level(locator.price_ticks)?.get(order_id),
        }
    }

    /// Number of resting orders across both sides.
    pub fn order_count(&self) -> usize {
        self.lookup.len()
    }
}

fn validate_for_book(order: &Order) -> Result<(), BookError> {
    let reject = |reason| {
        Err(BookError::InvalidOrder {
            order_id: order.order_id,
            reason,
        })
    };
    if order.order_id == 0 {
        return reject("order id must be nonzero");
    }
    if order.quantity_lots <= 0 {
        return reject("quantity must be positive");
    }
    if order.order_type == OrderType::Limit && order.price_ticks <= 0 {
        return reject("limit price must be positive");
    }
    if order.order_type != OrderType::Limit && order.price_ticks < 0 {
        return reject("price must not be negative");
    }
    Ok(())
}
