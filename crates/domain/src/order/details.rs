use inventory_store::{Money, Order, OrderItemFull};
use serde::Serialize;

/// A user's draft order together with its line items: the cart view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetails {
    pub order: Order,
    pub items: Vec<OrderItemFull>,
}

impl OrderDetails {
    /// Returns the total number of copies across all lines.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Recomputes the total from the line items.
    ///
    /// Equals `order.total_price` for any draft read in one consistent
    /// snapshot.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(OrderItemFull::line_total).sum()
    }
}
