//! Rows and read projections of the bookstore inventory tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BookId, Money, OrderId, OrderItemId, UserId};

/// Lifecycle status of an order.
///
/// ```text
/// (no order) ──► Draft ──► Paid
///                 ▲  │
///                 └──┘ add / remove items
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// In-progress cart; items can be added and removed.
    #[default]
    Draft,

    /// Checked out (terminal state).
    Paid,
}

impl OrderStatus {
    /// Returns true if items can be added or removed in this status.
    pub fn can_modify_items(&self) -> bool {
        matches!(self, OrderStatus::Draft)
    }

    /// Returns true if the order can be checked out in this status.
    pub fn can_checkout(&self) -> bool {
        matches!(self, OrderStatus::Draft)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid)
    }

    /// Returns the status as stored in the `orders.status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Paid => "paid",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(OrderStatus::Draft),
            "paid" => Ok(OrderStatus::Paid),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// A catalog book with its stock counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub price: Money,
    pub stock: u32,
}

impl Book {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        price: Money,
        stock: u32,
    ) -> Self {
        Self {
            id: BookId::new(),
            title: title.into(),
            author: author.into(),
            price,
            stock,
        }
    }
}

/// An order header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new empty draft order for a user.
    pub fn draft(user_id: UserId) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            status: OrderStatus::Draft,
            total_price: Money::zero(),
            created_at: Utc::now(),
        }
    }
}

/// A line item row. `price` is the unit price captured when the book was
/// first added to the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub book_id: BookId,
    pub quantity: u32,
    pub price: Money,
}

impl OrderItem {
    /// Returns `quantity × price`.
    pub fn line_total(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

/// One entry of an add-to-cart batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub book_id: BookId,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(book_id: BookId, quantity: u32) -> Self {
        Self { book_id, quantity }
    }
}

/// A draft line item joined with its book title, for the cart view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemFull {
    pub id: OrderItemId,
    pub book_id: BookId,
    pub title: String,
    pub quantity: u32,
    pub price: Money,
}

impl OrderItemFull {
    /// Returns `quantity × price`.
    pub fn line_total(&self) -> Money {
        self.price.multiply(self.quantity)
    }
}

/// A finalized order with its items, for the order history view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryOrder {
    pub id: OrderId,
    pub total_price: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<HistoryItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub book_id: BookId,
    pub title: String,
    pub quantity: u32,
    pub price: Money,
}
