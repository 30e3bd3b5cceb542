//! Write events that make cached reads stale.

use std::fmt;

use uuid::Uuid;

/// A committed write, described by the entity family it touched.
///
/// Ids are optional: a mutation without ids still clears the family's
/// namespace, which covers every per-entity entry as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// A booking was created, updated, re-statused or deleted.
    Booking {
        booking_id: Option<Uuid>,
        customer_id: Option<Uuid>,
        vehicle_id: Option<Uuid>,
    },
    /// A vehicle was created, updated or deleted.
    Vehicle { vehicle_id: Option<Uuid> },
    /// A customer record changed.
    Customer { customer_id: Option<Uuid> },
    /// Per-user dashboard data changed (preferences, pinned widgets).
    Dashboard { user_id: Option<String> },
    /// Invoices, payments or payouts changed.
    Financial,
    /// A recurring or one-off expense changed.
    Expense { expense_id: Option<Uuid> },
    /// A maintenance plan was created or a service was completed.
    Maintenance { vehicle_id: Option<Uuid> },
    /// Operator-requested full purge.
    All,
}

impl Mutation {
    pub fn family(&self) -> &'static str {
        match self {
            Mutation::Booking { .. } => "booking",
            Mutation::Vehicle { .. } => "vehicle",
            Mutation::Customer { .. } => "customer",
            Mutation::Dashboard { .. } => "dashboard",
            Mutation::Financial => "financial",
            Mutation::Expense { .. } => "expense",
            Mutation::Maintenance { .. } => "maintenance",
            Mutation::All => "all",
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.family())
    }
}
