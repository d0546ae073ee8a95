//! View-state controllers for the three role dashboards. Each controller
//! owns its screen state, reads through the registries it was built with and
//! keeps failures as display strings.

mod admin;
mod owner;
mod supplier;

pub use admin::AdminDashboard;
pub use owner::{OwnerDashboard, OwnerView};
pub use supplier::{days_remaining, urgency, SupplierDashboard, SupplierView, Urgency};

use tracing::warn;

use crate::error::ClientError;

fn failure(action: &'static str, err: &ClientError) -> String {
    warn!(action, error = %err, "registry call failed");
    err.to_string()
}

#[cfg(test)]
#[path = "../tests/dashboard_tests.rs"]
mod tests;
