use async_trait::async_trait;

use crate::error::AppError;
use crate::orders::OrderManager;
use crate::scheduler::RecurringTask;

/// Daily job persisting `Retrasado` on overdue in-transit orders.
pub struct OverdueSweep {
    orders: OrderManager,
}

impl OverdueSweep {
    pub fn new(orders: OrderManager) -> Self {
        OverdueSweep { orders }
    }
}

#[async_trait]
impl RecurringTask for OverdueSweep {
    fn name(&self) -> &'static str {
        "overdue-sweep"
    }

    async fn run(&self) -> Result<(), AppError> {
        self.orders.sweep_overdue().await.map(|_| ())
    }
}
