//! Background service that flags unpaid invoices once their due date passes.

use std::{sync::Arc, time::Duration};

use db::{DBService, models::invoice::Invoice};
use thiserror::Error;
use tokio::{sync::RwLock, time::sleep};
use tracing::{debug, error, info, warn};
use utils::dates::{format_date, today};

use super::{billing::InvoiceService, config::Config};

#[derive(Debug, Error)]
pub enum InvoiceOverdueError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Flags past-due invoices on a timer. The pause between passes is read from
/// the shared config before each sleep, so a config change applies from the
/// next pass.
pub struct InvoiceOverdueService {
    db: DBService,
    config: Arc<RwLock<Config>>,
}

impl InvoiceOverdueService {
    pub fn new(db: DBService, config: Arc<RwLock<Config>>) -> Self {
        Self { db, config }
    }

    /// Spawn the background overdue check
    pub async fn spawn(db: DBService, config: Arc<RwLock<Config>>) -> tokio::task::JoinHandle<()> {
        let service = Self::new(db, config);
        tokio::spawn(async move {
            service.start().await;
        })
    }

    pub async fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.config.read().await.overdue_check_interval_secs)
    }

    async fn start(&self) {
        info!("Starting invoice overdue service with interval {:?}", self.poll_interval().await);

        loop {
            if let Err(e) = self.check_overdue_invoices(&format_date(today())).await {
                error!("Error checking for overdue invoices: {}", e);
            }
            sleep(self.poll_interval().await).await;
        }
    }

    /// Recompute the status of every sent or partially paid invoice due before
    /// `today`. Returns how many became overdue.
    pub async fn check_overdue_invoices(&self, today: &str) -> Result<usize, InvoiceOverdueError> {
        let candidates = Invoice::find_overdue_candidates(&self.db.pool, today).await?;
        if candidates.is_empty() {
            debug!("Invoice overdue: nothing past due");
            return Ok(0);
        }

        let mut flagged = 0;
        for invoice in candidates {
            let mut conn = self.db.pool.acquire().await?;
            match InvoiceService::refresh_status(&mut conn, invoice.id, today).await {
                Ok(updated) if updated.status != invoice.status => {
                    info!(
                        invoice_id = invoice.id,
                        number = %invoice.invoice_number,
                        due_date = ?invoice.due_date,
                        from = %invoice.status,
                        to = %updated.status,
                        "Invoice overdue: status changed"
                    );
                    flagged += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        invoice_id = invoice.id,
                        error = %e,
                        "Invoice overdue: error refreshing invoice status"
                    );
                }
            }
        }

        Ok(flagged)
    }
}
