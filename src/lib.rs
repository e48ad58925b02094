pub mod api;
pub mod booking;
pub mod config;
pub mod db;
pub mod notifications;
pub mod payment;

pub use db::DbPool;

use std::sync::Arc;

use config::Config;
use notifications::BookingMailer;
use payment::PaymentGateway;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub gateway: PaymentGateway,
    pub mailer: Arc<BookingMailer>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let gateway = PaymentGateway::new(config.gateway.clone());
        let mailer = Arc::new(BookingMailer::new(config.email.clone()));
        Self {
            config,
            db,
            gateway,
            mailer,
        }
    }
}
