use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::auth::repo::{PgUserStore, UserStore};
use crate::bookings::repo::{PgTicketStore, TicketStore};
use crate::config::AppConfig;
use crate::notify::{LogNotifier, Notifier, SmtpNotifier};
use crate::qr::{HttpQrIssuer, QrIssuer};

/// Shared handles passed to every handler. Built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub tickets: Arc<dyn TicketStore>,
    pub qr: Arc<dyn QrIssuer>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let qr = Arc::new(HttpQrIssuer::new(&config.qr)?) as Arc<dyn QrIssuer>;

        let notifier = match &config.smtp {
            Some(smtp) => {
                info!(host = %smtp.host, port = smtp.port, "smtp notifier enabled");
                Arc::new(SmtpNotifier::new(smtp)?) as Arc<dyn Notifier>
            }
            None => {
                info!("SMTP_HOST not set; confirmation emails are logged only");
                Arc::new(LogNotifier) as Arc<dyn Notifier>
            }
        };

        Ok(Self::from_parts(
            db.clone(),
            config,
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(PgTicketStore::new(db)),
            qr,
            notifier,
        ))
    }

    pub fn from_parts(
        db: PgPool,
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        tickets: Arc<dyn TicketStore>,
        qr: Arc<dyn QrIssuer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            config,
            users,
            tickets,
            qr,
            notifier,
        }
    }
}
