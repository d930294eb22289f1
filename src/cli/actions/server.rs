use crate::api::{self, ApiConfig};
use crate::authn::{AuthConfig, Authenticator};
use crate::cli::actions::Action;
use crate::session::{InMemorySessionStore, SessionStore};
use crate::store::{InMemoryUserStore, PostgresStore, UserStore};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    let Action::Server {
        port,
        dsn,
        cors_origin,
        cookie_secure,
    } = action;

    let (users, sessions): (Arc<dyn UserStore>, Arc<dyn SessionStore>) = match dsn {
        Some(dsn) => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(&dsn)
                .await
                .context("Failed to connect to database")?;
            let store = PostgresStore::new(pool);
            (Arc::new(store.clone()), Arc::new(store))
        }
        None => {
            info!("No DSN provided, using in-memory stores");
            (
                Arc::new(InMemoryUserStore::new()),
                Arc::new(InMemorySessionStore::new()),
            )
        }
    };

    let auth = Authenticator::new(AuthConfig::default(), users, sessions)
        .context("Failed to build authentication core")?;

    let config = ApiConfig {
        port,
        cookie_secure,
        cors_origin,
    };

    api::serve(config, Arc::new(auth)).await
}
