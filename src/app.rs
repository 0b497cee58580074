use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use crate::{
    config::{Config, DatabaseConfig},
    routes::{
        auth::{check_auth, require_admin},
        health,
        projects::get_projects,
        reports::{
            get_buckets, get_monthly, get_recent, get_referrals, get_report, get_summary,
            get_top_contributors, get_weekdays,
        },
        user::{get_users, post_user_action},
    },
};
use axum::{middleware, routing::get, Extension, Router};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;

#[derive(Clone)]
pub struct Db(Pool<Postgres>);

impl Db {
    pub fn inner(&self) -> Pool<Postgres> {
        self.0.clone()
    }
}

#[derive(Clone)]
pub struct AppState {
    db_pool: Db,
    pub config: Config,
}

impl AppState {
    pub fn new(pool: Pool<Postgres>, config: Config) -> Self {
        Self {
            db_pool: Db(pool),
            config,
        }
    }

    pub fn get_pool(&self) -> Pool<Postgres> {
        self.db_pool.inner()
    }
}

pub struct Application;

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<()> {
        Self::setup_tracing(&config.application.debug_mode)?;

        let db_pool = Self::get_pool(&config.database);
        let app_state = Arc::new(AppState {
            db_pool,
            config: config.clone(),
        });

        let app = Self::router(app_state);

        let ip = config.application.host.parse::<IpAddr>()?;
        let addr = SocketAddr::new(ip, config.application.port);
        tracing::info!("listening on {}", addr);
        axum::Server::bind(&addr)
            .serve(app.into_make_service())
            .await?;

        Ok(())
    }

    /// Every route but `/health` needs an admin bearer token.
    pub fn router(app_state: Arc<AppState>) -> Router {
        let config = app_state.config.clone();
        let db = Db(app_state.get_pool());
        let cors = CorsLayer::permissive();

        Router::new()
            .route("/reports", get(get_report))
            .route("/reports/summary", get(get_summary))
            .route("/reports/monthly", get(get_monthly))
            .route("/reports/weekdays", get(get_weekdays))
            .route("/reports/top-contributors", get(get_top_contributors))
            .route("/reports/buckets", get(get_buckets))
            .route("/reports/recent", get(get_recent))
            .route("/reports/referrals", get(get_referrals))
            .route("/projects", get(get_projects))
            .route("/admin/users", get(get_users).post(post_user_action))
            .route_layer(middleware::from_fn(require_admin))
            .route_layer(middleware::from_fn(check_auth))
            .route("/health", get(health))
            .with_state(app_state)
            .layer(Extension(config))
            .layer(Extension(db))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
    }

    fn setup_tracing(debug_mode: &str) -> anyhow::Result<()> {
        LogTracer::init()?;
        let subscriber = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| debug_mode.into()),
            )
            .with(tracing_subscriber::fmt::layer());
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(())
    }

    fn get_pool(db_config: &DatabaseConfig) -> Db {
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_secs(2))
            .connect_lazy_with(db_config.get_connect_options());
        Db(pool)
    }
}
