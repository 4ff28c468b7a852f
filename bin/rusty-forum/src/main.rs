//! # Rusty-Forum Binary
//!
//! Assembles the forum core from the plugins selected at compile time, runs
//! the session sweeper and waits for shutdown. The HTTP layer mounts on top of
//! the `Forum` built here.

use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use rf_configs::{LogFormat, LogSettings, Settings};
use rf_core::clock::SystemClock;
use rf_services::{Forum, ForumSettings, ThrottlePolicy};
use secrecy::ExposeSecret;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "db-sqlite")]
use rf_db_sqlite::SqliteForumRepo;

#[cfg(feature = "auth-argon")]
use rf_auth_argon::Argon2AuthProvider;

#[cfg(not(all(feature = "db-sqlite", feature = "auth-argon")))]
compile_error!("rusty-forum needs a storage plugin (db-sqlite) and an auth plugin (auth-argon)");

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn forum_settings(settings: &Settings) -> ForumSettings {
    ForumSettings {
        session_ttl: Duration::hours(i64::from(settings.session.ttl_hours)),
        cookie_name: settings.session.cookie_name.clone(),
        cookie_path: settings.session.cookie_path.clone(),
        throttle: ThrottlePolicy {
            max_failures: settings.throttle.max_failures as usize,
            window: Duration::seconds(settings.throttle.window_secs as i64),
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    init_tracing(&settings.log);

    // 1. Storage
    let repo = SqliteForumRepo::new(&settings.database.url, settings.database.max_connections)
        .await
        .context("failed to open database")?;

    // 2. Credentials
    let hashing = &settings.hashing;
    let auth = Argon2AuthProvider::with_cost(hashing.memory_kib, hashing.iterations, hashing.parallelism)
        .context("invalid hashing settings")?;

    // 3. Core
    let forum = Forum::new(
        Arc::new(repo),
        Arc::new(auth),
        Arc::new(SystemClock),
        forum_settings(&settings),
    );

    if let Some((email, username, password)) = settings.bootstrap.admin() {
        let admin = forum
            .bootstrap_admin(email, username, password.expose_secret())
            .await
            .context("failed to bootstrap admin account")?;
        info!(identity_id = %admin.id, username = %admin.username, "admin account ready");
    }

    let sweeper = forum.start_session_sweeper(settings.session.sweep_interval());
    info!(database = %settings.database.url, "rusty-forum core started");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    sweeper.abort();
    info!("rusty-forum shutting down");
    Ok(())
}
