#![deny(missing_docs)]
//! Build metadata server executable.
//!
//! Serves the vote, comment and badge feeds, the issue tracker and client
//! telemetry over HTTP.

mod config;
mod db;
mod models;
mod openapi;
mod pg_store;
mod routes;
mod schema;

#[cfg(not(test))]
use std::sync::Arc;

#[cfg(not(test))]
use actix_web::{App, HttpServer, web};
#[cfg(not(test))]
use buildmeta_core::MetadataService;
#[cfg(not(test))]
use dotenvy::dotenv;
#[cfg(not(test))]
use log::{info, warn};

#[cfg(not(test))]
use crate::config::{ServerConfig, StoreBackend};
#[cfg(not(test))]
use crate::db::init_pool;
#[cfg(not(test))]
use crate::pg_store::PgStore;
#[cfg(not(test))]
use crate::routes::{AppState, configure};

#[cfg(not(test))]
fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = ServerConfig::from_env()?;

    let service = match config.store {
        StoreBackend::Postgres => {
            let database_url = config.database_url.as_deref().unwrap_or_default();
            let pool = init_pool(database_url, config.pool_size)?;
            MetadataService::new(Arc::new(PgStore::new(pool)))
        }
        StoreBackend::Memory => {
            warn!("using the in-memory store; nothing will survive a restart");
            MetadataService::in_memory()
        }
    };
    let state = web::Data::new(AppState { service });

    let listen_addr = config.host.clone();
    let listen_port = config.port;
    info!("listening on {listen_addr}:{listen_port}");

    actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            App::new()
                .wrap(actix_web::middleware::Logger::default())
                .app_data(state.clone())
                .configure(configure)
        })
        .bind((listen_addr, listen_port))?
        .run()
        .await
    })
}

#[cfg(test)]
fn main() {}
