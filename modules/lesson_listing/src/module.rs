use std::sync::Arc;

use anyhow::Context;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info};

use crate::config::ListingConfig;
use crate::domain::query::ListingSortKeys;
use crate::domain::service::{Service, ServiceConfig};
use crate::infra::storage::migrations::Migrator;
use crate::infra::storage::relations::ListingRelations;
use crate::infra::storage::sea_orm_repo::SeaOrmListingRepository;

/// Wire the SeaORM repository to the domain service.
///
/// Sort keys and relations are built and cross-checked here, so a listing
/// whose sort key does not end in its unique column never reaches a request.
pub fn build_service(db: DatabaseConnection, cfg: &ListingConfig) -> anyhow::Result<Service> {
    info!("Initializing lesson_listing");
    debug!(
        default_page_size = cfg.default_page_size,
        max_page_size = cfg.max_page_size,
        limit_policy = ?cfg.limit_policy,
        timezone = %cfg.timezone,
        "Loaded lesson_listing config"
    );
    if cfg.default_page_size == 0 || cfg.default_page_size > cfg.max_page_size {
        anyhow::bail!(
            "default_page_size must be within 1..={}, got {}",
            cfg.max_page_size,
            cfg.default_page_size
        );
    }

    let keys = ListingSortKeys::new().context("invalid listing sort keys")?;
    let relations = ListingRelations::new(db.get_database_backend(), cfg)
        .context("invalid listing relations")?;
    relations
        .validate(&keys)
        .context("sort keys do not match listing relations")?;

    let repo = SeaOrmListingRepository::new(db, relations);
    let service_config = ServiceConfig {
        limits: cfg.limits(),
        timezone: cfg.timezone,
    };
    Ok(Service::new(Arc::new(repo), Arc::new(keys), service_config))
}

pub async fn migrate(db: &DatabaseConnection) -> anyhow::Result<()> {
    info!("Running lesson_listing database migrations");
    Migrator::up(db, None)
        .await
        .context("lesson_listing migrations failed")?;
    info!("lesson_listing migrations completed");
    Ok(())
}
