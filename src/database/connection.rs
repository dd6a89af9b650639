use std::sync::Arc;

use mongodb::{Client, Database};

use crate::config::AppConfig;
use crate::database::user_store::MongoUserDirectory;
use crate::errors::{AppError, Result};
use crate::services::user_directory::{InMemoryUserDirectory, PasswordHasher, UserDirectory};

pub async fn get_db_client(database_url: &str, db_name: &str) -> Result<Database> {
    let client = Client::with_uri_str(database_url)
        .await
        .map_err(|e| AppError::configuration(format!("Failed to connect to MongoDB: {}", e)))?;

    let db = client.database(db_name);

    match db.list_collection_names().await {
        Ok(collections) => {
            tracing::info!("Connected to database: {}", db_name);
            tracing::debug!("Collections found: {:?}", collections);

            if !collections.iter().any(|c| c == "users") {
                tracing::warn!("'users' collection not found, it will be created on first insert");
            }
        }
        Err(e) => {
            tracing::error!("Database '{}' may not exist or is inaccessible: {}", db_name, e);
            return Err(e.into());
        }
    }

    Ok(db)
}

/// Picks the user store: MongoDB when `DATABASE_URL` is set, process memory otherwise.
pub async fn connect_user_directory(config: &AppConfig) -> Result<Arc<dyn UserDirectory>> {
    let hasher = PasswordHasher::new(config.password_hash_cost);

    match &config.database_url {
        Some(url) => {
            let db = get_db_client(url, &config.database_name).await?;
            let users = MongoUserDirectory::new(&db, hasher);
            users.ensure_indexes().await?;
            Ok(Arc::new(users))
        }
        None => {
            if config.is_production() {
                return Err(AppError::configuration("DATABASE_URL must be set in production"));
            }
            tracing::warn!("DATABASE_URL not set, users are kept in memory and lost on restart");
            Ok(Arc::new(InMemoryUserDirectory::new(hasher)))
        }
    }
}
