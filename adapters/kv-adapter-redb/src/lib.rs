#![forbid(unsafe_code)]

mod error;
pub mod storage;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

use redb::{ReadableDatabase, ReadableTable};

pub use error::Error;

use storage::{StoredEntry, TABLE_ENTRIES, now_millis};
use tollgate_types::kv_adapter::KvAdapter;
use tollgate_types::prelude::TgResult;

/// File name of the database inside the storage directory
pub const DB_FILE_NAME: &str = "tollgate.redb";

/// Adapter configuration options
#[derive(Debug, Clone)]
pub struct AdapterConfig {
	/// Remove expired entries every this many seconds
	pub purge_interval_secs: u64,

	/// Enable the background purge task
	pub auto_purge: bool,
}

impl Default for AdapterConfig {
	fn default() -> Self {
		Self { purge_interval_secs: 300, auto_purge: true }
	}
}

/// redb-based implementation of KvAdapter.
///
/// Values are stored together with their absolute expiration time, so entries
/// survive restarts and keep expiring on schedule. Reads treat expired entries
/// as absent; the purge task reclaims them.
#[derive(Debug)]
pub struct KvAdapterRedb {
	db: Arc<redb::Database>,
	config: AdapterConfig,
}

impl KvAdapterRedb {
	/// Create a new redb-based key-value adapter.
	///
	/// # Arguments
	///
	/// * `storage_dir` - Directory where the database file is stored
	/// * `config` - Adapter configuration
	pub async fn new(storage_dir: PathBuf, config: AdapterConfig) -> TgResult<Self> {
		tokio::fs::create_dir_all(&storage_dir).await?;
		let db_path = storage_dir.join(DB_FILE_NAME);

		let db = tokio::task::spawn_blocking(move || -> TgResult<redb::Database> {
			let db = if db_path.exists() {
				redb::Database::open(&db_path).map_err(error::from_redb_error)?
			} else {
				redb::Database::create(&db_path).map_err(error::from_redb_error)?
			};

			// Initialize tables
			let tx = db.begin_write().map_err(error::from_redb_error)?;
			let _ = tx.open_table(TABLE_ENTRIES).map_err(error::from_redb_error)?;
			tx.commit().map_err(error::from_redb_error)?;

			Ok(db)
		})
		.await??;

		let adapter = Self { db: Arc::new(db), config };
		if adapter.config.auto_purge {
			adapter.spawn_purge_task();
		}
		info!("Opened key-value store in {:?}", storage_dir);

		Ok(adapter)
	}

	/// Remove every expired entry, returning how many were removed
	pub async fn purge_expired(&self) -> TgResult<usize> {
		let db = Arc::clone(&self.db);
		tokio::task::spawn_blocking(move || purge_expired_blocking(&db)).await?
	}

	fn spawn_purge_task(&self) {
		let db: Weak<redb::Database> = Arc::downgrade(&self.db);
		let period = Duration::from_secs(self.config.purge_interval_secs.max(1));

		tokio::spawn(async move {
			let mut interval = tokio::time::interval(period);
			interval.tick().await;

			loop {
				interval.tick().await;

				// Stop once the adapter is gone
				let Some(db) = db.upgrade() else { break };
				match tokio::task::spawn_blocking(move || purge_expired_blocking(&db)).await {
					Ok(Ok(0)) => {}
					Ok(Ok(removed)) => debug!("Purged {} expired entries", removed),
					Ok(Err(e)) => warn!("Failed to purge expired entries: {}", e),
					Err(e) => warn!("Purge task panicked: {}", e),
				}
			}
		});
	}
}

fn purge_expired_blocking(db: &redb::Database) -> TgResult<usize> {
	let now = now_millis();
	let tx = db.begin_write().map_err(error::from_redb_error)?;
	let removed = {
		let mut table = tx.open_table(TABLE_ENTRIES).map_err(error::from_redb_error)?;

		let mut expired = Vec::new();
		for item in table.iter().map_err(error::from_redb_error)? {
			let (key, value) = item.map_err(error::from_redb_error)?;
			let key = key.value();
			// Undecodable entries are reclaimed too
			let is_expired =
				StoredEntry::decode(key, value.value()).map_or(true, |entry| entry.is_expired(now));
			if is_expired {
				expired.push(key.to_string());
			}
		}

		for key in &expired {
			table.remove(key.as_str()).map_err(error::from_redb_error)?;
		}
		expired.len()
	};
	tx.commit().map_err(error::from_redb_error)?;

	Ok(removed)
}

#[async_trait]
impl KvAdapter for KvAdapterRedb {
	async fn get(&self, key: &str) -> TgResult<Option<Box<str>>> {
		let db = Arc::clone(&self.db);
		let key = key.to_string();

		tokio::task::spawn_blocking(move || -> TgResult<_> {
			let tx = db.begin_read().map_err(error::from_redb_error)?;
			let table = tx.open_table(TABLE_ENTRIES).map_err(error::from_redb_error)?;

			match table.get(key.as_str()).map_err(error::from_redb_error)? {
				Some(v) => {
					let entry = StoredEntry::decode(&key, v.value())?;
					if entry.is_expired(now_millis()) { Ok(None) } else { Ok(Some(entry.v)) }
				}
				None => Ok(None),
			}
		})
		.await?
	}

	async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> TgResult<()> {
		let db = Arc::clone(&self.db);
		let key = key.to_string();
		let encoded = StoredEntry::new(value, ttl, now_millis()).encode()?;

		tokio::task::spawn_blocking(move || -> TgResult<_> {
			let tx = db.begin_write().map_err(error::from_redb_error)?;
			{
				let mut table = tx.open_table(TABLE_ENTRIES).map_err(error::from_redb_error)?;
				table.insert(key.as_str(), encoded.as_str()).map_err(error::from_redb_error)?;
			}
			tx.commit().map_err(error::from_redb_error)?;
			Ok(())
		})
		.await?
	}

	async fn delete(&self, key: &str) -> TgResult<()> {
		let db = Arc::clone(&self.db);
		let key = key.to_string();

		tokio::task::spawn_blocking(move || -> TgResult<_> {
			let tx = db.begin_write().map_err(error::from_redb_error)?;
			{
				let mut table = tx.open_table(TABLE_ENTRIES).map_err(error::from_redb_error)?;
				table.remove(key.as_str()).map_err(error::from_redb_error)?;
			}
			tx.commit().map_err(error::from_redb_error)?;
			Ok(())
		})
		.await?
	}

	async fn list(&self, prefix: &str, limit: Option<u32>) -> TgResult<Vec<(Box<str>, Box<str>)>> {
		let db = Arc::clone(&self.db);
		let prefix = prefix.to_string();
		let limit = limit.map_or(usize::MAX, |l| l as usize);

		tokio::task::spawn_blocking(move || -> TgResult<_> {
			let tx = db.begin_read().map_err(error::from_redb_error)?;
			let table = tx.open_table(TABLE_ENTRIES).map_err(error::from_redb_error)?;
			let now = now_millis();

			let mut results = Vec::new();
			let range = table.range(prefix.as_str()..).map_err(error::from_redb_error)?;

			for item in range {
				if results.len() >= limit {
					break;
				}
				let (key, value) = item.map_err(error::from_redb_error)?;
				let key_str = key.value();

				if !key_str.starts_with(&prefix) {
					break;
				}

				match StoredEntry::decode(key_str, value.value()) {
					Ok(entry) if !entry.is_expired(now) => results.push((Box::from(key_str), entry.v)),
					Ok(_) => {}
					Err(e) => warn!("Skipping {}", e),
				}
			}

			Ok(results)
		})
		.await?
	}

	/// Read and write happen inside one write transaction, which redb serializes
	async fn increment(&self, key: &str, ttl: Option<Duration>) -> TgResult<u64> {
		let db = Arc::clone(&self.db);
		let key = key.to_string();

		tokio::task::spawn_blocking(move || -> TgResult<_> {
			let now = now_millis();
			let tx = db.begin_write().map_err(error::from_redb_error)?;
			let count = {
				let mut table = tx.open_table(TABLE_ENTRIES).map_err(error::from_redb_error)?;

				let current = table
					.get(key.as_str())
					.map_err(error::from_redb_error)?
					.map(|v| v.value().to_string());
				let current = match current {
					Some(raw) => {
						let entry = StoredEntry::decode(&key, &raw)?;
						if entry.is_expired(now) { 0 } else { entry.v.trim().parse::<u64>()? }
					}
					None => 0,
				};

				let count = current.saturating_add(1);
				let encoded = StoredEntry::new(&count.to_string(), ttl, now).encode()?;
				table.insert(key.as_str(), encoded.as_str()).map_err(error::from_redb_error)?;
				count
			};
			tx.commit().map_err(error::from_redb_error)?;

			Ok(count)
		})
		.await?
	}
}

// vim: ts=4
