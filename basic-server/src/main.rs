mod config;

use std::process::ExitCode;
use std::sync::Arc;

use kv_adapter_memory::KvAdapterMemory;
use kv_adapter_redb::{AdapterConfig, KvAdapterRedb};
use tollgate::AppBuilder;
use tollgate_types::prelude::*;

use config::{Config, StoreKind};

async fn configure(app: &mut AppBuilder, config: Config) -> TgResult<()> {
	app.listen(config.listen);
	if let Some(token) = config.admin_token {
		app.admin_token(token);
	}
	app.gate().config(config.gate);

	match config.store {
		StoreKind::Redb => {
			let kv = KvAdapterRedb::new(config.db_dir, AdapterConfig::default()).await?;
			app.kv_adapter(Arc::new(kv));
		}
		StoreKind::Memory => {
			app.kv_adapter(Arc::new(KvAdapterMemory::default()));
		}
		StoreKind::None => {
			warn!("No store configured: rate limits, dynamic blocks and audit records are off");
		}
	}
	Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
	let mut app = AppBuilder::new();

	let config = match Config::from_env() {
		Ok(config) => config,
		Err(e) => {
			error!("FATAL: {}", e);
			return ExitCode::FAILURE;
		}
	};
	if let Err(e) = configure(&mut app, config).await {
		error!("FATAL: {}", e);
		return ExitCode::FAILURE;
	}
	if let Err(e) = app.run().await {
		error!("FATAL: {}", e);
		return ExitCode::FAILURE;
	}
	ExitCode::SUCCESS
}

// vim: ts=4
