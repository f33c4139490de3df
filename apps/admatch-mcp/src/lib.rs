pub mod server;

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

use admatch_config::Security;
use admatch_service::MatchService;
use admatch_storage::QdrantStore;

#[derive(Debug, Parser)]
#[command(
	version = admatch_cli::VERSION,
	rename_all = "kebab",
	styles = admatch_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum McpAuthState {
	Off,
	Token { bearer_token: String },
}

pub async fn run(args: Args) -> Result<()> {
	let config = admatch_config::load(&args.config)?;

	init_tracing(&config)?;

	let bind = config.service.mcp_bind.clone();
	let auth_state = build_auth_state(&config.security, &bind)?;
	let index = Arc::new(QdrantStore::new(&config.storage.qdrant)?);
	let service = Arc::new(MatchService::new(config, index));

	service.ensure_collection().await.map_err(|err| {
		eyre::eyre!("Failed to ensure the creative collection exists: {err}")
	})?;

	server::serve_mcp(&bind, auth_state, service).await
}

/// Without a configured token the server refuses to listen beyond loopback.
fn build_auth_state(security: &Security, mcp_bind: &str) -> Result<McpAuthState> {
	match security.api_auth_token.as_deref() {
		Some(token) => Ok(McpAuthState::Token { bearer_token: token.to_string() }),
		None => {
			let bind_addr: SocketAddr = mcp_bind.parse().map_err(|err| {
				eyre::eyre!("service.mcp_bind must be a valid socket address: {err}")
			})?;

			if !bind_addr.ip().is_loopback() {
				return Err(eyre::eyre!(
					"service.mcp_bind must be a loopback address when security.api_auth_token is unset."
				));
			}

			Ok(McpAuthState::Off)
		},
	}
}

fn init_tracing(config: &admatch_config::Config) -> Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	Ok(())
}
