use clap::Parser;

use admatch_mcp::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	let args = Args::parse();
	admatch_mcp::run(args).await
}
