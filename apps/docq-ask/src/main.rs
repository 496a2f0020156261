use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = docq_ask::Args::parse();

	docq_ask::run(args).await
}
