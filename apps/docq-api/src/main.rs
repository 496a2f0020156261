use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = docq_api::Args::parse();

	docq_api::run(args).await
}
