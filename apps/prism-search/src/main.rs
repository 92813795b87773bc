use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = prism_search::Args::parse();

	prism_search::run(args).await
}
