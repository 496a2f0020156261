use std::{io, path::PathBuf};

use clap::Parser;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use docq_domain::Conversation;
use docq_service::{Agent, ErrorBody};

const EXIT_COMMAND: &str = "exit";

#[derive(Debug, Parser)]
#[command(
	version = docq_cli::VERSION,
	rename_all = "kebab",
	styles = docq_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Request to answer. Without it, one request is read per stdin line.
	pub query: Option<String>,
	/// Print the extracted query instead of running it.
	#[arg(long)]
	pub dry_run: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = docq_config::load(&args.config)?;

	init_tracing(&config.service.log_level)?;

	let agent = Agent::open(config).await?;
	let mut stdout = tokio::io::stdout();
	let result = match args.query.as_deref() {
		Some(text) => {
			let mut conversation = agent.new_conversation();
			let answer = answer(&agent, &mut conversation, text, args.dry_run).await;

			write_json(&mut stdout, &answer).await
		},
		None => {
			let stdin = BufReader::new(tokio::io::stdin());

			run_lines(&agent, stdin, &mut stdout, args.dry_run).await
		},
	};

	agent.close().await;

	Ok(result?)
}

/// Answers each non-empty line in one conversation until EOF or `exit`.
pub async fn run_lines<R, W>(
	agent: &Agent,
	reader: R,
	writer: &mut W,
	dry_run: bool,
) -> io::Result<()>
where
	R: AsyncBufRead + Unpin,
	W: AsyncWrite + Unpin,
{
	let mut conversation = agent.new_conversation();
	let mut lines = reader.lines();

	while let Some(line) = lines.next_line().await? {
		let text = line.trim();

		if text.is_empty() {
			continue;
		}
		if text.eq_ignore_ascii_case(EXIT_COMMAND) {
			break;
		}

		let answer = answer(agent, &mut conversation, text, dry_run).await;

		write_json(writer, &answer).await?;
	}

	Ok(())
}

/// The outcome as JSON. A dry run yields `{"query": ..}` and leaves history untouched.
pub async fn answer(
	agent: &Agent,
	conversation: &mut Conversation,
	text: &str,
	dry_run: bool,
) -> Value {
	if dry_run {
		return match agent.translate(conversation, text).await {
			Ok(descriptor) => serde_json::json!({ "query": descriptor }),
			Err(err) => serde_json::json!({ "error": ErrorBody::from(err) }),
		};
	}

	let outcome = agent.ask(conversation, text).await;

	serde_json::to_value(&outcome).unwrap_or_else(|err| {
		serde_json::json!({ "error": { "kind": "execution_error", "message": err.to_string() } })
	})
}

async fn write_json<W>(writer: &mut W, value: &Value) -> io::Result<()>
where
	W: AsyncWrite + Unpin,
{
	let mut text = serde_json::to_string_pretty(value).map_err(io::Error::other)?;

	text.push('\n');
	writer.write_all(text.as_bytes()).await?;
	writer.flush().await
}

/// Installs the global subscriber; fails if one is already set.
pub fn init_tracing(log_level: &str) -> color_eyre::Result<()> {
	let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.try_init()
		.map_err(|err| color_eyre::eyre::eyre!(err))
}
