mod display;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use fineprint_ai::{GeminiClient, ModelConfig};
use fineprint_session::{FileSelection, SessionHandle, SessionSnapshot, Step, spawn_session};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "fineprint", version, about = "Flag predatory clauses in contracts and bills")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a document and print the risk report
    Scan(ScanArgs),
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// PDF or image to analyze
    file: PathBuf,

    /// What the document is and what worries you about it
    #[arg(short, long)]
    context: String,

    /// Declared MIME type; guessed from the extension when omitted
    #[arg(long)]
    mime: Option<String>,

    /// Also draft a dispute letter from the findings
    #[arg(long)]
    letter: bool,

    /// Write the letter here instead of stdout
    #[arg(long, requires = "letter")]
    out: Option<PathBuf>,

    /// Model name override
    #[arg(long, env = "FINEPRINT_MODEL")]
    model: Option<String>,

    /// Service base URL override
    #[arg(long, env = "FINEPRINT_BASE_URL")]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the report; logs go to stderr.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("fineprint v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Scan(args) => scan(args).await,
    }
}

async fn scan(args: ScanArgs) -> anyhow::Result<()> {
    let mut config = ModelConfig::from_env();
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }

    let session = spawn_session(Arc::new(GeminiClient::new(config)));
    let result = drive(&session, args.file, args.mime, args.context, args.letter, args.out).await;
    session.shutdown().await;
    result
}

async fn drive(
    session: &SessionHandle,
    file: PathBuf,
    mime: Option<String>,
    context: String,
    letter: bool,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let selection = match mime {
        Some(mime) => FileSelection::new(&file, mime),
        None => FileSelection::from_path(&file),
    };

    session.select_file(selection)?;
    session.set_context(context)?;
    let snapshot = session.settle().await?;
    if snapshot.file.is_none() {
        fail(&snapshot, "could not load the document")?;
    }

    eprintln!("Analyzing {}...", file.display());
    session.start_scan()?;
    let snapshot = session.settle().await?;
    if snapshot.step != Step::Results {
        fail(&snapshot, "context must not be blank")?;
    }

    let mut stdout = std::io::stdout().lock();
    display::write_report(&mut stdout, &snapshot)?;
    stdout.flush()?;
    drop(stdout);

    if !letter {
        return Ok(());
    }

    eprintln!("Drafting dispute letter...");
    session.generate_letter()?;
    let snapshot = session.settle().await?;
    let Some(text) = snapshot.letter.as_deref() else {
        return fail(&snapshot, "letter generation did not complete");
    };

    match &out {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("failed to write letter to {}", path.display()))?;
            eprintln!("Letter written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout)?;
            writeln!(stdout, "{text}")?;
        }
    }
    session.close_preview()?;
    Ok(())
}

/// Print the session's error line and bail with it, or with `fallback`.
fn fail(snapshot: &SessionSnapshot, fallback: &str) -> anyhow::Result<()> {
    display::write_error(&mut std::io::stderr().lock(), snapshot)?;
    match &snapshot.error {
        Some(error) => bail!("{error}"),
        None => bail!("{fallback}"),
    }
}
