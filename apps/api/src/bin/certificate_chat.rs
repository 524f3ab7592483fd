//! Terminal client: upload a certificate (or reopen a saved analysis) and ask
//! follow-up questions about it.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use diamond_api::conversation::client::{AnalysisSnapshot, ChatClient, ChatSession};
use diamond_api::conversation::message::QUICK_QUESTIONS;
use diamond_api::conversation::reconcile::TurnOutcome;

/// Chat about a diamond grading certificate.
#[derive(Parser, Debug)]
#[command(name = "certificate-chat")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Base URL of the diamond API
    #[arg(short, long, env = "DIAMOND_API_URL", default_value = "http://localhost:8080")]
    server: String,

    /// Certificate PDF to upload and analyze
    #[arg(short, long, conflicts_with = "snapshot")]
    pdf: Option<PathBuf>,

    /// Previously saved analysis to continue from
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Write the analysis to this file after uploading
    #[arg(long, requires = "pdf")]
    save: Option<PathBuf>,

    /// Wait for complete answers instead of streaming them
    #[arg(long)]
    no_stream: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = ChatClient::new(&cli.server)?;

    let snapshot = match (&cli.pdf, &cli.snapshot) {
        (Some(pdf), _) => {
            println!("Analyzing {} ...", pdf.display());
            let snapshot = client.analyze(pdf).await?;
            if let Some(path) = &cli.save {
                snapshot.save(path)?;
                println!("Saved analysis to {}", path.display());
            }
            snapshot
        }
        (None, Some(path)) => AnalysisSnapshot::load(path)?,
        (None, None) => bail!("pass --pdf to upload a certificate or --snapshot to reopen one"),
    };

    print_specs(&snapshot);
    let mut session = ChatSession::new(client, snapshot);
    if let Some(opening) = session.log().visible().next() {
        println!("\n{}\n", opening.content);
    }
    print_quick_questions();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = match line.trim() {
            "" => continue,
            "quit" | "exit" => break,
            input => resolve_quick_question(input),
        };

        let outcome = if cli.no_stream {
            session.ask(&question).await
        } else {
            session
                .ask_streaming(&question, |_, fragment| {
                    print!("{fragment}");
                    let _ = std::io::stdout().flush();
                })
                .await
        };

        match outcome {
            TurnOutcome::Completed if cli.no_stream => {
                if let Some(answer) = session.log().messages().last() {
                    println!("{}", answer.content);
                }
            }
            TurnOutcome::Completed => println!(),
            TurnOutcome::Interrupted => println!("\n[answer interrupted]"),
            TurnOutcome::Failed => {
                if let Some(apology) = session.log().messages().last() {
                    println!("{}", apology.content);
                }
            }
        }
    }

    Ok(())
}

/// "1".."4" pick a quick question; anything else is asked as typed.
fn resolve_quick_question(input: &str) -> String {
    input
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| QUICK_QUESTIONS.get(i))
        .map(|q| q.to_string())
        .unwrap_or_else(|| input.to_string())
}

fn print_specs(snapshot: &AnalysisSnapshot) {
    let specs = &snapshot.specs;
    let show = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());

    let number = Some(specs.certificate_number.clone()).filter(|n| !n.is_empty());

    println!("Certificate {}", show(number));
    println!("  Laboratory: {}", show(specs.laboratory.map(|l| l.to_string())));
    println!("  Type:       {}", specs.diamond_type);
    println!("  Carat:      {}", show(specs.carat.map(|c| format!("{c:.2}"))));
    println!("  Color:      {}", show(specs.color.map(|c| c.to_string())));
    println!("  Clarity:    {}", show(specs.clarity.map(|c| c.to_string())));
    println!("  Cut:        {}", show(specs.cut.map(|c| c.to_string())));
}

fn print_quick_questions() {
    println!("Quick questions:");
    for (i, question) in QUICK_QUESTIONS.iter().enumerate() {
        println!("  {}. {question}", i + 1);
    }
    println!("Type a number, your own question, or 'quit'.");
}
