use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use resumini::backend::models::UploadFile;
use resumini::config::Config;
use resumini::session::analysis::{AnalysisKind, ViewPayload};
use resumini::session::conversation::TurnKind;
use resumini::Session;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting Resumini client v{}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {}", config.api_url);

    let session = Session::connect(&config)?;

    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        let file = UploadFile::from_path(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        println!("Analyzing {}...", file.file_name);
        let outcome = session.upload.submit(file).await?;
        info!("Document {} ready", outcome.document_id);
        session.upload.acknowledge();
    }

    if session.store.document().is_none() {
        bail!("No resume available. Run `resumini <resume.pdf|resume.docx>` first.");
    }

    show_dashboard(&session).await;
    chat(&session).await
}

async fn show_dashboard(session: &Session) {
    println!("\n== Executive Summary ==");
    match session.analysis.fetch(AnalysisKind::Summary).await {
        Ok(ViewPayload::Summary(text)) => println!("{text}"),
        Ok(_) => {}
        Err(e) => println!("No summary available: {e}"),
    }

    println!("\n== ATS Score ==");
    match session.analysis.fetch(AnalysisKind::Ats).await {
        Ok(ViewPayload::Ats(report)) => {
            println!("Total score: {}", report.scores.overall_score);
            println!("Keywords:    {}%", report.scores.keyword_score);
            println!("Match:       {}%", report.match_score.unwrap_or(0.0));
            println!(
                "\nAI feedback:\n{}",
                report.ai_feedback.as_deref().unwrap_or("(none)")
            );
        }
        Ok(_) => {}
        Err(e) => println!("No ATS report available: {e}"),
    }
}

async fn chat(session: &Session) -> Result<()> {
    if let Some(seed) = session.conversation.transcript().first() {
        println!("\n{}", seed.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        if line.trim() == "exit" {
            break;
        }

        match session.conversation.ask(&line).await {
            Ok(Some(turn)) if turn.kind == TurnKind::Failure => println!("! {}", turn.content),
            Ok(Some(turn)) => println!("{}", turn.content),
            Ok(None) => {}
            Err(e) => warn!("{e}"),
        }
    }

    Ok(())
}
