//! Question answering commands: `liftdx ask` and `liftdx chat`.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::config::Config;
use crate::engine;
use crate::loader;
use crate::models::DiagnosticResult;
use crate::session::SessionEngine;

/// Build a session over the configured knowledge base and engine.
pub fn build_session(config: &Config) -> Result<SessionEngine> {
    let kb = loader::load_from_config(&config.knowledge).context("Failed to load knowledge base")?;
    let engine = engine::create_engine(&config.engine).context("Failed to create reasoning engine")?;
    Ok(SessionEngine::new(Arc::new(kb), Arc::from(engine), config))
}

pub async fn run_ask(config: &Config, question: &str, no_history: bool) -> Result<()> {
    let session = build_session(config)?;
    let result = session.query(question, !no_history).await?;
    print_result(&result);
    Ok(())
}

/// Interactive multi-turn loop. `clear` resets the history, `quit` or
/// end of input exits.
pub async fn run_chat(config: &Config) -> Result<()> {
    let session = build_session(config)?;
    let summary = session.knowledge().summary();
    println!(
        "Lift Diagnostics - {} {} ({} entries). Type 'clear' to reset, 'quit' to exit.",
        summary.manufacturer, summary.version, summary.total
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "clear" => {
                session.clear_history().await;
                println!("History cleared.");
            }
            question => match session.query(question, true).await {
                Ok(result) => print_result(&result),
                // Engine failures leave the history intact; keep the loop alive.
                Err(e) => eprintln!("Error: {}", e),
            },
        }
    }

    Ok(())
}

pub fn print_result(result: &DiagnosticResult) {
    println!("{}", result.diagnosis_text());
    println!();
    println!("  Confidence:  {}", result.confidence_tier());
    if !result.codes_referenced().is_empty() {
        println!("  Codes:       {}", result.codes_referenced().join(", "));
    }
    if !result.manual_pages().is_empty() {
        let pages: Vec<String> = result.manual_pages().iter().map(u32::to_string).collect();
        println!("  Pages:       {}", pages.join(", "));
    }
    if !result.next_steps().is_empty() {
        println!("  Next steps:  {} identified", result.next_steps().len());
    }
}
