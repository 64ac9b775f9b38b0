//! **vigil**: operator CLI for the feed guard.
//!
//! ```text
//! vigil redact                                  # redact stdin, print the outcome as JSON
//! vigil ingest <conversation> <message> [role]  # run stdin through the publication coordinator
//! vigil chain <owner> <fact>...                 # append facts to the owner's memory chain
//! vigil verify <owner> [--thorough]             # verify the owner's chain
//! vigil status <owner>                          # print chain status
//! ```
//!
//! Storage lives under `VIGIL_STORAGE_PATH` (default `./data`), ledger at `vigil/ledger.sqlite`.

use serde_json::json;
use std::io::Read;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil_core::{
    chain_id, ChainBuilder, ChainVerification, ChainVerifier, ExtractedFact, InboundMessage,
    MessageRole, Publisher, RedactionEngine, VigilConfig,
};
use vigil_ledger::LedgerSqlite;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[vigil] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let sub = args.first().map(|s| s.as_str()).unwrap_or("help");
    let rest = args.get(1..).unwrap_or_default();
    let config = VigilConfig::from_env();

    let result = match sub {
        "redact" => run_redact(),
        "ingest" => run_ingest(&config, rest),
        "chain" => run_chain(&config, rest),
        "verify" => run_verify(&config, rest),
        "status" => run_status(&config, rest),
        "--help" | "-h" | "help" => {
            print_usage();
            Ok(())
        }
        other => Err(format!("unknown subcommand '{}'; see `vigil help`", other)),
    };

    if let Err(e) = result {
        eprintln!("vigil {}: {}", sub, e);
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("vigil v{}", VERSION);
    println!();
    println!("Usage: vigil <COMMAND>");
    println!();
    println!("Commands:");
    println!("  redact                                  Redact stdin and print the outcome");
    println!("  ingest <conversation> <message> [role]  Publish stdin as one conversation message");
    println!("  chain <owner> <fact>...                 Append facts to the owner's memory chain");
    println!("  verify <owner> [--thorough]             Verify the owner's memory chain");
    println!("  status <owner>                          Print chain length and latest link");
    println!();
    println!("Environment: VIGIL_STORAGE_PATH, VIGIL_BROADCAST_CAPACITY, VIGIL_SOURCE_AGENT, RUST_LOG");
}

fn read_stdin() -> Result<String, String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| format!("read stdin: {}", e))?;
    Ok(buf.trim_end_matches(['\r', '\n']).to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let out = serde_json::to_string_pretty(value).map_err(|e| format!("encode output: {}", e))?;
    println!("{}", out);
    Ok(())
}

fn open_ledger(config: &VigilConfig) -> Result<Arc<LedgerSqlite>, String> {
    let path = config.ledger_path();
    tracing::debug!(target: "vigil::cli", ledger = %path.display(), "opening ledger");
    LedgerSqlite::new(path.clone())
        .map(Arc::new)
        .map_err(|e| format!("cannot open ledger at {}: {}", path.display(), e))
}

fn owner_arg(rest: &[String]) -> Result<&str, String> {
    rest.first()
        .map(|s| s.as_str())
        .ok_or_else(|| "missing <owner>".to_string())
}

fn run_redact() -> Result<(), String> {
    let text = read_stdin()?;
    let outcome = RedactionEngine::new().redact(&text);
    print_json(&outcome)
}

fn run_ingest(config: &VigilConfig, rest: &[String]) -> Result<(), String> {
    let (conversation_id, message_id) = match rest {
        [c, m, ..] => (c.as_str(), m.as_str()),
        _ => return Err("usage: vigil ingest <conversation> <message> [role]".to_string()),
    };
    let role = match rest.get(2) {
        Some(r) => MessageRole::parse(r).ok_or_else(|| format!("unknown role '{}'", r))?,
        None => MessageRole::User,
    };
    let content = read_stdin()?;

    let publisher = Publisher::new(open_ledger(config)?, config.broadcast_capacity);
    let message = InboundMessage::new(conversation_id, message_id, role, content);
    let outcome = publisher
        .handle_message(&message)
        .map_err(|e| format!("publication failed (safe to retry): {}", e))?;
    print_json(&outcome)
}

fn run_chain(config: &VigilConfig, rest: &[String]) -> Result<(), String> {
    let owner = owner_arg(rest)?;
    let facts: Vec<ExtractedFact> = rest[1..].iter().map(ExtractedFact::new).collect();
    if facts.is_empty() {
        return Err("usage: vigil chain <owner> <fact>...".to_string());
    }
    let builder = ChainBuilder::for_agent(open_ledger(config)?, &config.source_agent)
        .map_err(|e| e.to_string())?;
    let links = builder
        .chain_batch(owner, &facts, None)
        .map_err(|e| e.to_string())?;
    let summary: Vec<_> = links
        .iter()
        .map(|l| json!({ "sequence": l.sequence, "link_hash": l.link_hash }))
        .collect();
    let chain_id = builder.chain_id_for(owner).map_err(|e| e.to_string())?;
    print_json(&json!({ "chain_id": chain_id, "appended": summary }))
}

fn run_verify(config: &VigilConfig, rest: &[String]) -> Result<(), String> {
    let owner = owner_arg(rest)?;
    let thorough = rest.iter().skip(1).any(|a| a == "--thorough");
    let id = chain_id(owner, &config.source_agent).map_err(|e| e.to_string())?;
    let verifier = ChainVerifier::for_agent(open_ledger(config)?, &config.source_agent)
        .map_err(|e| e.to_string())?;
    let result = if thorough {
        verifier.verify_thorough(&id)
    } else {
        verifier.verify(&id)
    }
    .map_err(|e| e.to_string())?;
    print_json(&result)?;
    if matches!(result, ChainVerification::BrokenChain { .. }) {
        std::process::exit(2);
    }
    Ok(())
}

fn run_status(config: &VigilConfig, rest: &[String]) -> Result<(), String> {
    let owner = owner_arg(rest)?;
    let verifier = ChainVerifier::for_agent(open_ledger(config)?, &config.source_agent)
        .map_err(|e| e.to_string())?;
    let status = verifier.status(owner).map_err(|e| e.to_string())?;
    print_json(&status)
}
