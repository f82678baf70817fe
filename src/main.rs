use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use intake_engine::config::EngineConfig;
use intake_engine::engine::{IntakeEngine, TurnOutcome};
use intake_engine::llm::{AnthropicConfig, AnthropicProvider};
use intake_engine::session::SessionState;
use intake_engine::store::FileSessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = EngineConfig::from_env()?;

    let session_dir =
        std::env::var("INTAKE_SESSION_DIR").unwrap_or_else(|_| "./data/sessions".to_string());
    let store = FileSessionStore::new(session_dir.as_str()).await?;

    eprintln!("Intake Engine v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Sessions: {}", session_dir);

    let mut engine = IntakeEngine::new(Arc::new(store), config);

    match std::env::var("ANTHROPIC_API_KEY") {
        Ok(api_key) => {
            let model = std::env::var("INTAKE_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
            let provider = AnthropicProvider::new(
                AnthropicConfig::new(secrecy::SecretString::from(api_key)).with_model(&model),
            )?;
            engine = engine.with_provider(Arc::new(provider));
            eprintln!("   Model: {}", model);
        }
        Err(_) => {
            eprintln!("   Model: none (ANTHROPIC_API_KEY not set, deterministic mode)");
        }
    }

    eprintln!("\nDescribe your project to start. /quit to exit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut session_id: Option<String> = None;

    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text == "/quit" {
            break;
        }
        if text.is_empty() {
            continue;
        }

        let outcome = match &session_id {
            None => engine.start(text).await,
            Some(id) => engine.continue_turn(id, text).await,
        };
        match outcome {
            Ok(outcome) => {
                session_id = Some(outcome.session_id.clone());
                print_turn(&outcome);
            }
            Err(e) => eprintln!("   Error: {}", e),
        }
    }

    Ok(())
}

fn print_turn(outcome: &TurnOutcome) {
    println!("{}", outcome.reply);
    eprintln!(
        "   [{} | readiness {}%{}]",
        outcome.session_id,
        outcome.readiness,
        if outcome.state == SessionState::ReadyToFinalize {
            " | ready to finalize"
        } else {
            ""
        }
    );
}
