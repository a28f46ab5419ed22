use back_office_assistant::{
    agent::Agent,
    config::AgentConfig,
    context::build_context_store,
    models::{AgentProfile, ToolInvocation},
    provider::{AnthropicProvider, Provider, ProviderResponse, ScriptedProvider},
    tools::{create_registry, Books},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_QUERY: &str = "What account handles interest on our line of credit?";

/// Replays a lookup-then-answer exchange so the loop can be tried without an API key
fn offline_demo(query: &str) -> ScriptedProvider {
    ScriptedProvider::from_responses(vec![
        ProviderResponse::tool_calls(vec![ToolInvocation {
            id: "toolu_demo_1".to_string(),
            name: "search_accounts".to_string(),
            input: json!({ "query": query }),
        }]),
        ProviderResponse::text(
            "(offline demo) I searched the chart of accounts; the suggestions below are the closest matches.",
        ),
    ])
}

fn parse_args() -> Result<(AgentProfile, String), String> {
    let mut profile = AgentProfile::default();
    let mut words = Vec::new();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--profile" | "-p" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--profile needs a value".to_string())?;
                profile = value.parse()?;
            }
            _ => words.push(arg),
        }
    }

    let query = if words.is_empty() {
        DEFAULT_QUERY.to_string()
    } else {
        words.join(" ")
    };

    Ok((profile, query))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AgentConfig::from_env()?;
    let (profile, query) = parse_args()?;

    info!(%profile, "Back-office assistant starting");

    let provider: Arc<dyn Provider> = if config.api_key.is_some() {
        Arc::new(AnthropicProvider::from_config(&config)?)
    } else {
        warn!("ANTHROPIC_API_KEY not set, running the offline demo");
        Arc::new(offline_demo(&query))
    };

    let store = build_context_store(config.database_url.as_deref());
    let settings = config.loop_settings();
    let registry = create_registry(
        profile,
        Arc::new(Books::brokerage_sample()),
        store.clone(),
        settings.suggestion_limit,
    )?;

    let agent = Agent::new(profile, provider, Arc::new(registry), store, settings);

    match agent
        .run_with_deadline(&query, Vec::new(), config.run_deadline)
        .await
    {
        Ok(result) => {
            println!("\n=== ASSISTANT RESULT ===");
            println!("Run ID: {}", result.run_id);
            println!("Termination: {:?}", result.termination);
            println!("Provider calls: {}", result.iterations);
            println!("Tools used: {}", result.tool_calls_made.join(", "));
            println!("\n{}", result.answer);

            if let Some(suggestions) = &result.artifacts.suggestions {
                println!("\nSuggested accounts:");
                for s in suggestions {
                    println!(
                        "  {} {}",
                        s["code"].as_str().unwrap_or("?"),
                        s["name"].as_str().unwrap_or("")
                    );
                }
            }
            if let Some(draft) = &result.artifacts.entry_draft {
                println!("\nJournal entry draft:\n{}", serde_json::to_string_pretty(draft)?);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Assistant run failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
