//! `paperstack chat`: interactive research chat or single-message mode.

use std::sync::Arc;

use paperstack_agent::ChatLoop;
use paperstack_config::AppConfig;
use paperstack_core::message::Conversation;
use paperstack_gateway::api_v1::RESEARCH_SYSTEM_PROMPT;
use paperstack_relay::RunnerClient;
use paperstack_tools::{
    CatalogIndex, ElasticIndex, InMemoryNoteStore, PaperIndex, default_registry,
};

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early to give a clear error
    if config.api_key.is_none() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    PAPERSTACK_API_KEY=sk-ant-...");
        eprintln!("    ANTHROPIC_API_KEY=sk-ant-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = paperstack_providers::from_config(&config)?;

    let index: Arc<dyn PaperIndex> = if config.search.backend == "elastic" {
        let mut index = ElasticIndex::new(&config.search.url, &config.search.index);
        if let Some(ref key) = config.search.api_key {
            index = index.with_api_key(key);
        }
        Arc::new(index)
    } else {
        Arc::new(CatalogIndex::new())
    };

    let runner = RunnerClient::new(&config.runner.base_url);
    let tools = Arc::new(default_registry(
        provider.clone(),
        index,
        Arc::new(InMemoryNoteStore::new()),
        runner,
        config.default_model.as_str(),
        config.limits.research_rounds,
    ));

    let agent = ChatLoop::new(
        provider,
        config.default_model.as_str(),
        config.default_temperature,
        tools,
        RESEARCH_SYSTEM_PROMPT,
    )
    .with_max_rounds(config.limits.chat_rounds)
    .with_max_tokens(config.default_max_tokens);

    if let Some(text) = message {
        // Single message mode
        let mut conversation = Conversation::new();

        eprint!("  Thinking...");
        let outcome = agent.process(&mut conversation, &text).await?;
        eprint!("\r              \r");
        println!("{}", outcome.reply);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  Paperstack — Research Chat");
    println!();
    println!("  Model:     {}", config.default_model);
    println!("  Search:    {}", config.search.backend);
    println!("  Tools:     search_papers, get_paper_details, search_project_corpus,");
    println!("             deep_research, save_note, deploy_repository");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    use std::io::Write;
    use tokio::io::AsyncBufReadExt;

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut conversation = Conversation::new();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let text = line.trim().to_string();
        if text.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }
        if text == "exit" || text == "quit" {
            break;
        }

        eprint!("  ...");
        match agent.process(&mut conversation, &text).await {
            Ok(outcome) => {
                eprint!("\r     \r");
                println!();
                for line in outcome.reply.lines() {
                    println!("  Assistant > {line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [Error] {e}");
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}
