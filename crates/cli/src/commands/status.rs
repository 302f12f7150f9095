//! `paperstack status`: show configuration and provider health.

use paperstack_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("📚 Paperstack Status");
    println!("====================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Workspace:    {}", config.runner.resolved_workspace_root().display());
    println!("  Model:        {}", config.default_model);
    println!("  Temperature:  {}", config.default_temperature);
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!("  Runner:       {} ({})", config.runner.mode, config.runner.base_url);
    println!("  Search:       {} ({})", config.search.backend, config.search.url);
    println!(
        "  Limits:       chat {} / session {} / deploy {} / research {}",
        config.limits.chat_rounds,
        config.limits.session_rounds,
        config.limits.deploy_rounds,
        config.limits.research_rounds
    );

    // Check config file existence
    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `paperstack onboard` first");
    }

    match paperstack_providers::from_config(&config) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider reachable ({})", provider.name()),
            Ok(false) | Err(_) => println!("  ⚠️  Provider unreachable"),
        },
        Err(e) => println!("  ⚠️  {e}"),
    }

    Ok(())
}
