//! `agentloop config`: Configuration helpers.

use agentloop_config::AppConfig;

pub fn print_default() {
    println!("{}", AppConfig::default_toml());
}

pub fn path() {
    println!("{}", config_path().display());
}

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");
            if !config.has_api_key() {
                println!("   Warning: no API key set (AGENTLOOP_API_KEY or OPENAI_API_KEY)");
            }
            println!();
            println!("   Model:     {}", config.engine.model);
            println!("   Endpoint:  {}", config.engine.base_url);
            println!("   Max steps: {}", config.agent.max_steps);
            println!("   Memory:    {} tokens", config.memory.max_tokens);
            println!(
                "   Gateway:   {}:{}",
                config.gateway.host, config.gateway.port
            );
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}
