//! `agentloop tools`: Print the tool catalog the agent would see.

use agentloop_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let documents = agentloop_tools::load_documents(&config.tools.documents);
    let registry = agentloop_tools::build_registry(&config.tools, documents)?;

    println!();
    for spec in registry.list() {
        println!("  {}", spec.name);
        println!("      {}", spec.description);
    }
    println!();
    println!("  {} tools available", registry.len());

    if config.tools.search.api_key.is_none() {
        println!("  (search disabled: set SERPAPI_API_KEY to enable)");
    }
    if config.tools.documents.dir.is_none() {
        println!("  (documentsQuery disabled: set AGENTLOOP_DOCUMENTS_DIR to enable)");
    }

    Ok(())
}
