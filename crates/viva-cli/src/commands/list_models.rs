//! The `viva list-models` command.

use std::path::PathBuf;

use anyhow::Result;

use viva_providers::create_provider;

pub fn execute(provider_filter: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = viva_providers::config::load_config_from(config_path.as_deref())?;

    let mut names: Vec<&String> = config
        .providers
        .keys()
        .filter(|name| provider_filter.as_deref().map_or(true, |filter| name.as_str() == filter))
        .collect();
    names.sort();

    if names.is_empty() {
        println!("No providers configured. Run `viva init` to create a config file.");
        return Ok(());
    }

    for name in names {
        let provider = match create_provider(name, &config.providers[name]) {
            Ok(provider) => provider,
            Err(e) => {
                println!("Provider: {name} (unavailable: {e})\n");
                continue;
            }
        };

        let marker = if *name == config.default_provider {
            " (default)"
        } else {
            ""
        };
        println!("Provider: {name}{marker}");
        for model in provider.available_models() {
            println!(
                "  {} - {} ({}K context, ${:.4}/{:.4} per 1K tokens)",
                model.id,
                model.name,
                model.max_context / 1000,
                model.cost_per_1k_input,
                model.cost_per_1k_output,
            );
        }
        println!();
    }

    Ok(())
}
