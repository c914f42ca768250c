use colored::*;
use eyre::{Context, Result};

use crate::cli::{ConfigAction, OutputFormat};
use crate::config::Config;

pub fn run(action: ConfigAction, config: &Config) -> Result<()> {
    match action {
        ConfigAction::Show { format } => show(OutputFormat::resolve(format), config),
        ConfigAction::Get { key } => get(&key, config),
        ConfigAction::Set { key, value } => set(&key, &value, config),
    }
}

fn show(format: OutputFormat, config: &Config) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(config)?);
        }
        OutputFormat::Text => {
            println!("{}", "teamsim Configuration".bold());
            println!();

            println!("{}: {}", "log_level".cyan(), config.log_level.as_filter());
            println!();

            println!("{}:", "completion".cyan());
            println!("  model: {}", config.completion.model);
            println!("  max_tokens: {}", config.completion.max_tokens);
            println!("  temperature: {}", config.completion.temperature);
            println!("  base_url: {}", config.completion.base_url);
            println!("  api_key_env: {}", config.completion.api_key_env);
            println!("  timeout_secs: {}", config.completion.timeout_secs);
            println!();

            println!("{}:", "simulation".cyan());
            println!("  rounds: {}", config.simulation.rounds);
            match config.simulation.temperature {
                Some(t) => println!("  temperature: {}", t),
                None => println!("  temperature: {}", "(completion default)".dimmed()),
            }
            println!("  opening_prompt: {}", config.simulation.opening_prompt);
            if config.simulation.roster.is_empty() {
                println!("  roster: {}", "(all personas)".dimmed());
            } else {
                println!("  roster: {}", config.simulation.roster.join(", "));
            }
            println!();

            println!("{}:", "paths".cyan());
            println!("  personas: {}", config.paths.personas.display());
        }
    }

    Ok(())
}

/// Value of a dotted key, None for unknown keys
fn lookup(key: &str, config: &Config) -> Option<String> {
    match key {
        "log_level" | "log-level" => Some(config.log_level.as_filter().to_string()),
        "completion.model" => Some(config.completion.model.clone()),
        "completion.max_tokens" => Some(config.completion.max_tokens.to_string()),
        "completion.temperature" => Some(config.completion.temperature.to_string()),
        "completion.base_url" => Some(config.completion.base_url.clone()),
        "completion.api_key_env" => Some(config.completion.api_key_env.clone()),
        "completion.timeout_secs" => Some(config.completion.timeout_secs.to_string()),
        "simulation.rounds" => Some(config.simulation.rounds.to_string()),
        "simulation.temperature" => Some(
            config
                .simulation
                .temperature
                .map(|t| t.to_string())
                .unwrap_or_default(),
        ),
        "simulation.opening_prompt" => Some(config.simulation.opening_prompt.clone()),
        "simulation.roster" => Some(config.simulation.roster.join(",")),
        "paths.personas" => Some(config.paths.personas.display().to_string()),
        _ => None,
    }
}

fn get(key: &str, config: &Config) -> Result<()> {
    match lookup(key, config) {
        Some(v) => println!("{}", v),
        None => eyre::bail!("Unknown config key: {}", key),
    }

    Ok(())
}

/// Apply `key = value` to a copy of the configuration
fn apply(key: &str, value: &str, config: &Config) -> Result<Config> {
    let mut new_config = config.clone();

    match key {
        "log_level" | "log-level" => new_config.log_level = value.parse()?,
        "completion.model" => new_config.completion.model = value.to_string(),
        "completion.max_tokens" => {
            new_config.completion.max_tokens = value.parse().context("Invalid max_tokens (use a positive integer)")?;
        }
        "completion.temperature" => {
            new_config.completion.temperature = value.parse().context("Invalid temperature (use a number)")?;
        }
        "completion.base_url" => new_config.completion.base_url = value.to_string(),
        "completion.api_key_env" => new_config.completion.api_key_env = value.to_string(),
        "completion.timeout_secs" => {
            new_config.completion.timeout_secs = value.parse().context("Invalid timeout (use whole seconds)")?;
        }
        "simulation.rounds" => {
            new_config.simulation.rounds = value.parse().context("Invalid rounds (use a non-negative integer)")?;
        }
        "simulation.temperature" => {
            new_config.simulation.temperature = if value.trim().is_empty() {
                None
            } else {
                Some(value.parse().context("Invalid temperature (use a number)")?)
            };
        }
        "simulation.opening_prompt" => new_config.simulation.opening_prompt = value.to_string(),
        "simulation.roster" => {
            new_config.simulation.roster = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        "paths.personas" => new_config.paths.personas = value.into(),
        _ => {
            eyre::bail!("Unknown config key: {}", key);
        }
    }

    Ok(new_config)
}

fn set(key: &str, value: &str, config: &Config) -> Result<()> {
    println!("{} Setting {} = {}", "→".blue(), key.cyan(), value.green());

    let new_config = apply(key, value, config)?;
    let config_path = new_config.save()?;

    println!("  {} Saved to {}", "✓".green(), config_path.display());

    Ok(())
}
