//! Diagnose teamsim setup issues

use colored::*;
use eyre::Result;
use std::fs;

use crate::config::Config;
use crate::persona::PersonaLoader;

pub fn run(config: &Config) -> Result<()> {
    println!("{}", "teamsim Doctor".bold());
    println!("{}", "═".repeat(50));
    println!();

    let mut issues = 0;

    let teamsim_dir = Config::teamsim_dir();
    if teamsim_dir.exists() {
        println!("{} teamsim directory: {}", "✓".green(), teamsim_dir.display());
    } else {
        println!("{} teamsim directory missing: {}", "⚠".yellow(), teamsim_dir.display());
    }

    let config_file = Config::config_file();
    if config_file.exists() {
        println!("{} Config file: {}", "✓".green(), config_file.display());
    } else {
        println!("{} Config file missing: {} (using defaults)", "⚠".yellow(), config_file.display());
        println!("  Run {} to create it", "teamsim config set completion.model gpt-4".cyan());
    }

    match config.api_key() {
        Ok(_) => println!("{} API key: {} is set", "✓".green(), config.completion.api_key_env),
        Err(e) => {
            println!("{} API key: {}", "✗".red(), e);
            issues += 1;
        }
    }

    let personas_dir = config.personas_dir();
    if personas_dir.exists() {
        println!(
            "{} Personas directory: {} ({} files)",
            "✓".green(),
            personas_dir.display(),
            count_persona_files(&personas_dir)
        );
    } else {
        println!("{} Personas directory missing: {}", "⚠".yellow(), personas_dir.display());
        println!("  Run {} to create one", "teamsim persona create <name>".cyan());
    }

    println!();

    println!("{}", "Roster:".bold());
    let mut loader = PersonaLoader::new(personas_dir);
    match loader.load_all() {
        Ok(profiles) => {
            println!("  {} {} personas available", "✓".green(), profiles.len());
            match loader.select(&config.simulation.roster) {
                Ok(selected) => {
                    let names: Vec<&str> = selected.iter().map(|p| p.name.as_str()).collect();
                    println!("  {} Speaking order: {}", "✓".green(), names.join(" → "));
                }
                Err(e) => {
                    println!("  {} {}", "✗".red(), e);
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  {} {}", "✗".red(), e);
            issues += 1;
        }
    }

    println!();

    println!("{}", "Completion:".bold());
    println!("  Endpoint: {}", config.completion.base_url);
    println!(
        "  Model: {} (max_tokens {}, timeout {}s)",
        config.completion.model.cyan(),
        config.completion.max_tokens,
        config.completion.timeout_secs
    );

    println!();

    println!("{}", "═".repeat(50));
    if issues == 0 {
        println!("{} All checks passed!", "✓".green().bold());
    } else {
        println!("{} {} issue(s) found", "⚠".yellow().bold(), issues);
    }

    Ok(())
}

fn count_persona_files(dir: &std::path::Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "yaml" || ext == "yml"))
                .count()
        })
        .unwrap_or(0)
}
