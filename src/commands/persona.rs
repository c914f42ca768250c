//! Persona management commands

use colored::*;
use eyre::{Context, Result};
use std::fs;

use crate::cli::{OutputFormat, PersonaAction};
use crate::config::Config;
use crate::persona::PersonaLoader;

pub fn run(action: PersonaAction, config: &Config) -> Result<()> {
    match action {
        PersonaAction::List { format } => list_personas(OutputFormat::resolve(format), config),
        PersonaAction::Show { name, format } => show_persona(&name, OutputFormat::resolve(format), config),
        PersonaAction::Create { name } => create_persona(&name, config),
    }
}

fn list_personas(format: OutputFormat, config: &Config) -> Result<()> {
    let mut loader = PersonaLoader::new(config.personas_dir());
    let personas = loader.load_all()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&personas)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&personas)?),
        OutputFormat::Text => {
            println!("{}", "Available Personas:".bold());
            println!();

            for persona in &personas {
                println!("  {} {}", "●".green(), persona.name.bold());
                if !persona.goal.is_empty() {
                    println!("    {}", persona.goal.dimmed());
                }
                if let Some(ref model) = persona.model {
                    println!("    Model: {}", model.cyan());
                }
                println!();
            }

            println!(
                "  Add your own in {} with: {}",
                loader.personas_dir().display(),
                "teamsim persona create <name>".cyan()
            );
        }
    }

    Ok(())
}

fn show_persona(name: &str, format: OutputFormat, config: &Config) -> Result<()> {
    let mut loader = PersonaLoader::new(config.personas_dir());
    loader.load_all()?;

    let Some(persona) = loader.get(name) else {
        eyre::bail!("Persona '{}' not found", name);
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(persona)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(persona)?),
        OutputFormat::Text => {
            println!("{} {}", "Persona:".bold(), persona.name.green().bold());
            println!();
            println!("{} {}", "Goal:".bold(), persona.goal);

            println!();
            println!("{}", "Backstory (system message):".bold());
            for line in persona.backstory.lines() {
                println!("  {}", line);
            }

            if let Some(ref model) = persona.model {
                println!();
                println!("{} {}", "Model:".bold(), model.cyan());
            }
        }
    }

    Ok(())
}

fn create_persona(name: &str, config: &Config) -> Result<()> {
    let loader = PersonaLoader::new(config.personas_dir());
    let persona_path = loader.path_for(name)?;
    fs::create_dir_all(loader.personas_dir()).context("Failed to create personas directory")?;

    if persona_path.exists() {
        eyre::bail!("Persona '{}' already exists at {}", name, persona_path.display());
    }

    let template = format!(
        r#"# Persona: {name}
# Created by: teamsim persona create {name}

name: {name}

# What this persona wants out of the discussion (not sent to the model)
goal: TODO - describe this persona's goal

# Sent as the system message on every turn
backstory: |
  TODO - describe who this persona is and how they talk

# Optional: use a different model for this persona only
# model: gpt-4o-mini
"#,
        name = name
    );

    fs::write(&persona_path, template).context("Failed to write persona file")?;

    println!("{} Created persona template: {}", "✓".green(), persona_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize the persona", persona_path.display());
    println!("  2. Run {} to verify", format!("teamsim persona show \"{}\"", name).cyan());

    Ok(())
}
