//! Run a simulated discussion

use chrono::{DateTime, Local};
use colored::*;
use eyre::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::io::IsTerminal;
use std::rc::Rc;

use crate::cli::OutputFormat;
use crate::completion::{Completion, Role};
use crate::completion::openai::OpenAiClient;
use crate::config::Config;
use crate::persona::{Persona, PersonaLoader, PersonaProfile};
use crate::simulation::{
    CancelFlag, ConsoleObserver, ConsoleSteering, NoSteering, Outcome, ResponseRecord, Simulation,
    SteeringSource, Transcript, TurnObserver,
};

pub struct RunOptions {
    pub personas: Vec<String>,
    pub prompt: Option<String>,
    pub rounds: Option<usize>,
    pub temperature: Option<f32>,
    pub model: Option<String>,
    pub no_steer: bool,
    pub format: Option<OutputFormat>,
}

/// Machine-readable summary of a run
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    model: &'a str,
    personas: Vec<&'a str>,
    rounds: usize,
    temperature: f32,
    started_at: DateTime<Local>,
    finished_at: DateTime<Local>,
    cancelled: bool,
    transcript_len: usize,
    responses: &'a [ResponseRecord],
    transcript: &'a Transcript,
}

pub fn run(opts: RunOptions, config: &Config) -> Result<()> {
    let format = OutputFormat::resolve(opts.format);

    let mut loader = PersonaLoader::new(config.personas_dir());
    loader.load_all()?;

    let requested = if opts.personas.is_empty() {
        config.simulation.roster.clone()
    } else {
        opts.personas
    };
    let profiles = loader.select(&requested)?;

    let model = opts.model.unwrap_or_else(|| config.completion.model.clone());
    let rounds = opts.rounds.unwrap_or(config.simulation.rounds);
    let temperature = opts
        .temperature
        .or(config.simulation.temperature)
        .unwrap_or(config.completion.temperature);
    let prompt = opts
        .prompt
        .unwrap_or_else(|| config.simulation.opening_prompt.clone());

    let api_key = config.api_key()?;
    let personas = bind_personas(profiles, config, &model, &api_key);

    let cancel = CancelFlag::new();
    install_interrupt_handler(cancel.clone())?;

    let mut steering: Box<dyn SteeringSource> = if !opts.no_steer && std::io::stdin().is_terminal() {
        Box::new(ConsoleSteering::stdin())
    } else {
        log::info!("Steering disabled (--no-steer or stdin is not a terminal)");
        Box::new(NoSteering)
    };
    let mut observer: Box<dyn TurnObserver> = match format {
        OutputFormat::Text => Box::new(ConsoleObserver::stdout()),
        // stdout is reserved for the report
        OutputFormat::Json | OutputFormat::Yaml => Box::new(ConsoleObserver::stderr()),
    };

    if format == OutputFormat::Text {
        println!(
            "{} Simulating {} personas over {} rounds with {} (temperature {})",
            "→".blue(),
            personas.len().to_string().cyan(),
            rounds.to_string().cyan(),
            model.cyan(),
            temperature
        );
        println!("  {}", prompt.dimmed());
    }

    let started_at = Local::now();
    let outcome = Simulation::new(steering.as_mut(), observer.as_mut())
        .with_cancel(cancel)
        .run(&personas, &prompt, rounds, temperature);
    let finished_at = Local::now();

    let report = RunReport {
        model: &model,
        personas: personas.iter().map(|p| p.name()).collect(),
        rounds,
        temperature,
        started_at,
        finished_at,
        cancelled: outcome.cancelled,
        transcript_len: outcome.transcript.len(),
        responses: &outcome.responses,
        transcript: &outcome.transcript,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&report)?),
        OutputFormat::Text => print_summary(&outcome, personas.len(), finished_at - started_at),
    }

    Ok(())
}

/// Attach a client to every profile, sharing one client per distinct model
fn bind_personas(profiles: Vec<PersonaProfile>, config: &Config, model: &str, api_key: &str) -> Vec<Persona> {
    let mut clients: HashMap<String, Rc<dyn Completion>> = HashMap::new();

    profiles
        .into_iter()
        .map(|profile| {
            let persona_model = profile.model.clone().unwrap_or_else(|| model.to_string());
            let client = clients
                .entry(persona_model.clone())
                .or_insert_with(|| {
                    log::debug!("Creating completion client for model {}", persona_model);
                    let client: Rc<dyn Completion> =
                        Rc::new(OpenAiClient::new(config.completion.clone(), api_key).with_model(persona_model));
                    client
                })
                .clone();
            Persona::new(profile, client)
        })
        .collect()
}

/// First Ctrl-C stops after the current turn, a second one exits
fn install_interrupt_handler(cancel: CancelFlag) -> Result<()> {
    ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            std::process::exit(130);
        }
        cancel.cancel();
        eprintln!(
            "\n{} Stopping after the current turn (Ctrl-C again to quit)",
            "⚠".yellow()
        );
    })
    .context("Failed to install Ctrl-C handler")
}

/// User messages after the opening prompt
fn steering_count(transcript: &Transcript) -> usize {
    transcript.iter().skip(1).filter(|m| m.role == Role::User).count()
}

fn print_summary(outcome: &Outcome, persona_count: usize, elapsed: chrono::TimeDelta) {
    println!();
    let icon = if outcome.cancelled { "⚠".yellow() } else { "✓".green() };
    println!(
        "{} {} responses from {} personas, {} steering inputs, transcript length {} ({}s){}",
        icon,
        outcome.responses.len(),
        persona_count,
        steering_count(&outcome.transcript),
        outcome.transcript.len(),
        elapsed.num_seconds(),
        if outcome.cancelled { " - cancelled".yellow().to_string() } else { String::new() }
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, model: Option<&str>) -> PersonaProfile {
        PersonaProfile {
            name: name.to_string(),
            goal: String::new(),
            backstory: "backstory".to_string(),
            model: model.map(String::from),
        }
    }

    #[test]
    fn test_bind_personas_keeps_order() {
        let config = Config::default();
        let personas = bind_personas(
            vec![profile("Client", None), profile("Presenter", Some("gpt-4o")), profile("CAD Designer", None)],
            &config,
            "gpt-4",
            "sk-test",
        );
        let names: Vec<&str> = personas.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["Client", "Presenter", "CAD Designer"]);
    }

    #[test]
    fn test_report_serializes() {
        let mut transcript = Transcript::new();
        transcript.push(crate::completion::Message::user("hello"));
        let responses = vec![ResponseRecord {
            persona: "Client".to_string(),
            round: 0,
            text: "I want it blue".to_string(),
        }];
        let now = Local::now();
        let report = RunReport {
            model: "gpt-4",
            personas: vec!["Client"],
            rounds: 1,
            temperature: 0.7,
            started_at: now,
            finished_at: now,
            cancelled: false,
            transcript_len: transcript.len(),
            responses: &responses,
            transcript: &transcript,
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["responses"][0]["persona"], "Client");
        assert_eq!(value["transcript"][0]["role"], "user");
        assert_eq!(value["transcript_len"], 1);
    }

    #[test]
    fn test_steering_count_skips_opening_prompt() {
        use crate::completion::Message;

        let mut transcript = Transcript::new();
        transcript.push(Message::user("design an alarm clock"));
        transcript.push(Message::assistant("make it round"));
        transcript.push(Message::user("keep it under $30"));
        transcript.push(Message::assistant("then plastic"));

        assert_eq!(steering_count(&transcript), 1);
    }
}
