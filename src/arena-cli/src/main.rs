//! Debate Arena CLI
//!
//! Runs a two-model debate from the terminal, either on a timer or one turn
//! at a time, and prints a scoreboard at the end.

use std::env;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser};
use colored::Colorize;
use debate_arena_core::{
    AIParticipant, Config, DebateConfig, DebateError, DebateEvent, DebateOrchestrator,
    OpenAiGenerator, SchedulerStatus, Speaker, SpeakerPair, default_config,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

type Input = Lines<BufReader<Stdin>>;

#[derive(Parser)]
#[command(
    name = "debate-arena",
    version,
    about = "AI Debate Arena - Watch two AI models argue a topic",
    long_about = "Runs a scored debate between two models on any OpenAI-compatible API (OpenRouter by default)."
)]
struct Cli {
    /// The topic to debate
    #[arg(value_name = "TOPIC")]
    topic: String,

    /// Model for each side: the first argues for, the second against
    #[arg(short, long, action = ArgAction::Append, value_name = "MODEL")]
    model: Vec<String>,

    /// Display names, in the same order as the models
    #[arg(long, action = ArgAction::Append, value_name = "NAME")]
    name: Vec<String>,

    /// Number of rounds (one turn per side each)
    #[arg(short, long, value_name = "ROUNDS")]
    rounds: Option<u32>,

    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Pause between turns in auto mode
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Wait for Enter before each turn
    #[arg(long)]
    manual: bool,

    /// Turn off automatic argument scoring
    #[arg(long)]
    no_scoring: bool,

    /// Write the transcript here (.md for Markdown, anything else JSON)
    #[arg(long, value_name = "PATH")]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };
    if let Ok(api_base) = env::var("OPENAI_API_BASE") {
        config.provider.api_base = api_base;
    }

    let api_key = resolve_api_key(|name| env::var(name).ok()).unwrap_or_else(|| {
        tracing::warn!("OPENROUTER_API_KEY not set, API calls may fail");
        String::new()
    });

    if cli.model.len() != 2 {
        eprintln!(
            "{} A debate needs exactly 2 models, but {} were provided.",
            "Error:".red().bold(),
            cli.model.len()
        );
        eprintln!(
            "Usage: debate-arena \"{}\" -m anthropic/claude-3.5-sonnet -m openai/gpt-4o-mini",
            cli.topic
        );
        std::process::exit(1);
    }

    let default_names = ["Model 1", "Model 2"];
    let participant = |speaker: Speaker, i: usize| {
        let name = cli
            .name
            .get(i)
            .cloned()
            .unwrap_or_else(|| default_names[i].to_string());
        AIParticipant::for_slot(speaker, name, cli.model[i].clone())
    };
    let participants = SpeakerPair::new(
        participant(Speaker::Model1, 0),
        participant(Speaker::Model2, 1),
    );

    let mut debate_config = DebateConfig::from_config(&cli.topic, &config);
    if let Some(rounds) = cli.rounds {
        debate_config = debate_config.with_max_rounds(rounds);
    }
    if let Some(delay) = cli.delay_ms {
        debate_config = debate_config.with_auto_delay(Duration::from_millis(delay));
    }
    if cli.no_scoring {
        debate_config = debate_config.with_auto_scoring(false);
    }
    let max_rounds = debate_config.max_rounds;

    let generator =
        OpenAiGenerator::new(&api_key, config.provider.clone(), config.prompts.clone())?;
    let orchestrator =
        DebateOrchestrator::new(debate_config, participants.clone(), Arc::new(generator))?
            .with_callback(create_console_callback(participants.clone()));

    print_header(&cli.topic, &participants, max_rounds);

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    if cli.manual {
        run_manual(&orchestrator, &mut input).await?;
    } else {
        run_auto(&orchestrator, &mut input).await?;
    }

    print_scoreboard(&orchestrator);

    if let Some(path) = &cli.export {
        export_transcript(&orchestrator, path)?;
        println!("{} {}", "Transcript written to".dimmed(), path.display());
    }

    Ok(())
}

/// First non-empty key, OpenRouter's variable before the OpenAI one.
fn resolve_api_key(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    ["OPENROUTER_API_KEY", "OPENAI_API_KEY"]
        .into_iter()
        .filter_map(&lookup)
        .find(|key| !key.trim().is_empty())
}

/// Let the scheduler pace the debate, stopping to ask on failures.
async fn run_auto(
    orchestrator: &DebateOrchestrator,
    input: &mut Input,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut status = orchestrator.subscribe();
    loop {
        // A failed first turn shows up as an Error status below.
        if let Err(e) = orchestrator.start_auto().await {
            if !orchestrator.status().is_settled() {
                return Err(e.into());
            }
        }

        let settled = status.wait_for(SchedulerStatus::is_settled).await?.clone();
        match settled {
            SchedulerStatus::Error { .. } => {
                if !recover(orchestrator, input).await? {
                    return Ok(());
                }
            }
            _ => return Ok(()),
        }
    }
}

/// One turn per Enter press.
async fn run_manual(
    orchestrator: &DebateOrchestrator,
    input: &mut Input,
) -> Result<(), Box<dyn std::error::Error>> {
    while !orchestrator.state().is_complete() {
        match prompt(input, "Press Enter for the next turn (q to stop): ").await? {
            Some(line) if !line.trim().eq_ignore_ascii_case("q") => {}
            _ => return Ok(()),
        }

        if let Err(e) = orchestrator.next_turn().await {
            if !matches!(e, DebateError::GenerationFailure(_)) {
                return Err(e.into());
            }
            if !recover(orchestrator, input).await? {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Offer retries until one succeeds, the user declines, or the budget runs
/// out. Returns whether the debate can go on.
async fn recover(
    orchestrator: &DebateOrchestrator,
    input: &mut Input,
) -> Result<bool, Box<dyn std::error::Error>> {
    loop {
        let answer = prompt(input, "Retry? [Y/n] ").await?;
        let retry = answer
            .map(|a| !a.trim().to_lowercase().starts_with('n'))
            .unwrap_or(false);
        if !retry {
            return Ok(false);
        }

        match orchestrator.retry().await {
            Ok(_) => return Ok(true),
            Err(DebateError::GenerationFailure(_)) => continue,
            Err(DebateError::RetryExhausted { .. }) => return Ok(false),
            Err(e) => return Err(e.into()),
        }
    }
}

async fn prompt(input: &mut Input, message: &str) -> std::io::Result<Option<String>> {
    print!("{}", message.bold());
    std::io::stdout().flush()?;
    input.next_line().await
}

fn print_header(topic: &str, participants: &SpeakerPair<AIParticipant>, max_rounds: u32) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - {} rounds", "AI Debate Arena".bold(), max_rounds)
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), topic.bright_white());
    println!();
    println!("{}", "Participants:".bold());
    for (i, speaker) in Speaker::BOTH.into_iter().enumerate() {
        let p = participants.get(speaker);
        println!(
            "  {}. {} ({}) - using {}",
            i + 1,
            p.name.bright_cyan(),
            p.stance.display_name().yellow(),
            p.model.dimmed()
        );
    }
    println!();
    println!("{}", "─".repeat(70).dimmed());
}

/// Create a callback that prints debate events to the console.
fn create_console_callback(
    participants: SpeakerPair<AIParticipant>,
) -> Box<dyn Fn(DebateEvent) + Send + Sync> {
    Box::new(move |event| match event {
        DebateEvent::SpeakerStart {
            speaker,
            name,
            round,
        } => {
            println!(
                "{} {} {} {}",
                "▶".bright_cyan(),
                name.bright_cyan().bold(),
                format!("({})", participants.get(speaker).stance.display_name()).yellow(),
                format!("round {}", round).dimmed()
            );
        }
        DebateEvent::SpeakerMessage { name: _, message } => {
            let wrapped = textwrap(&message.content, 66);
            for line in wrapped.lines() {
                println!("  {}", line);
            }
            println!();
        }
        DebateEvent::ArgumentScored { speaker, score } => {
            println!(
                "  {} {} {}",
                "Score:".dimmed(),
                format!("{:.1}/10", score.total_score).bright_green(),
                format!("({}) {}", participants.get(speaker).name, score.feedback).dimmed()
            );
            println!("{}", "─".repeat(70).dimmed());
        }
        DebateEvent::GenerationFailed {
            speaker,
            round,
            reason,
            retries_left,
        } => {
            eprintln!(
                "{} {} failed in round {}: {} ({} retries left)",
                "Error:".red().bold(),
                participants.get(speaker).name,
                round,
                reason,
                retries_left
            );
        }
        DebateEvent::RetryExhausted { reason } => {
            eprintln!("{} {}", "Giving up:".red().bold(), reason);
        }
        DebateEvent::DebateEnd | DebateEvent::Reset => {
            // Handled in main
        }
    })
}

fn print_scoreboard(orchestrator: &DebateOrchestrator) {
    let state = orchestrator.state();
    let analytics = orchestrator.analytics();
    let participants = orchestrator.participants();

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    let headline = if state.is_complete() {
        "  Debate concluded."
    } else {
        "  Debate stopped."
    };
    println!("{}", headline.bright_green().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!(
        "{} {} of {} ({:.0}%)",
        "Rounds:".bold(),
        state.current_round,
        state.max_rounds,
        state.progress()
    );

    for speaker in Speaker::BOTH {
        let p = participants.get(speaker);
        println!();
        println!(
            "{} {} - {} rounds won",
            p.name.bright_cyan().bold(),
            format!("{}/100", state.scores.get(speaker)).bright_white(),
            analytics.rounds_won(speaker)
        );
        if analytics.scored_messages > 0 {
            let averages = analytics.average_scores.get(speaker);
            let line = averages
                .named()
                .iter()
                .map(|(name, value)| format!("{} {:.1}", name, value))
                .collect::<Vec<_>>()
                .join(", ");
            println!("  {}", line.dimmed());
        }
        if let Some(best) = analytics.strongest_arguments.get(speaker) {
            println!(
                "  {} round {} ({:.1}/10)",
                "Strongest argument:".dimmed(),
                best.round,
                best.total_score
            );
        }
    }

    println!();
    let verdict = match state.leader().winner() {
        Some(speaker) => format!(
            "Winner: {} (margin {:.1})",
            participants.get(speaker).name,
            analytics.winner_margin
        ),
        None => "Result: tie".to_string(),
    };
    println!("{}", verdict.bright_green().bold());
    println!();
}

fn export_transcript(
    orchestrator: &DebateOrchestrator,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let transcript = orchestrator.transcript();
    let body = match path.extension().and_then(|e| e.to_str()) {
        Some("md") => transcript.to_markdown(),
        _ => transcript.to_json()?,
    };
    std::fs::write(path, body)?;
    tracing::info!(
        path = %path.display(),
        turns = transcript.turns.len(),
        "transcript exported"
    );
    Ok(())
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();

    for paragraph in text.split('\n') {
        if !result.is_empty() {
            result.push('\n');
        }
        let mut current_line_len = 0;
        for word in paragraph.split_whitespace() {
            if current_line_len + word.len() + 1 > width && current_line_len > 0 {
                result.push('\n');
                current_line_len = 0;
            }
            if current_line_len > 0 {
                result.push(' ');
                current_line_len += 1;
            }
            result.push_str(word);
            current_line_len += word.len();
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textwrap_keeps_paragraphs() {
        let wrapped = textwrap("one two three\nfour", 7);
        assert_eq!(wrapped, "one two\nthree\nfour");
    }

    #[test]
    fn test_api_key_prefers_openrouter() {
        let both = |name: &str| match name {
            "OPENROUTER_API_KEY" => Some("sk-or-1".to_string()),
            "OPENAI_API_KEY" => Some("sk-2".to_string()),
            _ => None,
        };
        assert_eq!(resolve_api_key(both).as_deref(), Some("sk-or-1"));

        let blank_openrouter = |name: &str| match name {
            "OPENROUTER_API_KEY" => Some("  ".to_string()),
            "OPENAI_API_KEY" => Some("sk-2".to_string()),
            _ => None,
        };
        assert_eq!(resolve_api_key(blank_openrouter).as_deref(), Some("sk-2"));

        assert_eq!(resolve_api_key(|_| None), None);
    }

    #[tokio::test]
    async fn test_export_picks_format_from_extension() {
        struct Quiet;

        #[async_trait::async_trait]
        impl debate_arena_core::ArgumentGenerator for Quiet {
            async fn generate(
                &self,
                _request: &debate_arena_core::GenerationRequest,
            ) -> Result<String, DebateError> {
                Ok("Short and sweet.".to_string())
            }
        }

        let participants = SpeakerPair::new(
            AIParticipant::for_slot(Speaker::Model1, "Ada", "a/one"),
            AIParticipant::for_slot(Speaker::Model2, "Bob", "b/two"),
        );
        let orchestrator =
            DebateOrchestrator::new(DebateConfig::new("Tabs", 1), participants, Arc::new(Quiet))
                .unwrap();
        orchestrator.next_turn().await.unwrap();

        let dir = env::temp_dir().join(format!("debate-arena-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let md = dir.join("debate.md");
        export_transcript(&orchestrator, &md).unwrap();
        assert!(std::fs::read_to_string(&md).unwrap().starts_with("# Tabs"));

        let json = dir.join("debate.json");
        export_transcript(&orchestrator, &json).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(value["topic"], "Tabs");
        assert_eq!(value["turns"].as_array().unwrap().len(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_cli_collects_two_models() {
        let cli = Cli::try_parse_from([
            "debate-arena",
            "Cats vs dogs",
            "-m",
            "a/one",
            "-m",
            "b/two",
            "--name",
            "Ada",
            "-r",
            "2",
            "--manual",
        ])
        .unwrap();
        assert_eq!(cli.model, vec!["a/one", "b/two"]);
        assert_eq!(cli.name, vec!["Ada"]);
        assert_eq!(cli.rounds, Some(2));
        assert!(cli.manual);
        assert!(!cli.no_scoring);
    }
}
