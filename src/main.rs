//! visa-expert CLI: run visa qualification consultations from a rule file.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use visa_expert::answer::AnswerValue;
use visa_expert::config::EngineConfig;
use visa_expert::engine::Engine;
use visa_expert::knowledge::KnowledgeBase;
use visa_expert::report::{ConsultationResult, StateSnapshot};
use visa_expert::validate;

#[derive(Parser)]
#[command(name = "visa-expert", version, about = "Visa qualification expert system")]
struct Cli {
    /// Engine config (TOML). Defaults apply when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a rule file for duplicates, cycles, orphans and missing goals.
    Check {
        /// Rule file (JSON, or TOML with a `.toml` extension).
        #[arg(long)]
        rules: PathBuf,
    },

    /// List rules in display order.
    Rules {
        #[arg(long)]
        rules: PathBuf,
    },

    /// Run a consultation over stdin or a script of answers.
    Consult {
        #[arg(long)]
        rules: PathBuf,

        /// Initial fact, e.g. `--fact nat_match=yes`. Repeatable.
        #[arg(long = "fact", value_parser = parse_fact)]
        facts: Vec<(String, bool)>,

        /// Read dialogue commands from a file instead of stdin.
        #[arg(long)]
        script: Option<PathBuf>,

        /// Print the result summary and state snapshots as JSON.
        #[arg(long)]
        json: bool,

        /// Consult even when the rule file has integrity errors.
        #[arg(long)]
        force: bool,
    },
}

fn parse_fact(s: &str) -> std::result::Result<(String, bool), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=yes|no, got \"{s}\""))?;
    let parsed = AnswerValue::parse_token(value);
    match (parsed.value, parsed.normalized) {
        (AnswerValue::Yes, false) => Ok((key.trim().to_string(), true)),
        (AnswerValue::No, false) => Ok((key.trim().to_string(), false)),
        _ => Err(format!("initial facts must be yes or no, got \"{value}\"")),
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Check { rules } => {
            let kb = KnowledgeBase::load(&rules)?;
            let issues = validate::check(&kb);
            if issues.is_empty() {
                println!("{}: {} rule(s), no issues.", rules.display(), kb.len());
            } else {
                for issue in &issues {
                    println!("{issue}");
                }
            }
            if validate::has_errors(&issues) {
                miette::bail!("rule file {} has integrity errors", rules.display());
            }
        }

        Commands::Rules { rules } => {
            let kb = KnowledgeBase::load(&rules)?;
            let mut category = None;
            for id in kb.display_order() {
                let rule = kb.rule(id);
                if category != Some(rule.category.as_str()) {
                    let label = if rule.category.is_empty() {
                        "(uncategorized)"
                    } else {
                        rule.category.as_str()
                    };
                    println!("{label}:");
                    category = Some(rule.category.as_str());
                }
                println!("  {}. {rule}", id.index() + 1);
            }
        }

        Commands::Consult {
            rules,
            facts,
            script,
            json,
            force,
        } => {
            let kb = KnowledgeBase::load(&rules)?;
            let issues = validate::check(&kb);
            for issue in &issues {
                eprintln!("{issue}");
            }
            if validate::has_errors(&issues) && !force {
                miette::bail!(
                    "refusing to consult: {} has integrity errors (use --force to override)",
                    rules.display()
                );
            }

            let mut engine = Engine::new(Arc::new(kb), config);
            for (key, value) in &facts {
                engine.seed(key, *value)?;
            }

            let input: Box<dyn BufRead> = match &script {
                Some(path) => Box::new(open_script(path)?),
                None => Box::new(io::stdin().lock()),
            };
            engine.start()?;
            run_dialogue(&mut engine, input, json)?;
        }
    }

    Ok(())
}

fn open_script(path: &Path) -> Result<io::BufReader<std::fs::File>> {
    let file = std::fs::File::open(path).into_diagnostic()?;
    Ok(io::BufReader::new(file))
}

// ---------------------------------------------------------------------------
// Dialogue
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// Answer the current question.
    Answer(String),
    /// `KEY=value`: answer a specific fact.
    AnswerFact(String, String),
    Back(usize),
    Restart,
    State,
    Quit,
}

fn parse_command(line: &str) -> std::result::Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty input".into());
    };
    let command = match head.to_ascii_lowercase().as_str() {
        "back" => {
            let steps = match words.next() {
                Some(n) => n
                    .parse()
                    .map_err(|_| format!("\"{n}\" is not a number of steps"))?,
                None => 1,
            };
            Command::Back(steps)
        }
        "restart" => Command::Restart,
        "state" => Command::State,
        "quit" | "exit" => Command::Quit,
        _ => match head.split_once('=') {
            Some((fact, value)) => Command::AnswerFact(fact.to_string(), value.to_string()),
            None => Command::Answer(head.to_string()),
        },
    };
    Ok(command)
}

fn run_dialogue(engine: &mut Engine, input: Box<dyn BufRead>, json: bool) -> Result<()> {
    let mut lines = input.lines();
    let mut reported = false;

    loop {
        if engine.is_complete() && !reported {
            print_result(&engine.generate_result(), json)?;
            reported = true;
        }
        match engine.current_question() {
            Some(question) => print!("? {question} [yes/no/unknown] > "),
            None => print!("done [back N/restart/state/quit] > "),
        }
        io::stdout().flush().into_diagnostic()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.into_diagnostic()?;
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        let outcome = match command {
            Command::Quit => break,
            Command::State => {
                print_state(&engine.current_state(), json)?;
                continue;
            }
            Command::Restart => {
                engine.restart();
                reported = false;
                continue;
            }
            Command::Back(steps) => engine.go_back(steps).map(|_| {
                reported = false;
            }),
            Command::Answer(token) => match engine.current_question().map(str::to_string) {
                Some(question) => engine.answer_token(&question, &token).map(|o| {
                    if let Some(raw) = o.normalized_from {
                        println!("(\"{raw}\" is not yes/no/unknown; recorded as unknown)");
                    }
                }),
                None => {
                    println!("No question is pending.");
                    continue;
                }
            },
            Command::AnswerFact(fact, token) => {
                engine.answer_token(&fact, &token).map(|_| ())
            }
        };
        if let Err(err) = outcome {
            eprintln!("{:?}", miette::Report::new(err));
        }
    }

    if !reported && engine.is_complete() {
        print_result(&engine.generate_result(), json)?;
    }
    Ok(())
}

fn print_result(result: &ConsultationResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result).into_diagnostic()?);
        return Ok(());
    }

    println!("\nConsultation result:");
    if result.applicable.is_empty() {
        println!("  No applicable visa categories.");
    } else {
        println!("  Applicable:");
        for outcome in &result.applicable {
            println!("    - {} [{}]", outcome.action, outcome.category);
        }
    }
    if !result.conditional.is_empty() {
        println!("  Conditional:");
        for outcome in &result.conditional {
            println!(
                "    - {} [{}] (unknown: {})",
                outcome.action,
                outcome.category,
                outcome.unknown_conditions.join(", ")
            );
        }
    }
    if !result.unknown_answers.is_empty() {
        println!("  Answered unknown: {}", result.unknown_answers.join(", "));
    }
    println!("\nReasoning:");
    for line in &result.reasoning_log {
        println!("  {line}");
    }
    Ok(())
}

fn print_state(state: &StateSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(state).into_diagnostic()?);
        return Ok(());
    }

    println!("Phase: {:?}", state.phase);
    if let Some(question) = &state.current_question {
        println!("Current question: {question}");
    }
    println!("Answers:");
    for entry in &state.answered_history {
        println!("  {} = {}", entry.fact, entry.answer);
    }
    if !state.derived_facts.is_empty() {
        println!("Derived:");
        for (fact, status) in &state.derived_facts {
            println!("  {fact} = {status}");
        }
    }
    println!("Rules:");
    for row in &state.rules_display {
        let conditions: Vec<String> = row
            .conditions
            .iter()
            .map(|c| format!("{}:{}", c.text, c.status))
            .collect();
        println!(
            "  [{}] {} ({} {}) {}",
            row.status,
            row.conclusion,
            row.combinator,
            conditions.join(" "),
            if row.is_goal { "goal" } else { "" }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dialogue_commands() {
        assert_eq!(parse_command("yes"), Ok(Command::Answer("yes".into())));
        assert_eq!(parse_command("back"), Ok(Command::Back(1)));
        assert_eq!(parse_command("BACK 3"), Ok(Command::Back(3)));
        assert_eq!(
            parse_command("inv_ok=no"),
            Ok(Command::AnswerFact("inv_ok".into(), "no".into()))
        );
        assert_eq!(parse_command("quit"), Ok(Command::Quit));
        assert!(parse_command("back two").is_err());
        assert!(parse_command("   ").is_err());
    }

    #[test]
    fn parses_initial_facts() {
        assert_eq!(parse_fact("nat_match=yes"), Ok(("nat_match".into(), true)));
        assert_eq!(parse_fact("inv_ok=No"), Ok(("inv_ok".into(), false)));
        assert!(parse_fact("inv_ok=unknown").is_err());
        assert!(parse_fact("inv_ok").is_err());
    }
}
