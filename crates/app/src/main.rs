mod repl;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use exam_core::model::{
    CustomConfig, Difficulty, EXAM_PRESETS, GenerationConfig, LengthClass, PresetConfig,
    QuestionFormat,
};
use services::config::parse_base_url;
use services::{ExamController, ServiceConfig, logging};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidValue { flag: &'static str, raw: String },
    MissingName,
    MissingPreset,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::MissingName => write!(f, "custom tests need --name"),
            ArgsError::MissingPreset => write!(f, "preset tests need a preset id (e.g. GRE)"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: std::str::FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidValue { flag, raw })
}

fn parse_positive(flag: &'static str, raw: String) -> Result<u64, ArgsError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ArgsError::InvalidValue { flag, raw }),
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  exam presets");
    eprintln!("  exam preset <ID> [--length quick|standard|endurance] [--difficulty <level>] [options]");
    eprintln!("  exam custom --name <NAME> [--questions <n>] [--format objective|subjective|mixed]");
    eprintln!("              [--topic <topic>]... [--duration <minutes>] [--difficulty <level>] [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --syllabus <file>        send syllabus text with the request");
    eprintln!("  --extract-topics         ask the service for the syllabus topics first");
    eprintln!("  --base-url <url>         service base URL");
    eprintln!("  --api-key <key>          bearer token for the services");
    eprintln!("  --poll-interval-ms <n>   grading poll interval");
    eprintln!("  --log <filter>           log filter when RUST_LOG is unset (default: warn)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_API_BASE_URL, EXAM_API_KEY, EXAM_POLL_INTERVAL_MS, EXAM_POLL_MAX_ATTEMPTS,");
    eprintln!("  EXAM_HTTP_TIMEOUT_SECS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Presets,
    Preset,
    Custom,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "presets" => Some(Self::Presets),
            "preset" => Some(Self::Preset),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct ServiceOverrides {
    base_url: Option<String>,
    api_key: Option<String>,
    poll_interval_ms: Option<u64>,
}

impl ServiceOverrides {
    fn apply(self, config: &mut ServiceConfig) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(raw) = self.base_url {
            config.base_url = parse_base_url("--base-url", &raw)?;
        }
        if let Some(key) = self.api_key {
            config.api_key = Some(key);
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll.interval = Duration::from_millis(ms);
        }
        Ok(())
    }
}

struct Args {
    generation: GenerationConfig,
    syllabus: Option<PathBuf>,
    extract_topics: bool,
    log: String,
    overrides: ServiceOverrides,
}

#[derive(Default)]
struct Draft {
    preset: Option<String>,
    length: Option<LengthClass>,
    difficulty: Difficulty,
    name: Option<String>,
    questions: Option<u32>,
    format: QuestionFormat,
    topics: Vec<String>,
    duration: Option<u32>,
}

impl Args {
    fn parse(cmd: Command, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut draft = Draft::default();
        let mut syllabus = None;
        let mut extract_topics = false;
        let mut log = "warn".to_string();
        let mut overrides = ServiceOverrides::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--length" => {
                    let value = require_value(args, "--length")?;
                    draft.length = Some(match value.as_str() {
                        "quick" => LengthClass::Quick,
                        "standard" => LengthClass::Standard,
                        "endurance" => LengthClass::Endurance,
                        _ => return Err(ArgsError::InvalidValue { flag: "--length", raw: value }),
                    });
                }
                "--difficulty" => {
                    let value = require_value(args, "--difficulty")?;
                    draft.difficulty = match value.as_str() {
                        "easy" => Difficulty::Easy,
                        "standard" => Difficulty::Standard,
                        "hard" => Difficulty::Hard,
                        _ => {
                            return Err(ArgsError::InvalidValue {
                                flag: "--difficulty",
                                raw: value,
                            });
                        }
                    };
                }
                "--name" => draft.name = Some(require_value(args, "--name")?),
                "--questions" => {
                    let value = require_value(args, "--questions")?;
                    draft.questions = Some(parse_number("--questions", value)?);
                }
                "--format" => {
                    let value = require_value(args, "--format")?;
                    draft.format = match value.as_str() {
                        "objective" => QuestionFormat::Objective,
                        "subjective" => QuestionFormat::Subjective,
                        "mixed" => QuestionFormat::Mixed,
                        _ => return Err(ArgsError::InvalidValue { flag: "--format", raw: value }),
                    };
                }
                "--topic" => draft.topics.push(require_value(args, "--topic")?),
                "--duration" => {
                    let value = require_value(args, "--duration")?;
                    draft.duration = Some(parse_number("--duration", value)?);
                }
                "--syllabus" => syllabus = Some(PathBuf::from(require_value(args, "--syllabus")?)),
                "--extract-topics" => extract_topics = true,
                "--base-url" => overrides.base_url = Some(require_value(args, "--base-url")?),
                "--api-key" => overrides.api_key = Some(require_value(args, "--api-key")?),
                "--poll-interval-ms" => {
                    let value = require_value(args, "--poll-interval-ms")?;
                    overrides.poll_interval_ms = Some(parse_positive("--poll-interval-ms", value)?);
                }
                "--log" => log = require_value(args, "--log")?,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if cmd == Command::Preset && draft.preset.is_none() && !arg.starts_with('-') => {
                    draft.preset = Some(arg);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let generation = match cmd {
            Command::Preset => GenerationConfig::Preset(PresetConfig {
                preset: draft.preset.ok_or(ArgsError::MissingPreset)?,
                difficulty: draft.difficulty,
                length: Some(draft.length.unwrap_or_default()),
            }),
            Command::Custom | Command::Presets => GenerationConfig::Custom(CustomConfig {
                name: draft.name.ok_or(ArgsError::MissingName)?,
                difficulty: draft.difficulty,
                question_count: draft.questions.unwrap_or(10),
                format: draft.format,
                topics: draft.topics,
                duration_minutes: draft.duration,
            }),
        };

        Ok(Self {
            generation,
            syllabus,
            extract_topics,
            log,
            overrides,
        })
    }
}

fn print_presets() {
    for preset in EXAM_PRESETS {
        println!("{:<6} {}", preset.id, preset.topics.join(", "));
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if cmd == Command::Presets {
        print_presets();
        return Ok(());
    }

    let mut iter = argv.into_iter().skip(1);
    let parsed = Args::parse(cmd, &mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    logging::init(&parsed.log);

    let mut config = ServiceConfig::from_env()?;
    parsed.overrides.apply(&mut config)?;
    tracing::debug!(base_url = %config.base_url, "service configuration loaded");

    let mut controller = ExamController::from_config(&config)?;
    controller.configure(parsed.generation)?;
    if let Some(path) = &parsed.syllabus {
        let text = std::fs::read_to_string(path)?;
        controller.attach_syllabus(&text)?;
    }

    repl::run(&mut controller, parsed.extract_topics).await
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(cmd: Command, args: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|arg| (*arg).to_string());
        Args::parse(cmd, &mut iter)
    }

    #[test]
    fn preset_defaults_to_standard_length() {
        let args = parse(Command::Preset, &["gre", "--difficulty", "hard"]).unwrap();
        let GenerationConfig::Preset(preset) = args.generation else {
            panic!("expected preset configuration");
        };
        assert_eq!(preset.preset, "gre");
        assert_eq!(preset.length, Some(LengthClass::Standard));
        assert_eq!(preset.difficulty, Difficulty::Hard);
    }

    #[test]
    fn custom_collects_topics() {
        let args = parse(
            Command::Custom,
            &["--name", "Biology", "--topic", "Cells", "--topic", "Genetics", "--duration", "20"],
        )
        .unwrap();
        let GenerationConfig::Custom(custom) = args.generation else {
            panic!("expected custom configuration");
        };
        assert_eq!(custom.topics, ["Cells", "Genetics"]);
        assert_eq!(custom.duration_minutes, Some(20));
        assert_eq!(custom.question_count, 10);
    }

    #[test]
    fn custom_requires_name() {
        assert!(matches!(parse(Command::Custom, &[]), Err(ArgsError::MissingName)));
    }

    #[test]
    fn bad_values_are_reported() {
        assert!(matches!(
            parse(Command::Custom, &["--name", "x", "--questions", "many"]),
            Err(ArgsError::InvalidValue { flag: "--questions", .. })
        ));
        assert!(matches!(
            parse(Command::Preset, &["SAT", "--length"]),
            Err(ArgsError::MissingValue { flag: "--length" })
        ));
        assert!(matches!(
            parse(Command::Preset, &["SAT", "ACT"]),
            Err(ArgsError::UnknownArg(_))
        ));
    }

    #[test]
    fn poll_interval_must_be_positive() {
        assert!(matches!(
            parse(Command::Preset, &["GRE", "--poll-interval-ms", "0"]),
            Err(ArgsError::InvalidValue { flag: "--poll-interval-ms", .. })
        ));
        let args = parse(Command::Preset, &["GRE", "--poll-interval-ms", "500"]).unwrap();
        assert_eq!(args.overrides.poll_interval_ms, Some(500));
    }
}
