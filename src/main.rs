use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use lesson_quiz::llm::OpenAiClient;
use lesson_quiz::pipeline::{self, Pipeline, Strategy};
use lesson_quiz::sink::{Identity, JsonDirSink};
use lesson_quiz::storage::JsonFileStore;
use lesson_quiz::{Config, GeneratedQuestion};

type AppPipeline = Pipeline<JsonFileStore, OpenAiClient, JsonDirSink>;

/// lesson_quiz: turn lesson PDFs or pasted text into multiple-choice quizzes.
///
/// Local generation is free and offline. AI generation uses your own OpenAI
/// key and is capped by a soft budget kept on this machine.
#[derive(Parser)]
#[command(name = "lesson_quiz")]
#[command(version = "0.1.0")]
#[command(about = "Generate quizzes from lesson PDFs or text", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the lesson text comes from.
#[derive(Args)]
struct LessonInput {
    /// PDF file to extract the lesson from
    #[arg(long, value_name = "FILE", conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Lesson text pasted directly
    #[arg(long, value_name = "TEXT")]
    text: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract plain text from a PDF
    ///
    /// Reads the embedded text layer; falls back to OCR for scanned files.
    Extract {
        #[arg(value_name = "FILE_PATH")]
        file_path: PathBuf,
    },

    /// Estimate the cost of AI generation and check it against the budget
    Estimate {
        #[command(flatten)]
        input: LessonInput,

        /// Number of questions
        #[arg(long, default_value_t = 5)]
        count: usize,
    },

    /// Generate questions, preview them and optionally save the quiz
    Generate {
        #[command(flatten)]
        input: LessonInput,

        /// Number of questions (1-20)
        #[arg(long, default_value_t = 5)]
        count: usize,

        /// Use the AI generator instead of the local heuristic
        #[arg(long)]
        remote: bool,

        /// Quiz title, required with --save
        #[arg(long)]
        title: Option<String>,

        /// Save the generated quiz
        #[arg(long)]
        save: bool,
    },

    /// Show or change the soft AI budget
    Budget {
        #[command(subcommand)]
        action: BudgetAction,
    },

    /// Manage the stored OpenAI key (BYOK)
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand)]
enum BudgetAction {
    /// Print budget and estimated spend
    Show,
    /// Set the budget in USD
    Set {
        #[arg(value_name = "USD")]
        usd: f64,
    },
    /// Reset estimated spend to zero
    Reset,
}

#[derive(Subcommand)]
enum KeyAction {
    /// Store a key (kept only on this machine)
    Set {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// Forget the stored key
    Clear,
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    if let Err(e) = run(cli.command, &config).await {
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn build_pipeline(config: &Config) -> anyhow::Result<AppPipeline> {
    let store = JsonFileStore::open(&config.state_path)
        .with_context(|| format!("Failed to open state at {}", config.state_path.display()))?;
    Ok(Pipeline::new(
        store,
        OpenAiClient::new(&config.remote.base_url),
        JsonDirSink::new(&config.quiz_dir),
        pipeline::standard_extractor(config),
        StdRng::from_entropy(),
        config,
    ))
}

async fn run(command: Commands, config: &Config) -> anyhow::Result<()> {
    let mut app = build_pipeline(config)?;

    match command {
        Commands::Extract { file_path } => {
            let text = extract(&app, &file_path).await?;
            println!("\n{}\n", "=".repeat(60));
            println!("{}", text);
            println!("\n{}", "=".repeat(60));
        }

        Commands::Estimate { input, count } => {
            let text = lesson_text(&app, input).await?;
            let count = pipeline::clamp_count(count);
            let estimate = app.estimate(&text, count);
            let budget = app.budget();

            println!("  Estimated input tokens:  {}", estimate.input_tokens);
            println!("  Estimated output tokens: {}", estimate.output_tokens);
            println!(
                "  Estimated request cost:  ${:.4} (model: {})",
                estimate.usd, config.remote.model
            );
            println!(
                "  Budget: ${:.4}, spent (est.): ${:.4}",
                budget.budget_usd(),
                budget.spent_usd()
            );
            if app.over_budget(&text, count) {
                println!("  Over your soft budget. Increase it or lower question count.");
            } else {
                println!("  Within budget.");
            }
        }

        Commands::Generate {
            input,
            count,
            remote,
            title,
            save,
        } => {
            let text = lesson_text(&app, input).await?;
            let strategy = if remote { Strategy::Remote } else { Strategy::Local };

            println!("  Generating {} questions ({:?})...", pipeline::clamp_count(count), strategy);
            let questions = app.generate(&text, count, strategy).await?;
            print_preview(&questions);

            if strategy == Strategy::Remote {
                println!(
                    "  Spent (est.): ${:.4} of ${:.4}",
                    app.budget().spent_usd(),
                    app.budget().budget_usd()
                );
            }

            if save {
                let identity = config.user.clone().map(|uid| Identity { uid });
                let quiz_id = app
                    .save(identity.as_ref(), title.as_deref().unwrap_or(""), &questions)
                    .await?;
                println!("  Quiz saved with id {}.", quiz_id);
            }
        }

        Commands::Budget { action } => {
            match action {
                BudgetAction::Show => {}
                BudgetAction::Set { usd } => app.set_budget(usd)?,
                BudgetAction::Reset => app.reset_spent()?,
            }
            let budget = app.budget();
            println!("  Budget:        ${:.4}", budget.budget_usd());
            println!("  Spent (est.):  ${:.4}", budget.spent_usd());
            println!("  Remaining:     ${:.4}", budget.remaining_usd());
            println!(
                "  OpenAI key:    {}",
                if app.has_api_key() { "stored" } else { "not set" }
            );
            println!("  Estimated from tokens; may differ from real billing.");
        }

        Commands::Key { action } => match action {
            KeyAction::Set { key } => {
                app.set_api_key(Some(&key))?;
                println!("  Key stored locally.");
            }
            KeyAction::Clear => {
                app.set_api_key(None)?;
                println!("  Key removed.");
            }
        },
    }

    Ok(())
}

async fn extract(app: &AppPipeline, path: &Path) -> anyhow::Result<String> {
    println!("  Extracting text from: {}", path.display());
    let text = app.extract_file(path).await?;
    println!("  Extracted {} characters.", text.chars().count());
    Ok(text)
}

async fn lesson_text(app: &AppPipeline, input: LessonInput) -> anyhow::Result<String> {
    match (input.file, input.text) {
        (Some(path), _) => extract(app, &path).await,
        (None, Some(text)) => Ok(text),
        (None, None) => anyhow::bail!("Pass a lesson with --file <PDF> or --text <TEXT>."),
    }
}

fn print_preview(questions: &[GeneratedQuestion]) {
    println!("\n  Preview ({})\n", questions.len());
    for (i, q) in questions.iter().enumerate() {
        println!("  {}. {}", i + 1, q.prompt());
        for (j, choice) in q.choices().iter().enumerate() {
            let marker = if j == q.answer_index() { "  (answer)" } else { "" };
            println!("     - {}{}", choice, marker);
        }
        println!();
    }
}
