//! services/cli/src/bin/study.rs

use std::io;
use std::sync::Arc;
use study_cli_lib::{
    adapters::{build_study_assistant, JsonFileRepository},
    config::Config,
    error::CliError,
    logging::log_file_appender,
    results_log::ResultsLog,
    session::open_quiz,
    shell::{Console, Shell},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;

    let log_writer = log_file_appender(&config.log_path)?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(log_writer),
        )
        .init();
    info!(
        "Configuration loaded ({}). Questions file: {}",
        config.environment.as_str(),
        config.questions_path.display()
    );

    // --- 2. Initialize Adapters ---
    let repository = Arc::new(JsonFileRepository::new(config.questions_path.clone()));
    let assistant = build_study_assistant(&config);
    let results = ResultsLog::new(config.results_path.clone());

    // --- 3. Load Questions ---
    let (quiz, moved_to) = open_quiz(repository, assistant).await?;
    if let Some(path) = moved_to {
        println!(
            "Warning: the questions file could not be read and was moved to {}.",
            path.display()
        );
        println!("Starting with an empty question collection.");
    }

    // --- 4. Run the Shell ---
    let console = Console::new(io::stdin().lock(), io::stdout());
    let mut shell = Shell::new(console, quiz, results, config.environment);
    shell.run().await
}
