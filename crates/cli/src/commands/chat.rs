//! `ojisan chat` — Interactive or single-sentence conversation mode.
//!
//! This is the rendering collaborator: it stages keystrokes, signals
//! submit, and re-renders the history the session controller produced.
//! It holds no conversation state of its own.

use ojisan_backends::OpenAiCompatBackend;
use ojisan_config::AppConfig;
use ojisan_core::{Speaker, TextGenerator};
use ojisan_persona::{PromptStrategy, StrategyKind};
use ojisan_session::{SessionController, SubmitOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub async fn run(
    message: Option<String>,
    model_override: Option<String>,
    local: bool,
    transcript: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(model) = model_override {
        config.backend.model = model;
    }
    if local {
        config.backend.kind = "local".into();
    }

    let strategy = build_strategy(&config)?;
    let generator = build_generator(&config)?;

    let mut controller = SessionController::new(strategy, generator);
    if let Some(secs) = config.backend.timeout_secs {
        controller = controller.with_timeout(Duration::from_secs(secs));
    }

    if let Some(text) = message {
        // Single sentence mode
        eprint!("  おじさんっぽく変換中...💦");
        let outcome = controller.submit(&text).await;
        eprint!("\r                            \r");
        match outcome {
            SubmitOutcome::Answered => {
                let reply = &controller.history().last().expect("persona turn").text;
                println!("💬 {reply}");
                write_transcript(&controller, transcript.as_deref())?;
                Ok(())
            }
            SubmitOutcome::IgnoredBlank => Err("Nothing to transform: the input is blank".into()),
            SubmitOutcome::Unanswered(err) => Err(format!("変換に失敗しました: {err}").into()),
            SubmitOutcome::Busy => unreachable!("single-shot mode has no in-flight turn"),
        }
    } else {
        // Interactive mode
        println!();
        println!("  ╔══════════════════════════════════════════════╗");
        println!("  ║       📱 おじさん構文ジェネレーター           ║");
        println!("  ╚══════════════════════════════════════════════╝");
        println!();
        println!("  入力した文章を“おじさん構文”に変換します。");
        println!();
        println!("  Backend:   {} ({})", config.backend.kind, config.backend.model);
        println!("  Strategy:  {}", config.persona.strategy);
        println!();
        println!("  文章を入力して Enter を押してください。");
        println!("  （例：おはよう！今日も頑張ろうね！）");
        println!("  Type 'exit' or Ctrl+C to quit.");
        println!();

        let mut lines = stdin_lines();

        print!("  あなた > ");
        use std::io::Write;
        std::io::stdout().flush()?;

        while let Some(line) = lines.recv().await {
            controller.set_pending_input(&line);

            eprint!("  おじさんっぽく変換中...💦");
            let outcome = controller.submit(&line).await;
            eprint!("\r                            \r");

            match outcome {
                SubmitOutcome::Answered => {
                    let reply = &controller.history().last().expect("persona turn").text;
                    println!();
                    // Preserve literal newlines as separate prefixed lines
                    for reply_line in reply.lines() {
                        println!("  おじさん > 💬 {reply_line}");
                    }
                    println!();
                }
                SubmitOutcome::IgnoredBlank => {}
                SubmitOutcome::Unanswered(err) => {
                    println!();
                    println!("  [エラー] 返事が来ませんでした: {err}");
                    println!();
                }
                SubmitOutcome::Busy => {
                    println!();
                    println!("  [エラー] まだ変換中です");
                    println!();
                }
            }

            print!("  あなた > ");
            std::io::stdout().flush()?;
        }

        println!();
        println!("  またね！👋");
        println!();

        write_transcript(&controller, transcript.as_deref())?;
        Ok(())
    }
}

/// Build the configured prompt strategy, applying sampling overrides.
fn build_strategy(config: &AppConfig) -> Result<PromptStrategy, Box<dyn std::error::Error>> {
    let kind: StrategyKind = config.persona.strategy.parse()?;
    let mut strategy = PromptStrategy::from_kind(kind);

    if let Some(sampling) = config.persona.sampling.clone() {
        strategy = match strategy {
            PromptStrategy::Completion { ruleset } => PromptStrategy::Completion {
                ruleset: ruleset.with_params(sampling),
            },
            PromptStrategy::Chat { ruleset } => PromptStrategy::Chat {
                ruleset: ruleset.with_params(sampling),
            },
        };
    }

    Ok(strategy)
}

/// Build the configured text-generation backend.
fn build_generator(
    config: &AppConfig,
) -> Result<Arc<dyn TextGenerator>, Box<dyn std::error::Error>> {
    match config.backend.kind.as_str() {
        "local" => build_local_generator(&config.backend.model),
        _ => Ok(Arc::new(OpenAiCompatBackend::new(
            "openai",
            &config.backend.base_url,
            config.backend.api_key.clone().unwrap_or_else(|| "EMPTY".into()),
            &config.backend.model,
        ))),
    }
}

#[cfg(feature = "local")]
fn build_local_generator(model: &str) -> Result<Arc<dyn TextGenerator>, Box<dyn std::error::Error>> {
    Ok(Arc::new(ojisan_backends::LocalBackend::new(model)))
}

#[cfg(not(feature = "local"))]
fn build_local_generator(_model: &str) -> Result<Arc<dyn TextGenerator>, Box<dyn std::error::Error>> {
    Err("This build has no local inference support. \
         Rebuild with `--features local`, or point backend.kind at an HTTP endpoint."
        .into())
}

/// Read stdin line by line into a channel, skipping blanks and stopping on
/// exit commands or EOF (Ctrl+D).
fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let stdin = io::stdin();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }

                    if matches!(line.as_str(), "exit" | "quit" | "/exit" | "/quit" | ":q") {
                        break;
                    }

                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break, // EOF (Ctrl+D)
                Err(e) => {
                    tracing::warn!("stdin read failed: {e}");
                    break;
                }
            }
        }
    });

    rx
}

/// Dump the conversation history as JSON, if a path was requested.
fn write_transcript(
    controller: &SessionController,
    path: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(());
    };

    let json = serde_json::to_string_pretty(controller.history())?;
    std::fs::write(path, json)?;

    let (user_turns, persona_turns) = controller.history().iter().fold((0, 0), |(u, p), turn| {
        match turn.speaker {
            Speaker::User => (u + 1, p),
            Speaker::Persona => (u, p + 1),
        }
    });
    println!(
        "  Transcript written to {} ({user_turns} sent, {persona_turns} answered)",
        path.display()
    );

    Ok(())
}
