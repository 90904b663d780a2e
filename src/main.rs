use clap::Parser;
use court_queue::core::query::{self, CourtMode};
use court_queue::domain::ports::SessionStore;
use court_queue::utils::error::{AppError, ErrorSeverity};
use court_queue::utils::{logger, validation::Validate};
use court_queue::{
    CliConfig, EventScript, JsonFileStore, MemoryStore, ScriptStep, Session, SessionConfig,
    SessionEngine,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting court-queue CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = run(&config).await {
        tracing::error!(
            "❌ Session run failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };

        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn run(config: &CliConfig) -> court_queue::Result<()> {
    config.validate()?;

    if !std::path::Path::new(&config.config).exists() {
        return Err(AppError::MissingConfigError {
            field: format!("config ({})", config.config),
        });
    }
    let session_config = SessionConfig::from_file(&config.config)?;
    session_config.validate()?;
    tracing::info!("📋 Loaded session config '{}'", session_config.session.name);

    let script = match &config.script {
        Some(path) => {
            let script = EventScript::from_file(path)?;
            script.validate()?;
            tracing::info!("🎬 Loaded {} scripted event(s) from {}", script.len(), path);
            script
        }
        None => EventScript::default(),
    };

    if config.dry_run {
        tracing::info!("🧪 Dry run: session state stays in memory");
        drive(config, &session_config, &script, MemoryStore::new()).await
    } else {
        let state_dir = config.effective_state_dir(session_config.state_dir());
        tracing::info!("💾 Persisting session state under {}", state_dir);
        drive(config, &session_config, &script, JsonFileStore::new(state_dir)).await
    }
}

async fn drive<S: SessionStore>(
    config: &CliConfig,
    session_config: &SessionConfig,
    script: &EventScript,
    store: S,
) -> court_queue::Result<()> {
    let mut engine = match config.resume_session_id()? {
        Some(session_id) => {
            tracing::info!("🔄 Resuming session {}", session_id);
            SessionEngine::open(store, session_id).await?
        }
        None => {
            let session = session_config.build_session()?;
            tracing::info!("🆕 Created session {}", session.id());
            SessionEngine::create(store, session).await?
        }
    };

    let mut rejected = 0usize;
    for (index, event) in script.events.iter().enumerate() {
        let step = event.resolve(index, engine.session())?;
        let outcome = match step {
            ScriptStep::Apply(command) => engine.dispatch(command).await,
            ScriptStep::Undo => engine.undo().await,
        };

        match outcome {
            Ok(_) => {}
            // 主持人操作被拒絕時不中斷重播
            Err(AppError::Engine(e)) => {
                rejected += 1;
                tracing::warn!("⚠️ Event #{} skipped: {}", index, e);
            }
            Err(e) => return Err(e),
        }
    }

    if !script.is_empty() {
        tracing::info!(
            "✅ Replayed {} event(s), {} rejected",
            script.len(),
            rejected
        );
    }

    print_summary(engine.session());
    Ok(())
}

fn print_summary(session: &Session) {
    println!("Session {} (revision {})", session.id(), session.revision());
    if session.is_ended() {
        println!("  status: ended");
    }

    for (index, court) in session.courts().enumerate() {
        let label = match court.number {
            Some(number) => format!("Court {}", number),
            None => "Staging".to_string(),
        };
        let mode = match query::court_mode(court) {
            CourtMode::PreGame => "pre-game",
            CourtMode::InGame => "in-game",
            CourtMode::PostGame => "post-game",
        };
        let teams: Vec<String> = court
            .current_match()
            .map(|current| {
                current
                    .slots
                    .iter()
                    .map(|slot| {
                        slot.participants
                            .iter()
                            .map(|id| display_name(session, id))
                            .collect::<Vec<_>>()
                            .join(" & ")
                    })
                    .collect()
            })
            .unwrap_or_default();

        if teams.is_empty() {
            println!("  [{}] {} ({})", index, label, mode);
        } else {
            println!("  [{}] {} ({}): {}", index, label, mode, teams.join(" vs "));
        }
    }

    let waiting: Vec<String> = query::waiting_participants(session)
        .into_iter()
        .map(|participant| format!("{} ({} games)", participant.name, participant.games_played))
        .collect();
    if waiting.is_empty() {
        println!("  queue: empty");
    } else {
        println!("  queue: {}", waiting.join(", "));
    }
}

fn display_name(session: &Session, id: &court_queue::ParticipantId) -> String {
    session
        .participant(id)
        .map(|participant| participant.name.clone())
        .unwrap_or_else(|| id.to_string())
}
