pub mod script;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli_config::CliConfig;

#[cfg(feature = "cli")]
mod cli_config {
    use crate::domain::model::SessionId;
    use crate::utils::error::{AppError, Result};
    use crate::utils::validation::{self, Validate};
    use clap::Parser;
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize, Parser)]
    #[command(name = "court-queue")]
    #[command(about = "Run a live court session: queue players, fill courts, replay host events")]
    pub struct CliConfig {
        #[arg(short, long, default_value = "session.toml", help = "Session TOML configuration")]
        pub config: String,

        #[arg(short, long, help = "Event script (TOML) to replay against the session")]
        pub script: Option<String>,

        #[arg(long, help = "Resume a stored session by id instead of creating a new one")]
        pub resume: Option<String>,

        #[arg(long, help = "Override [storage].state_dir")]
        pub state_dir: Option<String>,

        #[arg(long, help = "Keep everything in memory; nothing is written")]
        pub dry_run: bool,

        #[arg(long, help = "Emit logs as JSON")]
        pub json_logs: bool,

        #[arg(short, long, help = "Enable verbose output")]
        pub verbose: bool,
    }

    impl CliConfig {
        pub fn resume_session_id(&self) -> Result<Option<SessionId>> {
            self.resume
                .as_deref()
                .map(|raw| {
                    Uuid::parse_str(raw)
                        .map(SessionId)
                        .map_err(|e| AppError::InvalidConfigValueError {
                            field: "resume".to_string(),
                            value: raw.to_string(),
                            reason: e.to_string(),
                        })
                })
                .transpose()
        }

        /// CLI 覆寫優先，否則用設定檔的值
        pub fn effective_state_dir<'a>(&'a self, configured: &'a str) -> &'a str {
            self.state_dir.as_deref().unwrap_or(configured)
        }
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            validation::validate_file_extensions(
                "config",
                std::slice::from_ref(&self.config),
                &["toml"],
            )?;
            if let Some(script) = &self.script {
                validation::validate_file_extensions("script", std::slice::from_ref(script), &["toml"])?;
            }
            if let Some(state_dir) = &self.state_dir {
                validation::validate_path("state_dir", state_dir)?;
            }
            self.resume_session_id()?;
            Ok(())
        }
    }

}
