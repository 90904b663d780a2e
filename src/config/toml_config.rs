use crate::domain::model::{Participant, Session, SessionRules, Sex};
use crate::utils::error::{AppError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

const MAX_LEVEL_RANK: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub session: SessionSection,
    #[serde(default)]
    pub rules: SessionRules,
    #[serde(default)]
    pub roster: Vec<RosterEntry>,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSection {
    pub name: String,
    pub description: Option<String>,
    /// 開場時的預備場地數
    #[serde(default = "default_staging_courts")]
    pub staging_courts: usize,
    /// 開場時的編號場地數 (1..=n)
    #[serde(default = "default_active_courts")]
    pub active_courts: usize,
}

/// 名冊項目；`id` 省略時由名字推導
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: Option<String>,
    pub name: String,
    pub sex: Option<Sex>,
    pub level: Option<String>,
    pub rank: Option<u32>,
    pub games_played: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

fn default_staging_courts() -> usize {
    1
}

fn default_active_courts() -> usize {
    1
}

fn default_state_dir() -> String {
    "./sessions".to_string()
}

impl RosterEntry {
    pub fn participant_id(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => self
                .name
                .trim()
                .to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("-"),
        }
    }

    pub fn to_participant(&self) -> Participant {
        let mut participant = Participant::new(self.participant_id(), self.name.trim());
        if let Some(sex) = self.sex {
            participant = participant.with_sex(sex);
        }
        if let Some(level) = &self.level {
            participant = participant.with_level(level.clone(), self.rank.unwrap_or(0));
        }
        participant.games_played = self.games_played.unwrap_or(0);
        participant
    }

    pub(crate) fn validate_entry(&self, field: &str) -> Result<()> {
        validation::validate_non_empty_string(&format!("{}.name", field), &self.name)?;
        if let Some(id) = &self.id {
            validation::validate_non_empty_string(&format!("{}.id", field), id)?;
        }
        if let Some(rank) = self.rank {
            validation::validate_range(&format!("{}.rank", field), rank, 0, MAX_LEVEL_RANK)?;
        }
        Ok(())
    }
}

impl SessionConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("session.name", &self.session.name)?;
        validation::validate_positive_number(
            "session.staging_courts + session.active_courts",
            self.session.staging_courts + self.session.active_courts,
            1,
        )?;
        validation::validate_path("storage.state_dir", &self.storage.state_dir)?;

        for (index, entry) in self.roster.iter().enumerate() {
            entry.validate_entry(&format!("roster[{}]", index))?;
        }

        let ids: Vec<String> = self.roster.iter().map(RosterEntry::participant_id).collect();
        validation::validate_unique("roster.id", ids.iter().map(String::as_str))?;

        Ok(())
    }

    pub fn state_dir(&self) -> &str {
        &self.storage.state_dir
    }

    /// 依配置建立新的場次：先建場地，再把名冊成員依序加入佇列
    pub fn build_session(&self) -> Result<Session> {
        let mut session = Session::with_courts(
            self.rules,
            self.session.staging_courts,
            self.session.active_courts,
        );
        for entry in &self.roster {
            session = session.join(entry.to_participant())?;
        }
        Ok(session)
    }
}

impl Validate for SessionConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

/// 替換環境變數 (例如 ${STATE_DIR})；未設定的變數保持原樣
pub(crate) fn substitute_env_vars(content: &str) -> Result<String> {
    use regex::Regex;
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| AppError::ConfigError {
        message: format!("invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ParticipantId;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[session]
name = "Thursday doubles"

[[roster]]
name = "Ana Lima"
sex = "female"
level = "intermediate"
rank = 3

[[roster]]
id = "p-ben"
name = "Ben"
"#;

    #[test]
    fn test_parse_basic_session_config() {
        let config = SessionConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.session.name, "Thursday doubles");
        assert_eq!(config.session.staging_courts, 1);
        assert_eq!(config.session.active_courts, 1);
        assert!(config.rules.keep_staging_court);
        assert!(config.rules.demote_on_end);
        assert!(!config.rules.demote_on_vacancy);
        assert_eq!(config.state_dir(), "./sessions");
        assert_eq!(config.roster.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_roster_id_derived_from_name() {
        let config = SessionConfig::from_toml_str(BASIC).unwrap();
        assert_eq!(config.roster[0].participant_id(), "ana-lima");
        assert_eq!(config.roster[1].participant_id(), "p-ben");

        let ana = config.roster[0].to_participant();
        assert_eq!(ana.sex, Some(Sex::Female));
        assert_eq!(ana.level.as_ref().map(|l| l.rank), Some(3));
    }

    #[test]
    fn test_build_session_queues_roster_in_order() {
        let config = SessionConfig::from_toml_str(BASIC).unwrap();
        let session = config.build_session().unwrap();

        assert_eq!(session.court_count(), 2);
        assert_eq!(session.active_numbers(), vec![1]);
        let queued: Vec<_> = session.queue().iter().cloned().collect();
        assert_eq!(
            queued,
            vec![ParticipantId::from("ana-lima"), ParticipantId::from("p-ben")]
        );
    }

    #[test]
    fn test_rules_override() {
        let toml_content = r#"
[session]
name = "strict"
staging_courts = 2
active_courts = 0

[rules]
demote_on_vacancy = true
keep_staging_court = false
"#;
        let config = SessionConfig::from_toml_str(toml_content).unwrap();
        assert!(config.rules.demote_on_vacancy);
        assert!(!config.rules.keep_staging_court);
        assert!(config.rules.demote_on_end);

        let session = config.build_session().unwrap();
        assert_eq!(session.court_count(), 2);
        assert!(session.active_numbers().is_empty());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("COURT_QUEUE_TEST_STATE_DIR", "/tmp/court-queue-state");
        let toml_content = r#"
[session]
name = "env"

[storage]
state_dir = "${COURT_QUEUE_TEST_STATE_DIR}"
"#;
        let config = SessionConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.state_dir(), "/tmp/court-queue-state");
        std::env::remove_var("COURT_QUEUE_TEST_STATE_DIR");
    }

    #[test]
    fn test_unset_env_var_kept_verbatim() {
        let substituted = substitute_env_vars("dir = \"${COURT_QUEUE_SURELY_UNSET_VAR}\"").unwrap();
        assert_eq!(substituted, "dir = \"${COURT_QUEUE_SURELY_UNSET_VAR}\"");
    }

    #[test]
    fn test_duplicate_roster_ids_rejected() {
        let toml_content = r#"
[session]
name = "dupes"

[[roster]]
name = "Ana"

[[roster]]
id = "ana"
name = "Another Ana"
"#;
        let config = SessionConfig::from_toml_str(toml_content).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AppError::InvalidConfigValueError { ref field, .. } if field == "roster.id"));
    }

    #[test]
    fn test_no_courts_rejected() {
        let toml_content = r#"
[session]
name = "empty"
staging_courts = 0
active_courts = 0
"#;
        let config = SessionConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rank_out_of_range_rejected() {
        let toml_content = r#"
[session]
name = "ranks"

[[roster]]
name = "Ana"
level = "pro"
rank = 42
"#;
        let config = SessionConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_toml_error() {
        let err = SessionConfig::from_toml_str("[session\nname = 1").unwrap_err();
        assert!(matches!(err, AppError::TomlError(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = SessionConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.session.name, "Thursday doubles");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SessionConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, AppError::IoError(_)));
    }
}
