use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// 每個隊伍最多兩人
pub const SLOT_CAPACITY: usize = 2;
/// 每場比賽最多兩個隊伍 (雙打)
pub const SLOTS_PER_MATCH: usize = 2;
pub const MATCH_CAPACITY: usize = SLOT_CAPACITY * SLOTS_PER_MATCH;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(SessionId);
uuid_id!(CourtId);
uuid_id!(MatchId);
uuid_id!(SlotId);

/// Opaque participant id handed out by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

/// 技術等級參照 (例如 "intermediate", 2)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub name: String,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub level: Option<Level>,
    #[serde(default)]
    pub games_played: u32,
}

impl Participant {
    pub fn new(id: impl Into<ParticipantId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sex: None,
            level: None,
            games_played: 0,
        }
    }

    pub fn with_sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    pub fn with_level(mut self, name: impl Into<String>, rank: u32) -> Self {
        self.level = Some(Level {
            name: name.into(),
            rank,
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotResult {
    #[serde(rename = "W")]
    Win,
    #[serde(rename = "L")]
    Loss,
}

/// 一個隊伍 (原系統稱為 Partner)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSlot {
    pub id: SlotId,
    pub participants: Vec<ParticipantId>,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default)]
    pub result: Option<SlotResult>,
    pub created_at: DateTime<Utc>,
}

impl TeamSlot {
    pub fn new() -> Self {
        Self {
            id: SlotId::new(),
            participants: Vec::new(),
            score: None,
            result: None,
            created_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= SLOT_CAPACITY
    }

    pub fn contains(&self, participant_id: &ParticipantId) -> bool {
        self.participants.contains(participant_id)
    }
}

impl Default for TeamSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Derived lifecycle of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    Open,
    Ready,
    Active,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended: bool,
    #[serde(default)]
    pub slots: Vec<TeamSlot>,
}

impl Match {
    pub fn new() -> Self {
        Self {
            id: MatchId::new(),
            created_at: Utc::now(),
            started_at: None,
            ended: false,
            slots: Vec::new(),
        }
    }

    pub fn participant_count(&self) -> usize {
        self.slots.iter().map(TeamSlot::len).sum()
    }

    pub fn participants(&self) -> impl Iterator<Item = &ParticipantId> {
        self.slots.iter().flat_map(|slot| slot.participants.iter())
    }

    pub fn contains(&self, participant_id: &ParticipantId) -> bool {
        self.slots.iter().any(|slot| slot.contains(participant_id))
    }

    /// 兩個隊伍都滿員
    pub fn is_full(&self) -> bool {
        self.slots.len() == SLOTS_PER_MATCH && self.slots.iter().all(TeamSlot::is_full)
    }

    pub fn state(&self) -> MatchState {
        if self.ended {
            MatchState::Ended
        } else if !self.is_full() {
            MatchState::Open
        } else if self.started_at.is_some() {
            MatchState::Active
        } else {
            MatchState::Ready
        }
    }
}

impl Default for Match {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Court {
    pub id: CourtId,
    /// `None` 表示預備場地 (staging)，有號碼表示正在使用的實體場地
    #[serde(default, with = "court_number")]
    pub number: Option<u32>,
    #[serde(default)]
    pub matches: Vec<Match>,
    pub created_at: DateTime<Utc>,
}

impl Court {
    pub fn staging() -> Self {
        Self {
            id: CourtId::new(),
            number: None,
            matches: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn active(number: u32) -> Self {
        Self {
            number: Some(number),
            ..Self::staging()
        }
    }

    pub fn is_active(&self) -> bool {
        self.number.is_some()
    }

    pub fn is_staging(&self) -> bool {
        self.number.is_none()
    }

    pub(crate) fn current_match_index(&self) -> Option<usize> {
        self.matches.iter().rposition(|m| !m.ended)
    }

    /// 最後一場尚未結束的比賽
    pub fn current_match(&self) -> Option<&Match> {
        self.current_match_index().map(|idx| &self.matches[idx])
    }

    pub(crate) fn current_match_mut(&mut self) -> Option<&mut Match> {
        self.current_match_index()
            .map(move |idx| &mut self.matches[idx])
    }
}

/// 等候中的參與者，依使用者排序或加入順序
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Queue(pub Vec<ParticipantId>);

impl Queue {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, participant_id: &ParticipantId) -> bool {
        self.0.contains(participant_id)
    }

    pub fn position(&self, participant_id: &ParticipantId) -> Option<usize> {
        self.0.iter().position(|id| id == participant_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticipantId> {
        self.0.iter()
    }
}

impl FromIterator<ParticipantId> for Queue {
    fn from_iter<I: IntoIterator<Item = ParticipantId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn default_true() -> bool {
    true
}

/// Per-session policy switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRules {
    /// 升級後若沒有預備場地，自動新增一個
    #[serde(default = "default_true")]
    pub keep_staging_court: bool,
    /// 比賽結束時清除場地號碼
    #[serde(default = "default_true")]
    pub demote_on_end: bool,
    /// 從進行中的場地拉出參與者時也清除號碼
    #[serde(default)]
    pub demote_on_vacancy: bool,
}

impl Default for SessionRules {
    fn default() -> Self {
        Self {
            keep_staging_court: true,
            demote_on_end: true,
            demote_on_vacancy: false,
        }
    }
}

/// 一次主持的場次 (原系統稱為 Schedule)，擁有所有場地與等候佇列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub(crate) id: SessionId,
    #[serde(default)]
    pub(crate) ended: bool,
    #[serde(default)]
    pub(crate) revision: u64,
    #[serde(default)]
    pub(crate) rules: SessionRules,
    #[serde(default)]
    pub(crate) roster: BTreeMap<ParticipantId, Participant>,
    #[serde(default)]
    pub(crate) queue: Queue,
    #[serde(default)]
    pub(crate) courts: BTreeMap<CourtId, Court>,
    #[serde(default)]
    pub(crate) court_order: Vec<CourtId>,
    pub(crate) created_at: DateTime<Utc>,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn rules(&self) -> &SessionRules {
        &self.rules
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn participant(&self, participant_id: &ParticipantId) -> Option<&Participant> {
        self.roster.get(participant_id)
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.roster.values()
    }

    pub fn court(&self, court_id: &CourtId) -> Option<&Court> {
        self.courts.get(court_id)
    }

    /// 依顯示順序列出場地
    pub fn courts(&self) -> impl Iterator<Item = &Court> {
        self.court_order
            .iter()
            .filter_map(move |id| self.courts.get(id))
    }

    pub fn court_at(&self, index: usize) -> Option<&Court> {
        self.court_order.get(index).and_then(|id| self.courts.get(id))
    }

    pub fn court_count(&self) -> usize {
        self.court_order.len()
    }

    pub fn active_numbers(&self) -> Vec<u32> {
        self.courts().filter_map(|court| court.number).collect()
    }

    /// 參與者目前所在的場地 (只看尚未結束的比賽)
    pub fn seated_court(&self, participant_id: &ParticipantId) -> Option<CourtId> {
        self.courts()
            .find(|court| {
                court
                    .current_match()
                    .is_some_and(|m| m.contains(participant_id))
            })
            .map(|court| court.id)
    }
}

mod court_number {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(number: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match number {
            Some(n) => serializer.serialize_str(&n.to_string()),
            None => serializer.serialize_str(""),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u32),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Raw>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Raw::Int(0)) => Err(D::Error::custom("court number must be positive")),
            Some(Raw::Int(n)) => Ok(Some(n)),
            Some(Raw::Text(text)) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid court number {:?}", text)))
            }
        }
    }
}
