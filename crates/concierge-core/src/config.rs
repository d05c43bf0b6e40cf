//! Concierge configuration system.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConciergeError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConciergeConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub leads: LeadsConfig,
    #[serde(default)]
    pub visits: VisitsConfig,
    #[serde(default)]
    pub records: RecordsConfig,
}

fn default_provider() -> String { "openai".into() }
fn default_model() -> String { "gpt-4o-mini".into() }
fn default_temperature() -> f32 { 0.3 }

impl Default for ConciergeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            knowledge: KnowledgeConfig::default(),
            agent: AgentConfig::default(),
            leads: LeadsConfig::default(),
            visits: VisitsConfig::default(),
            records: RecordsConfig::default(),
        }
    }
}

impl ConciergeConfig {
    /// Load config from the default path (~/.concierge/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::info!("📋 No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConciergeError::Config(format!("Failed to read config: {e}")))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ConciergeError::Config(format!("Failed to parse config: {e}")))
    }

    /// Save config to a specific path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConciergeError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Concierge home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".concierge")
    }

    /// Provider name: `[llm].provider` wins over the legacy top-level field.
    pub fn llm_provider(&self) -> &str {
        if self.llm.provider.is_empty() {
            &self.default_provider
        } else {
            &self.llm.provider
        }
    }

    pub fn llm_model(&self) -> &str {
        if self.llm.model.is_empty() {
            &self.default_model
        } else {
            &self.llm.model
        }
    }

    /// Check parameters that would otherwise fail deep inside a build.
    pub fn validate(&self) -> Result<()> {
        let kb = &self.knowledge;
        if kb.chunk_size == 0 {
            return Err(ConciergeError::Config("knowledge.chunk_size must be > 0".into()));
        }
        if kb.chunk_overlap >= kb.chunk_size {
            return Err(ConciergeError::Config(format!(
                "knowledge.chunk_overlap ({}) must be smaller than chunk_size ({})",
                kb.chunk_overlap, kb.chunk_size
            )));
        }
        if kb.max_top_k == 0 {
            return Err(ConciergeError::Config("knowledge.max_top_k must be >= 1".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConciergeError::Config("embedding.batch_size must be >= 1".into()));
        }
        if self.visits.slot_minutes <= 0 {
            return Err(ConciergeError::Config("visits.slot_minutes must be > 0".into()));
        }
        self.visits.datetime.offset()?;
        Ok(())
    }
}

/// Expand `~` and `$VAR` / `${VAR}` in a configured path. An unset variable
/// leaves the path with only `~` expanded.
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            tracing::warn!("⚠️ Could not expand {path}: {e}");
            PathBuf::from(shellexpand::tilde(path).as_ref())
        }
    }
}

/// Completion provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Providers tried in order when the primary fails.
    #[serde(default)]
    pub fallbacks: Vec<String>,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_max_tokens() -> u32 { 800 }
fn default_http_timeout() -> u64 { 60 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: String::new(),
            model: String::new(),
            endpoint: String::new(),
            api_key: String::new(),
            max_tokens: default_max_tokens(),
            fallbacks: vec![],
            timeout_secs: default_http_timeout(),
        }
    }
}

/// Embedding endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub dimensions: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,
    /// Batches in flight at once during an index build.
    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: usize,
}

fn default_embedding_model() -> String { "text-embedding-3-small".into() }
fn default_batch_size() -> usize { 64 }
fn default_max_retries() -> usize { 3 }
fn default_embed_timeout() -> u64 { 30 }
fn default_embed_concurrency() -> usize { 2 }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            endpoint: String::new(),
            api_key: String::new(),
            dimensions: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embed_timeout(),
            embed_concurrency: default_embed_concurrency(),
        }
    }
}

/// Knowledge base (chunking + search) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// JSON file or directory of Markdown/text documents. Unset means no KB.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
}

fn default_chunk_size() -> usize { 1200 }
fn default_chunk_overlap() -> usize { 200 }
fn default_top_k() -> usize { 4 }
fn default_max_top_k() -> usize { 6 }
fn default_max_query_chars() -> usize { 500 }

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            source: None,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            max_query_chars: default_max_query_chars(),
        }
    }
}

/// Conversation loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    #[serde(default = "default_max_tool_output_chars")]
    pub max_tool_output_chars: usize,
}

fn default_system_prompt() -> String {
    "You are a friendly assistant for our business. Answer questions using only \
     information returned by the search_kb tool and cite the source title when you \
     use it. If the knowledge base has no answer, say so briefly. When the visitor \
     wants to be contacted, collect full name, email and phone, then call \
     capture_lead. When they want to book a visit, collect modality, preferred date \
     and time, and contact details, then call schedule_visit. Never invent prices, \
     availability or policies."
        .into()
}

fn default_fallback_reply() -> String {
    "Thanks! I've recorded your request and someone from our team will follow up \
     with you shortly."
        .into()
}

fn default_max_tool_rounds() -> usize { 3 }
fn default_max_tool_output_chars() -> usize { 4000 }

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            fallback_reply: default_fallback_reply(),
            max_tool_rounds: default_max_tool_rounds(),
            max_tool_output_chars: default_max_tool_output_chars(),
        }
    }
}

/// Lead capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadsConfig {
    /// Required on top of full_name, email and phone.
    #[serde(default)]
    pub extra_required: Vec<String>,
    /// Value written to the `source` column.
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
}

fn default_source_tag() -> String { "chat".into() }

impl Default for LeadsConfig {
    fn default() -> Self {
        Self {
            extra_required: vec![],
            source_tag: default_source_tag(),
        }
    }
}

/// Visit scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitsConfig {
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: i64,
    /// IANA zone name sent to the calendar.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default)]
    pub datetime: DateTimeConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
}

fn default_slot_minutes() -> i64 { 60 }
fn default_time_zone() -> String { "America/Argentina/Buenos_Aires".into() }

impl Default for VisitsConfig {
    fn default() -> Self {
        Self {
            slot_minutes: default_slot_minutes(),
            time_zone: default_time_zone(),
            datetime: DateTimeConfig::default(),
            calendar: CalendarConfig::default(),
        }
    }
}

/// Leniency of the visit date/time parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateTimeConfig {
    /// Fixed offset for local times without one, e.g. "-03:00".
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    /// `15/3` means 15 March when true, March 15 when false.
    #[serde(default = "bool_true")]
    pub day_first: bool,
    /// Two-digit years are added to this base (25 → 2025).
    #[serde(default = "default_two_digit_year_base")]
    pub two_digit_year_base: i32,
    /// A date without a year that already passed this year moves to next year.
    #[serde(default = "bool_true")]
    pub roll_forward_missing_year: bool,
}

fn bool_true() -> bool { true }
fn default_utc_offset() -> String { "-03:00".into() }
fn default_two_digit_year_base() -> i32 { 2000 }

impl Default for DateTimeConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
            day_first: true,
            two_digit_year_base: default_two_digit_year_base(),
            roll_forward_missing_year: true,
        }
    }
}

impl DateTimeConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.utc_offset)
    }
}

/// Parse `Z`, `UTC`, `+HH:MM`, `-HH:MM`, `+HHMM` or `-HH`.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let s = raw.trim();
    let invalid = || ConciergeError::Config(format!("Invalid UTC offset: '{raw}'"));
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }
    let (sign, rest) = match s.chars().next() {
        Some('+') => (1, &s[1..]),
        Some('-') => (-1, &s[1..]),
        _ => return Err(invalid()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.is_empty() || digits.len() > 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hh, mm) = if digits.len() <= 2 {
        (digits.as_str(), "0")
    } else {
        digits.split_at(digits.len() - 2)
    };
    let hours: i32 = hh.parse().map_err(|_| invalid())?;
    let minutes: i32 = mm.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Calendar collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_calendar_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_collaborator_timeout")]
    pub timeout_secs: u64,
}

fn default_calendar_endpoint() -> String { "https://www.googleapis.com/calendar/v3".into() }
fn default_calendar_id() -> String { "primary".into() }
fn default_collaborator_timeout() -> u64 { 15 }

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_calendar_endpoint(),
            calendar_id: default_calendar_id(),
            access_token: String::new(),
            timeout_secs: default_collaborator_timeout(),
        }
    }
}

/// Lead/visit record log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// "sqlite", "webhook" or "memory".
    #[serde(default = "default_records_backend")]
    pub backend: String,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub webhook_token: String,
    #[serde(default = "default_collaborator_timeout")]
    pub timeout_secs: u64,
}

fn default_records_backend() -> String { "sqlite".into() }
fn default_sqlite_path() -> String { "~/.concierge/records.db".into() }

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            backend: default_records_backend(),
            sqlite_path: default_sqlite_path(),
            webhook_url: String::new(),
            webhook_token: String::new(),
            timeout_secs: default_collaborator_timeout(),
        }
    }
}
