use std::fmt;
use std::time::Duration;

/// How the business key property is typed in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Title,
    RichText,
}

impl KeyKind {
    /// Property type name used in filters and property payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Title => "title",
            KeyKind::RichText => "rich_text",
        }
    }
}

/// Property names and types of one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSchema {
    pub key_property: String,
    pub key_kind: KeyKind,
    pub quantity_property: String,
    pub request_date_property: String,
    pub flag_property: String,
}

impl StoreSchema {
    /// Default schema of store A ("request" records).
    pub fn source_default() -> Self {
        Self {
            key_property: "Tool Number".to_string(),
            key_kind: KeyKind::Title,
            quantity_property: "Quantity".to_string(),
            request_date_property: "Request Date".to_string(),
            flag_property: "Sync Flag".to_string(),
        }
    }

    /// Default schema of store B ("stock" records).
    pub fn target_default() -> Self {
        Self {
            key_property: "Part Number".to_string(),
            key_kind: KeyKind::RichText,
            ..Self::source_default()
        }
    }
}

#[derive(Clone)]
pub struct Config {
    // Record stores
    pub notion_token: String,
    pub notion_base_url: String,
    pub source_db_id: String,
    pub target_db_id: String,
    pub source_schema: StoreSchema,
    pub target_schema: StoreSchema,

    // Delivery endpoint
    pub chat_base_url: String,
    pub chat_api_key: String,
    pub chat_channel_id: String,
    pub chat_message: String,
    pub idempotency_prefix: String,
    pub retry_max_attempts: u32,
    pub retry_backoff_secs: u64,

    // Sent-record cache
    pub cache_ttl_hours: i64,
    pub cache_volatile_expiry_secs: u64,
    pub cache_size_threshold: usize,
    pub cache_db_path: String,

    // Outbox
    pub outbox_dir: Option<String>,
    pub delete_after_send: bool,
    pub send_interval_ms: u64,

    // Process
    pub lock_path: String,
    pub run_interval_secs: Option<u64>,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notion_token: String::new(),
            notion_base_url: "https://api.notion.com".to_string(),
            source_db_id: String::new(),
            target_db_id: String::new(),
            source_schema: StoreSchema::source_default(),
            target_schema: StoreSchema::target_default(),
            chat_base_url: String::new(),
            chat_api_key: String::new(),
            chat_channel_id: String::new(),
            chat_message: "Inspection report".to_string(),
            idempotency_prefix: "relay".to_string(),
            retry_max_attempts: 3,
            retry_backoff_secs: 2,
            cache_ttl_hours: 24,
            cache_volatile_expiry_secs: 21600,
            cache_size_threshold: 90_000,
            cache_db_path: "relay-cache.db".to_string(),
            outbox_dir: None,
            delete_after_send: false,
            send_interval_ms: 2000,
            lock_path: "record-relay.lock".to_string(),
            run_interval_secs: None,
            debug: false,
        }
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("notion_token", &redact(&self.notion_token))
            .field("notion_base_url", &self.notion_base_url)
            .field("source_db_id", &self.source_db_id)
            .field("target_db_id", &self.target_db_id)
            .field("source_schema", &self.source_schema)
            .field("target_schema", &self.target_schema)
            .field("chat_base_url", &self.chat_base_url)
            .field("chat_api_key", &redact(&self.chat_api_key))
            .field("chat_channel_id", &self.chat_channel_id)
            .field("chat_message", &self.chat_message)
            .field("idempotency_prefix", &self.idempotency_prefix)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_backoff_secs", &self.retry_backoff_secs)
            .field("cache_ttl_hours", &self.cache_ttl_hours)
            .field("cache_volatile_expiry_secs", &self.cache_volatile_expiry_secs)
            .field("cache_size_threshold", &self.cache_size_threshold)
            .field("cache_db_path", &self.cache_db_path)
            .field("outbox_dir", &self.outbox_dir)
            .field("delete_after_send", &self.delete_after_send)
            .field("send_interval_ms", &self.send_interval_ms)
            .field("lock_path", &self.lock_path)
            .field("run_interval_secs", &self.run_interval_secs)
            .field("debug", &self.debug)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl Config {
    /// Check everything the synchronization passes need.
    pub fn validate_sync(&self) -> Result<(), ConfigError> {
        if self.notion_token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.source_db_id.is_empty() {
            return Err(ConfigError::MissingSourceDb);
        }
        if self.target_db_id.is_empty() {
            return Err(ConfigError::MissingTargetDb);
        }
        Ok(())
    }

    /// Check everything the delivery pipeline needs.
    pub fn validate_delivery(&self) -> Result<(), ConfigError> {
        if self.chat_base_url.is_empty() {
            return Err(ConfigError::MissingChatUrl);
        }
        if self.chat_api_key.is_empty() {
            return Err(ConfigError::MissingChatKey);
        }
        if self.chat_channel_id.is_empty() {
            return Err(ConfigError::MissingChannel);
        }
        if self.retry_max_attempts == 0 {
            return Err(ConfigError::InvalidRetryAttempts);
        }
        Ok(())
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache_ttl_hours)
    }

    pub fn cache_volatile_expiry(&self) -> Duration {
        Duration::from_secs(self.cache_volatile_expiry_secs)
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("RELAY_NOTION_TOKEN is required")]
    MissingToken,
    #[error("RELAY_SOURCE_DB_ID is required")]
    MissingSourceDb,
    #[error("RELAY_TARGET_DB_ID is required")]
    MissingTargetDb,
    #[error("RELAY_CHAT_BASE_URL is required")]
    MissingChatUrl,
    #[error("RELAY_CHAT_API_KEY is required")]
    MissingChatKey,
    #[error("RELAY_CHAT_CHANNEL_ID is required")]
    MissingChannel,
    #[error("RELAY_RETRY_MAX_ATTEMPTS must be at least 1")]
    InvalidRetryAttempts,
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn load_config() -> anyhow::Result<Config> {
    let defaults = Config::default();

    let notion_token = env_or("RELAY_NOTION_TOKEN", "");
    let notion_base_url = env_or("RELAY_NOTION_BASE_URL", &defaults.notion_base_url);
    let source_db_id = env_or("RELAY_SOURCE_DB_ID", "");
    let target_db_id = env_or("RELAY_TARGET_DB_ID", "");

    // Schema overrides; the shared payload names apply to both stores
    let quantity_property = env_or(
        "RELAY_QUANTITY_PROPERTY",
        &defaults.source_schema.quantity_property,
    );
    let request_date_property = env_or(
        "RELAY_REQUEST_DATE_PROPERTY",
        &defaults.source_schema.request_date_property,
    );
    let flag_property = env_or("RELAY_FLAG_PROPERTY", &defaults.source_schema.flag_property);

    let source_schema = StoreSchema {
        key_property: env_or(
            "RELAY_SOURCE_KEY_PROPERTY",
            &defaults.source_schema.key_property,
        ),
        key_kind: KeyKind::Title,
        quantity_property: quantity_property.clone(),
        request_date_property: request_date_property.clone(),
        flag_property: flag_property.clone(),
    };
    let target_schema = StoreSchema {
        key_property: env_or(
            "RELAY_TARGET_KEY_PROPERTY",
            &defaults.target_schema.key_property,
        ),
        key_kind: KeyKind::RichText,
        quantity_property,
        request_date_property,
        flag_property,
    };

    // Delivery endpoint
    let chat_base_url = env_or("RELAY_CHAT_BASE_URL", "");
    let chat_api_key = env_or("RELAY_CHAT_API_KEY", "");
    let chat_channel_id = env_or("RELAY_CHAT_CHANNEL_ID", "");
    let chat_message = env_or("RELAY_CHAT_MESSAGE", &defaults.chat_message);
    let idempotency_prefix = env_or("RELAY_IDEMPOTENCY_PREFIX", &defaults.idempotency_prefix);
    let retry_max_attempts = env_parse("RELAY_RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts);
    let retry_backoff_secs = env_parse("RELAY_RETRY_BACKOFF_SECS", defaults.retry_backoff_secs);

    // Sent-record cache
    let cache_ttl_hours = env_parse("RELAY_CACHE_TTL_HOURS", defaults.cache_ttl_hours);
    let cache_volatile_expiry_secs = env_parse(
        "RELAY_CACHE_VOLATILE_EXPIRY_SECS",
        defaults.cache_volatile_expiry_secs,
    );
    let cache_size_threshold =
        env_parse("RELAY_CACHE_SIZE_THRESHOLD", defaults.cache_size_threshold);
    let cache_db_path = env_or("RELAY_CACHE_DB_PATH", &defaults.cache_db_path);

    // Outbox
    let outbox_dir = std::env::var("RELAY_OUTBOX_DIR").ok();
    let delete_after_send = env_flag("RELAY_DELETE_AFTER_SEND");
    let send_interval_ms = env_parse("RELAY_SEND_INTERVAL_MS", defaults.send_interval_ms);

    // Process
    let lock_path = env_or("RELAY_LOCK_PATH", &defaults.lock_path);
    let run_interval_secs = std::env::var("RELAY_RUN_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok());
    let debug = std::env::var("DEBUG").is_ok();

    Ok(Config {
        notion_token,
        notion_base_url,
        source_db_id,
        target_db_id,
        source_schema,
        target_schema,
        chat_base_url,
        chat_api_key,
        chat_channel_id,
        chat_message,
        idempotency_prefix,
        retry_max_attempts,
        retry_backoff_secs,
        cache_ttl_hours,
        cache_volatile_expiry_secs,
        cache_size_threshold,
        cache_db_path,
        outbox_dir,
        delete_after_send,
        send_interval_ms,
        lock_path,
        run_interval_secs,
        debug,
    })
}
