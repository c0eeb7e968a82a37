// Service configuration - defaults plus environment overrides

use std::time::Duration;

use crate::resolver::{
    AudioTier, HttpConfig, ProviderEndpoint, ProviderKind, ResolverConfig, SelectionConfig,
    DEFAULT_DIRECTORY_URL,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive number, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} must be true or false, got {value:?}")]
    InvalidBool { name: &'static str, value: String },

    #[error("{name}: {message}")]
    InvalidValue { name: &'static str, message: String },
}

/// Where the provider pool comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Directory endpoint; ignored when `static_providers` is non-empty
    pub directory_url: Option<String>,
    pub static_providers: Vec<ProviderEndpoint>,
    /// Kind for directory entries and bare static addresses
    pub default_kind: ProviderKind,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            directory_url: Some(DEFAULT_DIRECTORY_URL.to_string()),
            static_providers: Vec::new(),
            default_kind: ProviderKind::Invidious,
        }
    }
}

impl PoolConfig {
    pub fn with_directory_url(mut self, url: Option<String>) -> Self {
        self.directory_url = url;
        self
    }

    pub fn with_static_providers(mut self, providers: Vec<ProviderEndpoint>) -> Self {
        self.static_providers = providers;
        self
    }

    pub fn with_default_kind(mut self, kind: ProviderKind) -> Self {
        self.default_kind = kind;
        self
    }

    pub fn uses_directory(&self) -> bool {
        self.static_providers.is_empty() && self.directory_url.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub pool: PoolConfig,
    pub resolver: ResolverConfig,
    pub http: HttpConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            pool: PoolConfig::default(),
            resolver: ResolverConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read overrides from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read overrides through `lookup`; unset and blank variables keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = addr;
        } else if let Some(port) = get("PORT") {
            let port: u16 = port.parse().map_err(|_| ConfigError::InvalidNumber {
                name: "PORT",
                value: port.clone(),
            })?;
            config.bind_addr = format!("0.0.0.0:{}", port);
        }

        // Pool
        if let Some(kind) = get("PROVIDER_KIND") {
            config.pool.default_kind = kind
                .parse()
                .map_err(|message| ConfigError::InvalidValue {
                    name: "PROVIDER_KIND",
                    message,
                })?;
        }
        if let Some(url) = get("PROVIDER_DIRECTORY_URL") {
            config.pool.directory_url = Some(url);
        }
        if let Some(list) = get("PROVIDERS") {
            config.pool.static_providers = parse_provider_list(&list, config.pool.default_kind);
        }

        // Resolver
        if let Some(ms) = read_millis(&get, "LOOKUP_TIMEOUT_MS")? {
            config.resolver.lookup_timeout = ms;
        }
        if let Some(ms) = read_millis(&get, "RESOLVE_DEADLINE_MS")? {
            config.resolver.deadline = ms;
        }
        if let Some(ms) = read_millis(&get, "PROBE_TIMEOUT_MS")? {
            config.resolver.probe_timeout = ms;
        }
        if let Some(value) = get("PROBE_BEFORE_LOOKUP") {
            config.resolver.probe_before_lookup = parse_bool("PROBE_BEFORE_LOOKUP", &value)?;
        }
        if let Some(value) = get("SEARCH_LIMIT") {
            config.resolver.search_limit = value
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidNumber {
                    name: "SEARCH_LIMIT",
                    value,
                })?;
        }

        let mut selection = SelectionConfig::default();
        if let Some(label) = get("VIDEO_LABEL") {
            selection = selection.with_video_label(label);
        }
        if let Some(container) = get("VIDEO_CONTAINER") {
            selection = selection.with_video_container(container.to_ascii_lowercase());
        }
        if let Some(tier) = get("AUDIO_TIER") {
            let parsed = AudioTier::parse(&tier).ok_or_else(|| ConfigError::InvalidValue {
                name: "AUDIO_TIER",
                message: format!("expected low, medium or high, got {:?}", tier),
            })?;
            selection = selection.with_audio_tier(parsed);
        }
        if let Some(container) = get("AUDIO_CONTAINER") {
            selection = selection.with_audio_container(container.to_ascii_lowercase());
        }
        config.resolver.selection = selection;

        // Outbound HTTP
        config.http = config.http.with_proxy(get("HTTP_PROXY_URL"));
        if let Some(agent) = get("USER_AGENT") {
            config.http = config.http.with_user_agent(agent);
        }

        Ok(config)
    }

    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }
}

/// `kind=address` or a bare address, comma separated
pub fn parse_provider_list(list: &str, default_kind: ProviderKind) -> Vec<ProviderEndpoint> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((kind, address)) => match kind.parse::<ProviderKind>() {
                Ok(kind) => ProviderEndpoint::new(address.trim(), kind),
                // `=` inside a URL query
                Err(_) => ProviderEndpoint::new(entry, default_kind),
            },
            None => ProviderEndpoint::new(entry, default_kind),
        })
        .collect()
}

fn read_millis<G>(get: &G, name: &'static str) -> Result<Option<Duration>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let Some(value) = get(name) else {
        return Ok(None);
    };
    match value.parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Some(Duration::from_millis(ms))),
        _ => Err(ConfigError::InvalidNumber { name, value }),
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name,
            value: value.to_string(),
        }),
    }
}
