use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default Argon2 memory cost in KiB (19 MiB, OWASP 2024 baseline for Argon2id).
pub const DEFAULT_ARGON2_MEMORY_KIB: u32 = 19_456;

/// Default Argon2 iteration count.
pub const DEFAULT_ARGON2_ITERATIONS: u32 = 2;

/// Default Argon2 lane count.
pub const DEFAULT_ARGON2_PARALLELISM: u32 = 1;

pub const MIN_ARGON2_MEMORY_KIB: u32 = 1_024;
pub const MAX_ARGON2_MEMORY_KIB: u32 = 1_048_576;
pub const MIN_ARGON2_ITERATIONS: u32 = 1;
pub const MAX_ARGON2_ITERATIONS: u32 = 10;
pub const MIN_ARGON2_PARALLELISM: u32 = 1;
pub const MAX_ARGON2_PARALLELISM: u32 = 16;

/// Hosts the fetch proxy may reach when nothing is configured.
pub const DEFAULT_FETCH_ALLOWED_HOSTS: &str = "api.example.com,safe-api.com";

/// Only plain web schemes are ever permitted.
pub const SUPPORTED_FETCH_SCHEMES: [&str; 2] = ["http", "https"];

pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;
pub const MAX_FETCH_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_FETCH_MAX_RESPONSE_BYTES: usize = 200;
pub const MAX_FETCH_MAX_RESPONSE_BYTES: usize = 1_048_576;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub hashing: HashingParams,
    pub fetch_policy: FetchPolicy,
    /// Token handed out on successful login. Never hardcoded.
    pub login_token: Option<SecretString>,
    pub log_format: LogFormat,
}

/// Argon2id cost parameters for the credential hasher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingParams {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_ARGON2_MEMORY_KIB,
            iterations: DEFAULT_ARGON2_ITERATIONS,
            parallelism: DEFAULT_ARGON2_PARALLELISM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Admission policy for the outbound fetch proxy.
///
/// Host entries are normalized with the same URL parser the gatekeeper uses,
/// so admission is a plain equality test against the parsed request host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    allowed_hosts: Vec<String>,
    allowed_schemes: Vec<String>,
    private_exempt_hosts: Vec<String>,
    timeout: Duration,
    max_response_bytes: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

impl ConfigError {
    fn invalid(var: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            var: var.to_string(),
            reason: reason.into(),
        }
    }
}

impl FetchPolicy {
    /// Build a policy, normalizing host entries and validating bounds.
    pub fn new(
        allowed_hosts: &[&str],
        allowed_schemes: &[&str],
        private_exempt_hosts: &[&str],
        timeout: Duration,
        max_response_bytes: usize,
    ) -> Result<Self, ConfigError> {
        let allowed_hosts = allowed_hosts
            .iter()
            .map(|h| normalize_host(h).map_err(|r| ConfigError::invalid("FETCH_ALLOWED_HOSTS", r)))
            .collect::<Result<Vec<_>, _>>()?;

        let allowed_schemes = allowed_schemes
            .iter()
            .map(|s| {
                let scheme = s.trim().to_ascii_lowercase();
                if SUPPORTED_FETCH_SCHEMES.contains(&scheme.as_str()) {
                    Ok(scheme)
                } else {
                    Err(ConfigError::invalid(
                        "FETCH_ALLOWED_SCHEMES",
                        format!("unsupported scheme '{}'", s.trim()),
                    ))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        if allowed_schemes.is_empty() {
            return Err(ConfigError::invalid(
                "FETCH_ALLOWED_SCHEMES",
                "at least one scheme is required",
            ));
        }

        let private_exempt_hosts = private_exempt_hosts
            .iter()
            .map(|h| {
                let host = normalize_host(h)
                    .map_err(|r| ConfigError::invalid("FETCH_PRIVATE_EXEMPT_HOSTS", r))?;
                if allowed_hosts.contains(&host) {
                    Ok(host)
                } else {
                    Err(ConfigError::invalid(
                        "FETCH_PRIVATE_EXEMPT_HOSTS",
                        format!("'{}' is not in the host allowlist", host),
                    ))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let timeout_ms = timeout.as_millis();
        if timeout_ms == 0 || timeout_ms > u128::from(MAX_FETCH_TIMEOUT_MS) {
            return Err(ConfigError::invalid(
                "FETCH_TIMEOUT_MS",
                format!("must be 1-{} milliseconds", MAX_FETCH_TIMEOUT_MS),
            ));
        }

        if max_response_bytes == 0 || max_response_bytes > MAX_FETCH_MAX_RESPONSE_BYTES {
            return Err(ConfigError::invalid(
                "FETCH_MAX_RESPONSE_BYTES",
                format!("must be 1-{} bytes", MAX_FETCH_MAX_RESPONSE_BYTES),
            ));
        }

        Ok(Self {
            allowed_hosts,
            allowed_schemes,
            private_exempt_hosts,
            timeout,
            max_response_bytes,
        })
    }

    /// Exact match against the normalized allowlist.
    pub fn is_host_allowed(&self, host: &str) -> bool {
        self.allowed_hosts.iter().any(|allowed| allowed == host)
    }

    pub fn is_scheme_allowed(&self, scheme: &str) -> bool {
        self.allowed_schemes.iter().any(|allowed| allowed == scheme)
    }

    /// Whether an allowlisted host may resolve to a loopback/private address.
    pub fn is_private_exempt(&self, host: &str) -> bool {
        self.private_exempt_hosts.iter().any(|exempt| exempt == host)
    }

    pub fn allowed_hosts(&self) -> &[String] {
        &self.allowed_hosts
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_response_bytes(&self) -> usize {
        self.max_response_bytes
    }
}

/// Normalize a bare host entry the way `url` normalizes a request host.
///
/// Rejects anything that is more than a host: ports, paths, userinfo, queries.
fn normalize_host(entry: &str) -> Result<String, String> {
    let entry = entry.trim();
    if entry.is_empty() {
        return Err("empty host entry".to_string());
    }

    let parsed = Url::parse(&format!("http://{}/", entry))
        .map_err(|e| format!("'{}' is not a valid host: {}", entry, e))?;

    let is_bare_host = parsed.username().is_empty()
        && parsed.password().is_none()
        && parsed.port().is_none()
        && parsed.path() == "/"
        && parsed.query().is_none()
        && parsed.fragment().is_none();

    match parsed.host_str() {
        Some(host) if is_bare_host => Ok(host.to_string()),
        _ => Err(format!("'{}' must be a bare host name or IP address", entry)),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .cloned()
            .unwrap_or_else(|| "sqlite://accounts.db".to_string());

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "127.0.0.1:8000".to_string());

        let hashing = HashingParams {
            memory_kib: parse_bounded(
                vars,
                "ARGON2_MEMORY_KIB",
                DEFAULT_ARGON2_MEMORY_KIB,
                MIN_ARGON2_MEMORY_KIB..=MAX_ARGON2_MEMORY_KIB,
            )?,
            iterations: parse_bounded(
                vars,
                "ARGON2_ITERATIONS",
                DEFAULT_ARGON2_ITERATIONS,
                MIN_ARGON2_ITERATIONS..=MAX_ARGON2_ITERATIONS,
            )?,
            parallelism: parse_bounded(
                vars,
                "ARGON2_PARALLELISM",
                DEFAULT_ARGON2_PARALLELISM,
                MIN_ARGON2_PARALLELISM..=MAX_ARGON2_PARALLELISM,
            )?,
        };

        let allowed_hosts = vars
            .get("FETCH_ALLOWED_HOSTS")
            .map(String::as_str)
            .unwrap_or(DEFAULT_FETCH_ALLOWED_HOSTS);
        let allowed_schemes = vars
            .get("FETCH_ALLOWED_SCHEMES")
            .map(String::as_str)
            .unwrap_or("http,https");
        let exempt_hosts = vars
            .get("FETCH_PRIVATE_EXEMPT_HOSTS")
            .map(String::as_str)
            .unwrap_or("");

        let timeout_ms = parse_bounded(
            vars,
            "FETCH_TIMEOUT_MS",
            DEFAULT_FETCH_TIMEOUT_MS,
            1..=MAX_FETCH_TIMEOUT_MS,
        )?;
        let max_response_bytes = parse_bounded(
            vars,
            "FETCH_MAX_RESPONSE_BYTES",
            DEFAULT_FETCH_MAX_RESPONSE_BYTES,
            1..=MAX_FETCH_MAX_RESPONSE_BYTES,
        )?;

        let fetch_policy = FetchPolicy::new(
            &split_list(allowed_hosts),
            &split_list(allowed_schemes),
            &split_list(exempt_hosts),
            Duration::from_millis(timeout_ms),
            max_response_bytes,
        )?;

        let login_token = vars
            .get("LOGIN_TOKEN")
            .filter(|t| !t.is_empty())
            .map(|t| SecretString::from(t.as_str()));

        let log_format = match vars.get("LOG_FORMAT").map(String::as_str) {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::invalid(
                    "LOG_FORMAT",
                    format!("expected 'text' or 'json', got '{}'", other),
                ))
            }
        };

        Ok(Config {
            database_url,
            bind_address,
            hashing,
            fetch_policy,
            login_token,
            log_format,
        })
    }
}

fn split_list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_bounded<T>(
    vars: &HashMap<String, String>,
    var: &str,
    default: T,
    range: std::ops::RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + std::fmt::Display,
{
    let value = match vars.get(var) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::invalid(var, format!("'{}' is not a number", raw)))?,
        None => default,
    };

    if !range.contains(&value) {
        return Err(ConfigError::invalid(
            var,
            format!(
                "{} is out of range {}-{}",
                value,
                range.start(),
                range.end()
            ),
        ));
    }

    Ok(value)
}
