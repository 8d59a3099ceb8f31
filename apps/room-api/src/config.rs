use std::str::FromStr;
use std::time::Duration;

/// Room API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. `None` runs on in-memory stores.
    pub database_url: Option<String>,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// HS256 secret for bearer tokens. Bearer auth is disabled when unset.
    pub jwt_secret: Option<String>,
    /// Accept the unauthenticated `X-User-ID` header (and `?user_id=` on the
    /// WebSocket route).
    pub allow_legacy_user_header: bool,
    pub hub: HubConfig,
    /// Upper bound on draining WebSocket connections at shutdown.
    pub shutdown_timeout: Duration,
    /// Snowflake worker id for swipe ids. Must be unique per running
    /// instance sharing a database.
    pub snowflake_worker_id: u16,
}

/// Keepalive and backpressure settings for room WebSocket connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Outbound frames buffered per connection before it is dropped.
    pub send_queue: usize,
    pub ping_interval: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_queue: 256,
            ping_interval: Duration::from_secs(54),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Smallest read or write timeout accepted from the environment.
const MIN_SOCKET_TIMEOUT: Duration = Duration::from_secs(1);

/// Worker ids occupy 10 bits of a snowflake.
const MAX_WORKER_ID: u16 = 1023;

impl HubConfig {
    /// Keep the ping interval strictly below the read timeout, at 9/10 of it,
    /// so an idle but healthy peer is never timed out.
    fn clamped(mut self) -> Self {
        if self.send_queue == 0 {
            self.send_queue = 1;
        }
        self.read_timeout = self.read_timeout.max(MIN_SOCKET_TIMEOUT);
        self.write_timeout = self.write_timeout.max(MIN_SOCKET_TIMEOUT);
        if self.ping_interval >= self.read_timeout {
            self.ping_interval = self.read_timeout * 9 / 10;
        }
        if self.ping_interval.is_zero() {
            self.ping_interval = Duration::from_millis(1);
        }
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            port: 4010,
            jwt_secret: None,
            allow_legacy_user_header: true,
            hub: HubConfig::default(),
            shutdown_timeout: Duration::from_secs(10),
            snowflake_worker_id: 0,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Nothing is required. Unparseable values fall back to their defaults
    /// with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let hub = HubConfig {
            send_queue: parsed(&var, "WS_SEND_QUEUE", defaults.hub.send_queue),
            ping_interval: secs(&var, "WS_PING_INTERVAL_SECS", defaults.hub.ping_interval),
            read_timeout: secs(&var, "WS_READ_TIMEOUT_SECS", defaults.hub.read_timeout),
            write_timeout: secs(&var, "WS_WRITE_TIMEOUT_SECS", defaults.hub.write_timeout),
        }
        .clamped();

        Self {
            database_url: var("DATABASE_URL"),
            port: parsed(&var, "PORT", defaults.port),
            jwt_secret: var("JWT_SECRET"),
            allow_legacy_user_header: parsed(
                &var,
                "ALLOW_LEGACY_USER_HEADER",
                defaults.allow_legacy_user_header,
            ),
            hub,
            shutdown_timeout: secs(&var, "SHUTDOWN_TIMEOUT_SECS", defaults.shutdown_timeout),
            snowflake_worker_id: worker_id(&var, defaults.snowflake_worker_id),
        }
    }
}

fn worker_id(var: &impl Fn(&str) -> Option<String>, default: u16) -> u16 {
    let id = parsed(var, "SNOWFLAKE_WORKER_ID", default);
    if id > MAX_WORKER_ID {
        tracing::warn!(value = id, max = MAX_WORKER_ID, "SNOWFLAKE_WORKER_ID out of range, using default");
        return default;
    }
    id
}

fn parsed<T: FromStr>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    match var(name) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(%name, value = %raw, "invalid value, using default");
            default
        }),
    }
}

fn secs(var: &impl Fn(&str) -> Option<String>, name: &str, default: Duration) -> Duration {
    Duration::from_secs(parsed(var, name, default.as_secs()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg.port, 4010);
        assert!(cfg.database_url.is_none());
        assert!(cfg.jwt_secret.is_none());
        assert!(cfg.allow_legacy_user_header);
        assert_eq!(cfg.hub, HubConfig::default());
        assert_eq!(cfg.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(cfg.snowflake_worker_id, 0);
    }

    #[test]
    fn snowflake_worker_id_is_read_and_range_checked() {
        assert_eq!(config(&[("SNOWFLAKE_WORKER_ID", "7")]).snowflake_worker_id, 7);
        assert_eq!(config(&[("SNOWFLAKE_WORKER_ID", "1023")]).snowflake_worker_id, 1023);
        assert_eq!(config(&[("SNOWFLAKE_WORKER_ID", "1024")]).snowflake_worker_id, 0);
        assert_eq!(config(&[("SNOWFLAKE_WORKER_ID", "worker-3")]).snowflake_worker_id, 0);
    }

    #[test]
    fn socket_timeouts_have_a_one_second_floor() {
        let cfg = config(&[
            ("WS_READ_TIMEOUT_SECS", "0"),
            ("WS_WRITE_TIMEOUT_SECS", "0"),
            ("WS_PING_INTERVAL_SECS", "0"),
        ]);
        assert_eq!(cfg.hub.read_timeout, Duration::from_secs(1));
        assert_eq!(cfg.hub.write_timeout, Duration::from_secs(1));
        assert!(!cfg.hub.ping_interval.is_zero());
        assert!(cfg.hub.ping_interval < cfg.hub.read_timeout);
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let cfg = config(&[
            ("DATABASE_URL", " postgres://localhost/flickpick "),
            ("PORT", "8080"),
            ("JWT_SECRET", "s3cret"),
            ("ALLOW_LEGACY_USER_HEADER", "false"),
            ("WS_SEND_QUEUE", "16"),
            ("WS_PING_INTERVAL_SECS", "5"),
            ("WS_READ_TIMEOUT_SECS", "8"),
        ]);
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/flickpick"));
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.jwt_secret.as_deref(), Some("s3cret"));
        assert!(!cfg.allow_legacy_user_header);
        assert_eq!(cfg.hub.send_queue, 16);
        assert_eq!(cfg.hub.ping_interval, Duration::from_secs(5));
        assert_eq!(cfg.hub.read_timeout, Duration::from_secs(8));
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let cfg = config(&[("PORT", "eighty"), ("WS_SEND_QUEUE", "-3")]);
        assert_eq!(cfg.port, 4010);
        assert_eq!(cfg.hub.send_queue, 256);
    }

    #[test]
    fn ping_interval_is_kept_below_read_timeout() {
        let cfg = config(&[("WS_PING_INTERVAL_SECS", "90"), ("WS_READ_TIMEOUT_SECS", "30")]);
        assert_eq!(cfg.hub.ping_interval, Duration::from_secs(27));
        assert!(cfg.hub.ping_interval < cfg.hub.read_timeout);
    }
}
