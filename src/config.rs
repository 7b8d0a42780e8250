use std::path::PathBuf;
use std::time::Duration;

use crate::error::ServerError;

/// Configuration for the chess service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to. Default: 0.0.0.0:8000.
    pub listen_addr: String,
    /// Time limit per side, sudden death with no increment. Default: 5m.
    pub time_limit: Duration,
    /// Directory holding the page template and static assets. Default:
    /// `assets`.
    pub assets_dir: PathBuf,
    /// Bound of the waiting pool; arrivals beyond it are refused.
    /// Default: 100.
    pub waiting_capacity: usize,
    /// Capacity of each player's outbound frame queue. Default: 1.
    pub out_capacity: usize,
    /// How often each connection receives a `stat` push. Also keeps idle
    /// proxies from dropping the socket. Default: 20s.
    pub stats_interval: Duration,
    /// How long the matcher waits for a `pong` when probing a waiter.
    /// Default: 5s.
    pub probe_timeout: Duration,
}

impl ServerConfig {
    /// Validate configuration values.
    ///
    /// Checks:
    /// - `waiting_capacity >= 1` and `out_capacity >= 1` (zero-capacity
    ///   channels can never accept anything)
    /// - all durations are non-zero
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.waiting_capacity == 0 {
            return Err(ServerError::InvalidConfig {
                reason: "waiting_capacity must be >= 1".to_string(),
            });
        }
        if self.out_capacity == 0 {
            return Err(ServerError::InvalidConfig {
                reason: "out_capacity must be >= 1".to_string(),
            });
        }
        if self.time_limit.is_zero() {
            return Err(ServerError::InvalidConfig {
                reason: "time_limit must be > 0".to_string(),
            });
        }
        if self.stats_interval.is_zero() {
            return Err(ServerError::InvalidConfig {
                reason: "stats_interval must be > 0".to_string(),
            });
        }
        if self.probe_timeout.is_zero() {
            return Err(ServerError::InvalidConfig {
                reason: "probe_timeout must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            time_limit: Duration::from_secs(300),
            assets_dir: PathBuf::from("assets"),
            waiting_capacity: 100,
            out_capacity: 1,
            stats_interval: Duration::from_secs(20),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Parse a human duration like `200ms`, `90s`, `5m` or `1h`.
pub fn parse_duration(s: &str) -> Result<Duration, ServerError> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .filter(|&i| i > 0)
        .ok_or_else(|| ServerError::InvalidConfig {
            reason: format!("invalid duration {s:?}, expected e.g. 90s or 5m"),
        })?;
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits.parse().map_err(|_| ServerError::InvalidConfig {
        reason: format!("invalid duration {s:?}"),
    })?;
    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(ServerError::InvalidConfig {
            reason: format!("invalid duration unit {unit:?} in {s:?}"),
        }),
    }
}
