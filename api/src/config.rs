use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub frontend_origin: String,
    /// Ceiling for one relayed chat completion, streaming included.
    pub relay_max_duration: Duration,
    /// Ceiling for the model call behind one `send_message`.
    pub reply_max_duration: Duration,
    pub session_idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            frontend_origin: "http://localhost:3000".to_string(),
            relay_max_duration: Duration::from_secs(30),
            reply_max_duration: Duration::from_secs(60),
            session_idle_timeout: Duration::from_secs(3600),
        }
    }
}

fn secs_var(name: &str, default: Duration) -> Result<Duration> {
    match env::var(name) {
        Ok(raw) => {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds, got {:?}", name, raw))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(default),
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            frontend_origin: env::var("FRONTEND_ORIGIN").unwrap_or(defaults.frontend_origin),
            relay_max_duration: secs_var("RELAY_MAX_DURATION_SECS", defaults.relay_max_duration)?,
            reply_max_duration: secs_var("REPLY_MAX_DURATION_SECS", defaults.reply_max_duration)?,
            session_idle_timeout: secs_var("SESSION_IDLE_TIMEOUT_SECS", defaults.session_idle_timeout)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secs_var_falls_back_and_parses() {
        let fallback = Duration::from_secs(7);
        assert_eq!(secs_var("GENIE_TEST_UNSET_SECS", fallback).unwrap(), fallback);

        env::set_var("GENIE_TEST_RELAY_SECS", " 12 ");
        assert_eq!(secs_var("GENIE_TEST_RELAY_SECS", fallback).unwrap(), Duration::from_secs(12));

        env::set_var("GENIE_TEST_BAD_SECS", "soon");
        assert!(secs_var("GENIE_TEST_BAD_SECS", fallback).is_err());
    }
}
