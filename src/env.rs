use std::{path::PathBuf, sync::LazyLock, time::Duration};

use serde::{
    de::{DeserializeOwned, Error},
    Deserialize, Deserializer,
};
use tracing::error;
use url::Url;

use crate::{
    amount::Amount,
    eth::{normalize_address, USDC_CONTRACT},
};

pub const ENV_PREFIX: &str = "USDC_WATCH_";

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Holder whose balance is watched, normalized to lowercase `0x` form.
    #[serde(deserialize_with = "deserialize_address")]
    pub address: String,
    #[serde(deserialize_with = "deserialize_amount")]
    pub threshold: Amount,
    #[serde(default = "default_endpoints_path")]
    pub endpoints_path: PathBuf,
    #[serde(
        default = "default_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub interval: Duration,
    /// Run a single check and exit.
    #[serde(default)]
    pub once: bool,
    /// Exit after the first balance >= threshold alert.
    #[serde(default = "default_alert_exit")]
    pub alert_exit: bool,
    /// Webhook base url, receives a GET with a `message` query parameter.
    #[serde(default)]
    pub alert_url: Option<Url>,
    #[serde(
        default = "default_token_contract",
        deserialize_with = "deserialize_address"
    )]
    pub token_contract: String,
    #[serde(
        default = "default_check_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub check_timeout: Duration,
    #[serde(
        default = "default_alert_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub alert_timeout: Duration,
}

fn default_endpoints_path() -> PathBuf {
    PathBuf::from("config/rpc_endpoints.toml")
}

fn default_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_alert_exit() -> bool {
    true
}

fn default_token_contract() -> String {
    USDC_CONTRACT.to_string()
}

fn default_check_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_alert_timeout() -> Duration {
    Duration::from_secs(5)
}

pub fn deserialize_address<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    normalize_address(&s).map_err(|err| Error::custom(format!("invalid address: {}", err)))
}

pub fn deserialize_amount<'de, D>(deserializer: D) -> Result<Amount, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Amount::parse(&s).map_err(|err| Error::custom(format!("invalid threshold: {}", err)))
}

/// Parses `250ms`, `30s`, `5m`, `1h` or a plain number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration: {:?}", input))?;

    let duration = match unit {
        "ms" => Duration::from_millis(value),
        "" | "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        "h" => Duration::from_secs(value.saturating_mul(3600)),
        _ => return Err(format!("unknown duration unit in {:?}", input)),
    };

    if duration.is_zero() {
        return Err(format!("duration must be positive, got {:?}", input));
    }
    Ok(duration)
}

pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_duration(&s).map_err(Error::custom)
}

pub fn get_app_config<T: DeserializeOwned>() -> T {
    match envy::prefixed(ENV_PREFIX).from_env::<T>() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to parse config: {}", err);
            std::process::exit(1);
        }
    }
}

pub static APP_CONFIG: LazyLock<AppConfig> = LazyLock::new(get_app_config);

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, envy::Error> {
        envy::from_iter::<_, AppConfig>(
            vars.iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        )
    }

    const ADDRESS: &str = "0xABCDEFabcdefABCDEFabcdefABCDEFabcdefABCD";

    #[test]
    fn parse_duration_test() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));

        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn app_config_defaults_test() {
        let config = config_from(&[("ADDRESS", ADDRESS), ("THRESHOLD", "100.5")]).unwrap();

        assert_eq!(config.address, "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd");
        assert_eq!(config.threshold, Amount::from_base_units(100_500_000u32));
        assert_eq!(config.endpoints_path, PathBuf::from("config/rpc_endpoints.toml"));
        assert_eq!(config.interval, Duration::from_secs(60));
        assert!(!config.once);
        assert!(config.alert_exit);
        assert!(config.alert_url.is_none());
        assert_eq!(config.token_contract, USDC_CONTRACT);
        assert_eq!(config.check_timeout, Duration::from_secs(10));
        assert_eq!(config.alert_timeout, Duration::from_secs(5));
    }

    #[test]
    fn app_config_overrides_test() {
        let config = config_from(&[
            ("ADDRESS", ADDRESS),
            ("THRESHOLD", "1"),
            ("INTERVAL", "30s"),
            ("ONCE", "true"),
            ("ALERT_EXIT", "false"),
            ("ALERT_URL", "https://hooks.example/notify"),
            ("CHECK_TIMEOUT", "2s"),
        ])
        .unwrap();

        assert_eq!(config.interval, Duration::from_secs(30));
        assert!(config.once);
        assert!(!config.alert_exit);
        assert_eq!(
            config.alert_url.unwrap().as_str(),
            "https://hooks.example/notify"
        );
        assert_eq!(config.check_timeout, Duration::from_secs(2));
    }

    #[test]
    fn app_config_rejects_invalid_values_test() {
        assert!(config_from(&[("THRESHOLD", "1")]).is_err());
        assert!(config_from(&[("ADDRESS", "0x123"), ("THRESHOLD", "1")]).is_err());
        assert!(config_from(&[("ADDRESS", ADDRESS), ("THRESHOLD", "-1")]).is_err());
        assert!(config_from(&[("ADDRESS", ADDRESS), ("THRESHOLD", "1.0000001")]).is_err());
        assert!(config_from(&[
            ("ADDRESS", ADDRESS),
            ("THRESHOLD", "1"),
            ("INTERVAL", "0s")
        ])
        .is_err());
    }
}
