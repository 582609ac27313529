//! Environment-driven configuration
//!
//! Everything is read once at startup. Credentials are optional until a
//! component actually needs them (see [`TelephonyConfig::require`]).

use crate::turn::RoleFilter;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Per-call behaviour knobs consumed by the state machine and runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallPolicy {
    /// Verification prompts allowed before escalating to a human agent
    pub max_verification_attempts: u32,
    /// How long to wait for the caller to answer a prompt
    pub input_timeout: Duration,
    /// Which transcription roles count as the caller's answer
    pub role_filter: RoleFilter,
    /// Days from call start until the first installment is due
    pub installment_offset_days: i64,
    pub installment_count: u32,
    /// Days from call start until a deferred payment is due
    pub deferment_days: i64,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            max_verification_attempts: 3,
            input_timeout: Duration::from_secs(15),
            role_filter: RoleFilter::UserOnly,
            installment_offset_days: 7,
            installment_count: 3,
            deferment_days: 30,
        }
    }
}

/// Outbound telephony settings
#[derive(Debug, Clone, Default)]
pub struct TelephonyConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    /// TwiML webhook the provider fetches once the call connects
    pub webhook_url: Option<String>,
    pub call_timeout: Duration,
    /// Prepended to the dialed number to name the caller's room
    pub room_prefix: String,
}

impl TelephonyConfig {
    pub fn room_for(&self, destination: &str) -> String {
        format!("{}{}", self.room_prefix, destination.trim_start_matches('+'))
    }
}

/// Credentials needed to place a call, all present
#[derive(Debug, Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub webhook_url: String,
}

impl TelephonyConfig {
    /// Return the dialing credentials or the first missing key.
    pub fn require(&self) -> Result<TwilioCredentials, ConfigError> {
        fn take(value: Option<&String>, key: &'static str) -> Result<String, ConfigError> {
            value
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or(ConfigError::Missing(key))
        }

        Ok(TwilioCredentials {
            account_sid: take(self.account_sid.as_ref(), "TWILIO_ACCOUNT_SID")?,
            auth_token: take(self.auth_token.as_ref(), "TWILIO_AUTH_TOKEN")?,
            from_number: take(self.from_number.as_ref(), "TWILIO_NUMBER")?,
            webhook_url: take(self.webhook_url.as_ref(), "TWILIO_URL")?,
        })
    }
}

/// Simulated account record used in place of a real customer lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountFixture {
    pub last_four: String,
    pub outstanding_amount: String,
    pub due_date: String,
    pub installment_amount: String,
}

impl Default for AccountFixture {
    fn default() -> Self {
        Self {
            last_four: "1234".to_string(),
            outstanding_amount: "$1,234.56".to_string(),
            due_date: "2025-06-30".to_string(),
            installment_amount: "$411.52".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub telephony: TelephonyConfig,
    pub policy: CallPolicy,
    pub account: AccountFixture,
    pub compliance_regions: Vec<String>,
    pub recordings_dir: PathBuf,
    pub transcripts_dir: PathBuf,
}

impl CollectorConfig {
    /// Load from the process environment, after merging any `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is normal in production
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CallPolicy::default();
        let account_defaults = AccountFixture::default();

        let telephony = TelephonyConfig {
            account_sid: lookup("TWILIO_ACCOUNT_SID"),
            auth_token: lookup("TWILIO_AUTH_TOKEN"),
            from_number: lookup("TWILIO_NUMBER"),
            webhook_url: lookup("TWILIO_URL"),
            call_timeout: Duration::from_secs(parse_or(&lookup, "SIP_CALL_TIMEOUT", 30)?),
            room_prefix: lookup("SIP_DEFAULT_ROOM_PREFIX").unwrap_or_else(|| "sip-call-".into()),
        };

        let max_verification_attempts =
            parse_or(&lookup, "MAX_VERIFICATION_ATTEMPTS", defaults.max_verification_attempts)?;
        if max_verification_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_VERIFICATION_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        let input_timeout_secs =
            parse_or(&lookup, "INPUT_TIMEOUT_SECS", defaults.input_timeout.as_secs())?;
        if input_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "INPUT_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }

        let policy = CallPolicy {
            max_verification_attempts,
            input_timeout: Duration::from_secs(input_timeout_secs),
            role_filter: if parse_bool(&lookup, "STRICT_USER_ROLE", true)? {
                RoleFilter::UserOnly
            } else {
                RoleFilter::Any
            },
            ..defaults
        };

        let account = AccountFixture {
            last_four: lookup("ACCOUNT_LAST_FOUR").unwrap_or(account_defaults.last_four),
            outstanding_amount: lookup("ACCOUNT_BALANCE")
                .unwrap_or(account_defaults.outstanding_amount),
            due_date: lookup("ACCOUNT_DUE_DATE").unwrap_or(account_defaults.due_date),
            installment_amount: lookup("ACCOUNT_INSTALLMENT")
                .unwrap_or(account_defaults.installment_amount),
        };

        let compliance_regions = lookup("COMPLIANCE_REGIONS")
            .unwrap_or_else(|| "US".to_string())
            .split(',')
            .map(|r| r.trim().to_uppercase())
            .filter(|r| !r.is_empty())
            .collect();

        Ok(Self {
            telephony,
            policy,
            account,
            compliance_regions,
            recordings_dir: lookup("RECORDINGS_DIR").map_or_else(|| "recordings".into(), PathBuf::from),
            transcripts_dir: lookup("TRANSCRIPTS_DIR")
                .map_or_else(|| "transcripts".into(), PathBuf::from),
        })
    }

    /// Where the audio of the call in `room` is stored
    pub fn recording_path(&self, room: &str) -> PathBuf {
        self.recordings_dir.join(format!("{room}.mp3"))
    }

    /// Create the recording and transcript directories if needed
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.recordings_dir)?;
        std::fs::create_dir_all(&self.transcripts_dir)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn parse_bool<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
    }
}
