//! Monitor configuration and warning localization.

use std::time::Duration;

use classgate_session::DEFAULT_WARNING_THRESHOLD_MINUTES;
use classgate_tick::{TickConfig, TickPolicy};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MonitorConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`SessionMonitor`](crate::SessionMonitor).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// How often the status is recomputed without any auth event.
    pub period: Duration,

    /// Lead time before expiry at which the session counts as expiring soon.
    pub warning_threshold_minutes: u64,

    /// What to do when the runtime stalls past several periods.
    pub policy: TickPolicy,

    /// Random delay (0..jitter) before the first timed recomputation.
    pub jitter: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(30),
            warning_threshold_minutes: DEFAULT_WARNING_THRESHOLD_MINUTES,
            policy: TickPolicy::Skip,
            jitter: Duration::from_millis(250),
        }
    }
}

impl MonitorConfig {
    /// Ticker settings for the monitor's `sessionCheck` task.
    pub fn tick_config(&self) -> TickConfig {
        TickConfig {
            period: self.period,
            policy: self.policy,
            initial_jitter: self.jitter,
        }
    }
}

// ---------------------------------------------------------------------------
// WarningConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`TokenWarning`](crate::TokenWarning).
///
/// Runs at a tighter cadence than the monitor so the countdown in the
/// message stays reasonably fresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningConfig {
    pub period: Duration,
    pub threshold_minutes: u64,
    pub locale: Locale,
    pub policy: TickPolicy,
    pub jitter: Duration,
}

impl Default for WarningConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(10),
            threshold_minutes: DEFAULT_WARNING_THRESHOLD_MINUTES,
            locale: Locale::default(),
            policy: TickPolicy::Skip,
            jitter: Duration::from_millis(250),
        }
    }
}

impl WarningConfig {
    /// Ticker settings for the `warningCheck` task.
    pub fn tick_config(&self) -> TickConfig {
        TickConfig {
            period: self.period,
            policy: self.policy,
            initial_jitter: self.jitter,
        }
    }
}

// ---------------------------------------------------------------------------
// Locale
// ---------------------------------------------------------------------------

/// Language of the user-facing warning strings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Locale {
    #[default]
    English,
    #[serde(rename = "pt-BR")]
    PortugueseBr,
}

impl Locale {
    /// Banner text for a session with `remaining_secs` left.
    pub fn expiring_message(self, remaining_secs: u64) -> String {
        let minutes = remaining_secs / 60;
        let seconds = remaining_secs % 60;
        match self {
            Locale::English => {
                format!("Your session will expire in {minutes}m {seconds}s. Save your work.")
            }
            Locale::PortugueseBr => {
                format!("Sua sessão expirará em {minutes}m {seconds}s. Salve seu trabalho.")
            }
        }
    }

    /// Banner text for an expired session.
    pub fn expired_message(self) -> &'static str {
        match self {
            Locale::English => {
                "Your session has expired. You will be redirected to the login page."
            }
            Locale::PortugueseBr => "Sua sessão expirou. Você será redirecionado para o login.",
        }
    }

    /// Short label for compact displays (navigation bars, status lines).
    pub fn badge_label(self) -> &'static str {
        match self {
            Locale::English => "Session expiring",
            Locale::PortugueseBr => "Sessão expirando",
        }
    }
}
