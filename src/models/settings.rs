use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Immediate,
    #[default]
    Hourly,
    Daily,
}

impl Frequency {
    pub fn cycle(self) -> Self {
        match self {
            Self::Immediate => Self::Hourly,
            Self::Hourly => Self::Daily,
            Self::Daily => Self::Immediate,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Immediate => "Immediate",
            Self::Hourly => "Hourly",
            Self::Daily => "Daily",
        }
    }

    /// How often the background refresh runs for this setting.
    pub fn interval(self) -> Duration {
        match self {
            Self::Immediate => Duration::from_secs(15 * 60),
            Self::Hourly => Duration::from_secs(60 * 60),
            Self::Daily => Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub enabled: bool,
    /// "HH:MM"
    pub start: String,
    /// "HH:MM"
    pub end: String,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: "22:00".to_string(),
            end: "08:00".to_string(),
        }
    }
}

impl QuietHours {
    /// Whether `time` falls inside the window. Windows may wrap past midnight.
    /// A disabled window or one with unparsable bounds never matches.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if !self.enabled {
            return false;
        }
        let (Some(start), Some(end)) = (parse_hhmm(&self.start), parse_hhmm(&self.end)) else {
            return false;
        };

        if start <= end {
            time >= start && time < end
        } else {
            time >= start || time < end
        }
    }
}

pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub enabled: bool,
    pub frequency: Frequency,
    pub quiet_hours: QuietHours,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: Frequency::Hourly,
            quiet_hours: QuietHours::default(),
        }
    }
}
