use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AlertError;

pub const MIN_LOOKAHEAD_DAYS: u8 = 1;
pub const MAX_LOOKAHEAD_DAYS: u8 = 7;
pub const MIN_THRESHOLD_MM: f64 = 0.5;
pub const MAX_THRESHOLD_MM: f64 = 50.0;

/// Prefix some providers put in front of a phone number (`whatsapp:+91...`).
pub const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Opaque, unique subscriber identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SubscriberId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SubscriberId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Language the alert is written in. Hindi is the primary language,
/// English the secondary one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguagePreference {
    #[default]
    Hindi,
    English,
    Both,
}

impl LanguagePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguagePreference::Hindi => "hindi",
            LanguagePreference::English => "english",
            LanguagePreference::Both => "both",
        }
    }
}

impl fmt::Display for LanguagePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguagePreference {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hindi" | "hi" | "primary" => Ok(LanguagePreference::Hindi),
            "english" | "en" | "secondary" => Ok(LanguagePreference::English),
            "both" => Ok(LanguagePreference::Both),
            other => Err(AlertError::Other(format!("unknown language preference '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Optional display name ("Nashik", "Pune district").
    #[serde(default)]
    pub name: Option<String>,
}

impl Location {
    /// Display name, falling back to the coordinates.
    pub fn label(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{:.4}, {:.4}", self.latitude, self.longitude),
        }
    }
}

/// How far ahead to look and how much rain counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertWindow {
    pub lookahead_days: u8,
    /// Daily rain volume in millimetres.
    pub threshold_mm: f64,
}

/// One subscriber's rain-alert settings.
///
/// `last_notified` is written only after a confirmed send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriberId,
    pub destination: String,
    pub location: Location,
    pub window: AlertWindow,
    #[serde(default)]
    pub language: LanguagePreference,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub last_notified: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl Subscription {
    /// Check the settings ranges and the destination format.
    pub fn validate(&self) -> Result<(), AlertError> {
        let invalid = |reason: String| AlertError::InvalidSubscription {
            id: self.id.to_string(),
            reason,
        };

        let days = self.window.lookahead_days;
        if !(MIN_LOOKAHEAD_DAYS..=MAX_LOOKAHEAD_DAYS).contains(&days) {
            return Err(invalid(format!(
                "lookahead_days {days} outside {MIN_LOOKAHEAD_DAYS}..={MAX_LOOKAHEAD_DAYS}"
            )));
        }

        let threshold = self.window.threshold_mm;
        if !(MIN_THRESHOLD_MM..=MAX_THRESHOLD_MM).contains(&threshold) {
            return Err(invalid(format!(
                "threshold_mm {threshold} outside {MIN_THRESHOLD_MM}..={MAX_THRESHOLD_MM}"
            )));
        }

        let Location { latitude, longitude, .. } = self.location;
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(invalid(format!("coordinates ({latitude}, {longitude}) out of range")));
        }

        if !is_valid_destination(&self.destination) {
            return Err(invalid(format!("destination '{}' is not an E.164 number", self.destination)));
        }

        Ok(())
    }
}

/// Strip the optional `whatsapp:` prefix and surrounding whitespace.
pub fn bare_destination(address: &str) -> &str {
    let trimmed = address.trim();
    trimmed.strip_prefix(WHATSAPP_PREFIX).unwrap_or(trimmed)
}

/// `+` followed by 8 to 15 digits, the first one non-zero.
pub fn is_valid_destination(address: &str) -> bool {
    let Some(digits) = bare_destination(address).strip_prefix('+') else {
        return false;
    };
    (8..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription() -> Subscription {
        Subscription {
            id: SubscriberId::new("farmer-1"),
            destination: "+919812345678".to_string(),
            location: Location {
                latitude: 19.99,
                longitude: 73.79,
                name: Some("Nashik".to_string()),
            },
            window: AlertWindow {
                lookahead_days: 4,
                threshold_mm: 2.5,
            },
            language: LanguagePreference::Hindi,
            active: true,
            last_notified: None,
        }
    }

    #[test]
    fn valid_subscription_passes() {
        assert!(subscription().validate().is_ok());
    }

    #[test]
    fn lookahead_out_of_range_is_rejected() {
        let mut sub = subscription();
        sub.window.lookahead_days = 0;
        assert!(sub.validate().is_err());
        sub.window.lookahead_days = 8;
        assert!(sub.validate().is_err());
    }

    #[test]
    fn threshold_bounds_are_inclusive() {
        let mut sub = subscription();
        sub.window.threshold_mm = 0.5;
        assert!(sub.validate().is_ok());
        sub.window.threshold_mm = 50.0;
        assert!(sub.validate().is_ok());
        sub.window.threshold_mm = 50.1;
        assert!(sub.validate().is_err());
    }

    #[test]
    fn destination_formats() {
        assert!(is_valid_destination("+919812345678"));
        assert!(is_valid_destination("whatsapp:+919812345678"));
        assert!(!is_valid_destination("919812345678"));
        assert!(!is_valid_destination("+0123456789"));
        assert!(!is_valid_destination("+91-98123"));
        assert!(!is_valid_destination(""));
    }

    #[test]
    fn location_label_falls_back_to_coordinates() {
        let mut location = subscription().location;
        assert_eq!(location.label(), "Nashik");
        location.name = Some("  ".to_string());
        assert_eq!(location.label(), "19.9900, 73.7900");
    }

    #[test]
    fn language_parses_aliases() {
        assert_eq!("hi".parse::<LanguagePreference>().unwrap(), LanguagePreference::Hindi);
        assert_eq!("secondary".parse::<LanguagePreference>().unwrap(), LanguagePreference::English);
        assert_eq!("BOTH".parse::<LanguagePreference>().unwrap(), LanguagePreference::Both);
        assert!("fr".parse::<LanguagePreference>().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{
            "id": "f-2",
            "destination": "+919800000001",
            "location": {"latitude": 18.52, "longitude": 73.85},
            "window": {"lookahead_days": 3, "threshold_mm": 5.0}
        }"#;
        let sub: Subscription = serde_json::from_str(json).unwrap();
        assert!(sub.active);
        assert_eq!(sub.language, LanguagePreference::Hindi);
        assert!(sub.last_notified.is_none());
        assert!(sub.location.name.is_none());
    }
}
