//! Incoming event requests and their validation.
//!
//! The request mirrors the JSON body clients post: a flat object with
//! `title`, `priority`, `type` and whichever kind-specific fields apply.
//! [`EventRequest::validate`] turns it into a [`NewEvent`] or a
//! [`ValidationError`]; nothing is placed before validation succeeds.

use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::{EventKind, NewEvent, PreferredWindow, Priority};
use crate::error::ValidationError;

/// Raw event creation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    /// Event type tag. Defaults to `fixed` when absent.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    /// Minutes. Accepts a number or a numeric string.
    #[serde(default, deserialize_with = "lenient_integer")]
    pub duration: Option<i64>,
    /// Days between occurrences. Accepts a number or a numeric string.
    #[serde(default, deserialize_with = "lenient_integer")]
    pub frequency: Option<i64>,
    #[serde(default)]
    pub preferred_time: Option<String>,
    #[serde(default)]
    pub earliest_start: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntegerOrText {
    Integer(i64),
    Text(String),
}

fn lenient_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<IntegerOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(IntegerOrText::Integer(n)) => Ok(Some(n)),
        Some(IntegerOrText::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(IntegerOrText::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected an integer, got '{s}'"))),
    }
}

/// Parse a request timestamp and normalize it to UTC.
///
/// Accepts RFC 3339 with an offset, or a naive `YYYY-MM-DDTHH:MM[:SS[.fff]][Z]`
/// value which is read as UTC. Sub-second precision is dropped.
pub fn parse_datetime(field: &'static str, value: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc).trunc_subsecs(0));
    }

    let naive = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    let naive = naive.split('.').next().unwrap_or(naive);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M"))
        .map(|dt| dt.and_utc())
        .map_err(|_| ValidationError::InvalidDateTime {
            field,
            value: value.to_string(),
        })
}

/// Blank strings count as absent.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl EventRequest {
    fn require<'a>(
        kind: &str,
        field: &'static str,
        value: &'a Option<String>,
    ) -> Result<&'a str, ValidationError> {
        present(value).ok_or_else(|| ValidationError::MissingField {
            kind: kind.to_string(),
            field,
        })
    }

    fn require_datetime(
        kind: &str,
        field: &'static str,
        value: &Option<String>,
    ) -> Result<DateTime<Utc>, ValidationError> {
        parse_datetime(field, Self::require(kind, field, value)?)
    }

    fn require_positive(
        kind: &str,
        field: &'static str,
        value: Option<i64>,
    ) -> Result<i64, ValidationError> {
        match value {
            None => Err(ValidationError::MissingField {
                kind: kind.to_string(),
                field,
            }),
            Some(n) if n <= 0 => Err(ValidationError::InvalidValue {
                field,
                message: format!("must be positive, got {n}"),
            }),
            Some(n) => Ok(n),
        }
    }

    /// A positive minute count that fits in a [`Duration`].
    fn require_minutes(kind: &str, value: Option<i64>) -> Result<i64, ValidationError> {
        let minutes = Self::require_positive(kind, "duration", value)?;
        Duration::try_minutes(minutes)
            .map(|_| minutes)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "duration",
                message: format!("{minutes} minutes is out of range"),
            })
    }

    /// A positive day step whose first repeat after `start_date` is still a
    /// representable instant.
    fn require_frequency(
        kind: &str,
        start_date: DateTime<Utc>,
        value: Option<i64>,
    ) -> Result<i64, ValidationError> {
        let days = Self::require_positive(kind, "frequency", value)?;
        Duration::try_days(days)
            .and_then(|step| start_date.checked_add_signed(step))
            .map(|_| days)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "frequency",
                message: format!("{days} days is beyond the supported date range"),
            })
    }

    fn require_window(kind: &str, value: &Option<String>) -> Result<PreferredWindow, ValidationError> {
        PreferredWindow::parse(Self::require(kind, "preferred_time", value)?)
    }

    /// Validate and normalize the request.
    pub fn validate(&self) -> Result<NewEvent, ValidationError> {
        let kind_name = present(&self.kind).unwrap_or("fixed").to_ascii_lowercase();
        let kind_name = kind_name.as_str();

        let title = present(&self.title).ok_or(ValidationError::EmptyTitle)?;
        let priority: Priority = Self::require(kind_name, "priority", &self.priority)?.parse()?;

        let kind = match kind_name {
            "fixed" => {
                let start = Self::require_datetime(kind_name, "start", &self.start)?;
                let end = Self::require_datetime(kind_name, "end", &self.end)?;
                if start >= end {
                    return Err(ValidationError::InvalidTimeRange {
                        start_field: "start",
                        end_field: "end",
                    });
                }
                EventKind::Fixed { start, end }
            }
            "recurring_with_preferred_time" | "recurring_without_preferred_time" => {
                let start_date = Self::require_datetime(kind_name, "start_date", &self.start_date)?;
                let duration_minutes = Self::require_minutes(kind_name, self.duration)?;
                let frequency_days = Self::require_frequency(kind_name, start_date, self.frequency)?;
                if kind_name == "recurring_with_preferred_time" {
                    EventKind::RecurringWithPreferredTime {
                        start_date,
                        duration_minutes,
                        frequency_days,
                        preferred_window: Self::require_window(kind_name, &self.preferred_time)?,
                    }
                } else {
                    EventKind::RecurringWithoutPreferredTime {
                        start_date,
                        duration_minutes,
                        frequency_days,
                    }
                }
            }
            "flexible_with_preferred_time" | "flexible_without_preferred_time" => {
                let duration_minutes = Self::require_minutes(kind_name, self.duration)?;
                let earliest_start =
                    Self::require_datetime(kind_name, "earliest_start", &self.earliest_start)?;
                let deadline = Self::require_datetime(kind_name, "deadline", &self.deadline)?;
                if earliest_start >= deadline {
                    return Err(ValidationError::InvalidTimeRange {
                        start_field: "earliest_start",
                        end_field: "deadline",
                    });
                }
                if kind_name == "flexible_with_preferred_time" {
                    EventKind::FlexibleWithPreferredTime {
                        duration_minutes,
                        preferred_window: Self::require_window(kind_name, &self.preferred_time)?,
                        earliest_start,
                        deadline,
                    }
                } else {
                    EventKind::FlexibleWithoutPreferredTime {
                        duration_minutes,
                        earliest_start,
                        deadline,
                    }
                }
            }
            other => return Err(ValidationError::UnknownKind(other.to_string())),
        };

        Ok(NewEvent {
            title: title.to_string(),
            priority,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request(json: serde_json::Value) -> EventRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn fixed_request_defaults_type() {
        let event = request(serde_json::json!({
            "title": "Standup",
            "priority": "high",
            "start": "2024-01-01T09:00",
            "end": "2024-01-01T09:15:00"
        }))
        .validate()
        .unwrap();

        assert_eq!(event.priority, Priority::High);
        assert_eq!(
            event.kind,
            EventKind::Fixed {
                start: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2024, 1, 1, 9, 15, 0).unwrap(),
            }
        );
    }

    #[test]
    fn timestamps_normalize_to_utc() {
        let with_offset = parse_datetime("start", "2024-01-01T10:00:00+02:00").unwrap();
        assert_eq!(with_offset, Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap());

        let browser = parse_datetime("start", "2024-01-01T08:00:00.000Z").unwrap();
        assert_eq!(browser, with_offset);

        let naive_fraction = parse_datetime("start", "2024-01-01T08:00:00.123").unwrap();
        assert_eq!(naive_fraction, with_offset);

        assert!(parse_datetime("start", "yesterday").is_err());
    }

    #[test]
    fn duration_accepts_numeric_strings() {
        let event = request(serde_json::json!({
            "title": "Gym",
            "priority": "medium",
            "type": "recurring_without_preferred_time",
            "start_date": "2024-01-01T00:00",
            "duration": "45",
            "frequency": 2
        }))
        .validate()
        .unwrap();

        assert_eq!(event.kind.duration_minutes(), 45);
        assert!(event.kind.is_recurring());
    }

    #[test]
    fn rejects_blank_title() {
        let err = request(serde_json::json!({
            "title": "   ",
            "priority": "low",
            "start": "2024-01-01T09:00",
            "end": "2024-01-01T10:00"
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err, ValidationError::EmptyTitle);
    }

    #[test]
    fn rejects_missing_kind_field() {
        let err = request(serde_json::json!({
            "title": "Essay",
            "priority": "low",
            "type": "flexible_without_preferred_time",
            "duration": 30,
            "earliest_start": "2024-01-01T09:00"
        }))
        .validate()
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                kind: "flexible_without_preferred_time".into(),
                field: "deadline"
            }
        );
    }

    #[test]
    fn rejects_non_positive_numbers() {
        let base = serde_json::json!({
            "title": "Yoga",
            "priority": "low",
            "type": "recurring_without_preferred_time",
            "start_date": "2024-01-01T00:00",
            "duration": 0,
            "frequency": 1
        });
        assert!(matches!(
            request(base.clone()).validate(),
            Err(ValidationError::InvalidValue { field: "duration", .. })
        ));

        let mut zero_frequency = base;
        zero_frequency["duration"] = 30.into();
        zero_frequency["frequency"] = 0.into();
        assert!(matches!(
            request(zero_frequency).validate(),
            Err(ValidationError::InvalidValue { field: "frequency", .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_numbers() {
        let base = serde_json::json!({
            "title": "Yoga",
            "priority": "low",
            "type": "recurring_without_preferred_time",
            "start_date": "2024-01-01T00:00",
            "duration": 30,
            "frequency": 1
        });

        let mut far_frequency = base.clone();
        far_frequency["frequency"] = 1_000_000_000_000i64.into();
        assert!(matches!(
            request(far_frequency).validate(),
            Err(ValidationError::InvalidValue { field: "frequency", .. })
        ));

        let mut huge_duration = base.clone();
        huge_duration["duration"] = i64::MAX.into();
        assert!(matches!(
            request(huge_duration).validate(),
            Err(ValidationError::InvalidValue { field: "duration", .. })
        ));

        let mut past_the_calendar = base.clone();
        past_the_calendar["frequency"] = 100_000_000.into();
        assert!(matches!(
            request(past_the_calendar).validate(),
            Err(ValidationError::InvalidValue { field: "frequency", .. })
        ));

        let mut sparse = base;
        sparse["frequency"] = 50_000_000.into();
        assert!(request(sparse).validate().is_ok());
    }

    #[test]
    fn rejects_inverted_ranges() {
        let err = request(serde_json::json!({
            "title": "Report",
            "priority": "high",
            "type": "flexible_without_preferred_time",
            "duration": 30,
            "earliest_start": "2024-01-02T09:00",
            "deadline": "2024-01-01T09:00"
        }))
        .validate()
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTimeRange { .. }));

        let err = request(serde_json::json!({
            "title": "Call",
            "priority": "high",
            "start": "2024-01-01T10:00",
            "end": "2024-01-01T10:00"
        }))
        .validate()
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTimeRange { .. }));
    }

    #[test]
    fn rejects_malformed_window_and_unknown_type() {
        let err = request(serde_json::json!({
            "title": "Read",
            "priority": "low",
            "type": "flexible_with_preferred_time",
            "duration": 30,
            "preferred_time": "17:00 - 13:00",
            "earliest_start": "2024-01-01T09:00",
            "deadline": "2024-01-02T09:00"
        }))
        .validate()
        .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPreferredWindow(_)));

        let err = request(serde_json::json!({
            "title": "Read",
            "priority": "low",
            "type": "floating"
        }))
        .validate()
        .unwrap_err();
        assert_eq!(err, ValidationError::UnknownKind("floating".into()));
    }
}
