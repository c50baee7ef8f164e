use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attachment::RunId;
use crate::unit::{SubUnit, UnitUnderTest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseOutcome {
    Pass,
    Fail,
    Skip,
    Error,
}

impl PhaseOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseOutcome::Pass => "PASS",
            PhaseOutcome::Fail => "FAIL",
            PhaseOutcome::Skip => "SKIP",
            PhaseOutcome::Error => "ERROR",
        }
    }
}

impl fmt::Display for PhaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasurementOutcome {
    Pass,
    Fail,
    Unset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub outcome: MeasurementOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measured_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub outcome: PhaseOutcome,
    pub start_time_millis: i64,
    pub end_time_millis: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub measurements: Vec<Measurement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
}

/// Payload of `POST /runs`. Attachments are not part of it; they are
/// uploaded and linked once the run exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRun {
    pub unit_under_test: UnitUnderTest,
    pub run_passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "iso_duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<Duration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phases: Vec<Phase>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_units: Vec<SubUnit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogRecord>,
}

impl CreateRun {
    pub fn new(unit_under_test: UnitUnderTest, run_passed: bool) -> Self {
        Self {
            unit_under_test,
            run_passed,
            procedure_id: None,
            procedure_name: None,
            procedure_version: None,
            started_at: None,
            duration: None,
            phases: Vec::new(),
            sub_units: Vec::new(),
            logs: Vec::new(),
        }
    }

    pub fn with_procedure_id(mut self, id: impl Into<String>) -> Self {
        self.procedure_id = Some(id.into());
        self
    }

    pub fn with_procedure_name(mut self, name: impl Into<String>) -> Self {
        self.procedure_name = Some(name.into());
        self
    }

    pub fn with_timing(mut self, started_at: DateTime<Utc>, duration: Duration) -> Self {
        self.started_at = Some(started_at);
        self.duration = Some(duration);
        self
    }

    pub fn with_phases(mut self, phases: Vec<Phase>) -> Self {
        self.phases = phases;
        self
    }

    pub fn with_sub_units(mut self, sub_units: Vec<SubUnit>) -> Self {
        self.sub_units = sub_units;
        self
    }

    pub fn with_logs(mut self, logs: Vec<LogRecord>) -> Self {
        self.logs = logs;
        self
    }
}

/// Body returned by run creation and report import.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedRun {
    pub id: RunId,
    #[serde(default)]
    pub url: Option<String>,
}

/// `POST /import` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport<'a> {
    pub upload_id: &'a str,
    pub importer: Importer,
    pub client: &'a str,
    pub client_version: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Importer {
    Openhtf,
}

/// An attachment as listed on a fetched run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAttachment {
    pub name: String,
    pub content_type: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// A run as returned by `GET /runs/{id}` and `GET /runs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub run_passed: Option<bool>,
    #[serde(default)]
    pub unit_under_test: Option<UnitUnderTest>,
    #[serde(default)]
    pub procedure_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attachments: Vec<RunAttachment>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunList {
    #[serde(default)]
    pub runs: Vec<Run>,
}

/// ISO 8601 durations (`PT1M30.5S`) as the server expects them.
pub mod iso_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(d: Duration) -> String {
        let total = d.as_secs();
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let secs = total % 60;
        let millis = d.subsec_millis();

        let mut out = String::from("PT");
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if secs > 0 || millis > 0 || (hours == 0 && minutes == 0) {
            if millis > 0 {
                let frac = format!("{millis:03}");
                out.push_str(&format!("{secs}.{}S", frac.trim_end_matches('0')));
            } else {
                out.push_str(&format!("{secs}S"));
            }
        }
        out
    }

    pub fn parse(s: &str) -> Option<Duration> {
        let rest = s.strip_prefix("PT")?;
        let mut total = 0f64;
        let mut num = String::new();
        for c in rest.chars() {
            match c {
                '0'..='9' | '.' => num.push(c),
                'H' | 'M' | 'S' => {
                    let value: f64 = num.parse().ok()?;
                    num.clear();
                    total += match c {
                        'H' => value * 3600.0,
                        'M' => value * 60.0,
                        _ => value,
                    };
                }
                _ => return None,
            }
        }
        if !num.is_empty() {
            return None;
        }
        Duration::try_from_secs_f64(total).ok()
    }

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_str(&format(*d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        match raw {
            None => Ok(None),
            Some(raw) => parse(&raw).map(Some).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid ISO 8601 duration: {raw}"))
            }),
        }
    }
}
