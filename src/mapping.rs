//! Mapping from scraped PrusaLink data to metric records.
//!
//! Everything in this module is a pure function of the current
//! [`ScrapeSnapshot`], so a scrape cycle can be derived and re-derived
//! without side effects.

use serde_json::Value;
use tracing::warn;

use crate::client::{Resource, ScrapeSnapshot};

/// Walk `root` key by key, returning `None` on the first missing key or
/// non-object intermediate value.
///
/// Absence is an expected condition (printers omit fields depending on model
/// and state), so it degrades to "no value" with a warning instead of an
/// error.
pub fn safe_get<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = root;
    for key in path {
        match current.get(key) {
            Some(value) => current = value,
            None => {
                warn!(path = path.join("."), "value missing from scrape data");
                return None;
            }
        }
    }
    Some(current)
}

/// Look up a string field in a snapshot resource, with a fallback.
pub fn safe_str(
    snapshot: &ScrapeSnapshot,
    resource: Resource,
    path: &[&str],
    fallback: &str,
) -> String {
    snapshot
        .resource(resource)
        .and_then(|root| safe_get(root, path))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

/// Look up a numeric field in a snapshot resource.
///
/// Absent is `None`, never zero: a missing reading must disappear from the
/// output rather than show up as a false 0.
pub fn safe_f64(snapshot: &ScrapeSnapshot, resource: Resource, path: &[&str]) -> Option<f64> {
    snapshot
        .resource(resource)
        .and_then(|root| safe_get(root, path))
        .and_then(Value::as_f64)
}

/// Look up a field for display as a label value (strings pass through,
/// numbers are rendered in decimal).
pub fn safe_display(
    snapshot: &ScrapeSnapshot,
    resource: Resource,
    path: &[&str],
    fallback: &str,
) -> String {
    match snapshot
        .resource(resource)
        .and_then(|root| safe_get(root, path))
    {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => fallback.to_string(),
    }
}

/// The closed set of printer states reported by PrusaLink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterState {
    Idle,
    Busy,
    Printing,
    Paused,
    Finished,
    Stopped,
    Error,
    Attention,
    Ready,
    Unknown,
}

impl PrinterState {
    /// Every possible state, in the order samples are emitted.
    pub const ALL: [PrinterState; 10] = [
        PrinterState::Idle,
        PrinterState::Busy,
        PrinterState::Printing,
        PrinterState::Paused,
        PrinterState::Finished,
        PrinterState::Stopped,
        PrinterState::Error,
        PrinterState::Attention,
        PrinterState::Ready,
        PrinterState::Unknown,
    ];

    /// The state name as reported by the API and used as the `state` label.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrinterState::Idle => "IDLE",
            PrinterState::Busy => "BUSY",
            PrinterState::Printing => "PRINTING",
            PrinterState::Paused => "PAUSED",
            PrinterState::Finished => "FINISHED",
            PrinterState::Stopped => "STOPPED",
            PrinterState::Error => "ERROR",
            PrinterState::Attention => "ATTENTION",
            PrinterState::Ready => "READY",
            PrinterState::Unknown => "UNKNOWN",
        }
    }

    /// Parse an API state string; anything unrecognized is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "IDLE" => PrinterState::Idle,
            "BUSY" => PrinterState::Busy,
            "PRINTING" => PrinterState::Printing,
            "PAUSED" => PrinterState::Paused,
            "FINISHED" => PrinterState::Finished,
            "STOPPED" => PrinterState::Stopped,
            "ERROR" => PrinterState::Error,
            "ATTENTION" => PrinterState::Attention,
            "READY" => PrinterState::Ready,
            _ => PrinterState::Unknown,
        }
    }

    /// Whether a job is currently in flight.
    ///
    /// Job timing fields are meaningless once a job is no longer active, so
    /// job metrics are only emitted in the active states.
    pub fn job_active(&self) -> bool {
        !matches!(
            self,
            PrinterState::Idle
                | PrinterState::Finished
                | PrinterState::Stopped
                | PrinterState::Unknown
        )
    }
}

impl std::fmt::Display for PrinterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Descriptive string fields exposed as labels with a constant value of 1.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoRecord {
    pub name: &'static str,
    pub help: &'static str,
    pub fields: Vec<(&'static str, String)>,
}

/// A numeric reading; `None` means "omit this sample this cycle".
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeRecord {
    pub name: &'static str,
    pub help: &'static str,
    pub value: Option<f64>,
}

/// A state-set reading, rendered as one 0/1 sample per possible state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateRecord {
    pub name: &'static str,
    pub help: &'static str,
    pub current: PrinterState,
}

/// All records derived from one printer in one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrinterMetrics {
    pub info: Vec<InfoRecord>,
    pub states: Vec<StateRecord>,
    pub gauges: Vec<GaugeRecord>,
}

/// Gauges emitted for every up printer: name, help, resource, field path.
const GAUGE_TABLE: &[(&str, &str, Resource, &[&str])] = &[
    (
        "prusalink_nozzle_diameter",
        "Nozzle diameter in mm",
        Resource::Info,
        &["nozzle_diameter"],
    ),
    (
        "prusalink_speed",
        "Configured print speed in percent",
        Resource::Status,
        &["printer", "speed"],
    ),
    (
        "prusalink_flow_rate",
        "Configured flow rate in percent",
        Resource::Status,
        &["printer", "flow"],
    ),
    (
        "prusalink_bed_temp_current",
        "Current bed temperature in Celsius",
        Resource::Status,
        &["printer", "temp_bed"],
    ),
    (
        "prusalink_bed_temp_desired",
        "Target bed temperature in Celsius",
        Resource::Status,
        &["printer", "target_bed"],
    ),
    (
        "prusalink_nozzle_temp_current",
        "Current nozzle temperature in Celsius",
        Resource::Status,
        &["printer", "temp_nozzle"],
    ),
    (
        "prusalink_nozzle_temp_desired",
        "Target nozzle temperature in Celsius",
        Resource::Status,
        &["printer", "target_nozzle"],
    ),
    (
        "prusalink_axis_z",
        "Current Z axis position in mm",
        Resource::Status,
        &["printer", "axis_z"],
    ),
];

/// Gauges only emitted while a job is active.
const JOB_GAUGE_TABLE: &[(&str, &str, &[&str])] = &[
    (
        "prusalink_job_progress",
        "Progress of the current job in percent",
        &["progress"],
    ),
    (
        "prusalink_job_time_elapsed",
        "Time spent printing the current job in seconds",
        &["time_printing"],
    ),
    (
        "prusalink_job_time_remaining",
        "Estimated time remaining for the current job in seconds",
        &["time_remaining"],
    ),
];

/// Identity labels attached to every sample for this printer.
///
/// The serial number comes from the `info` resource, so it only exists while
/// the printer is up; it is never carried over from an earlier cycle.
pub fn labels(snapshot: &ScrapeSnapshot) -> Vec<(&'static str, String)> {
    let mut labels = vec![("printer", snapshot.host().to_string())];
    if snapshot.is_up() {
        labels.push((
            "serialnumber",
            safe_str(snapshot, Resource::Info, &["serial"], "Unknown"),
        ));
    }
    labels
}

/// Derive all metric records from one snapshot.
///
/// A down printer produces no records at all; the collector still emits its
/// success gauge.
pub fn derive(snapshot: &ScrapeSnapshot) -> PrinterMetrics {
    let mut metrics = PrinterMetrics::default();

    if !snapshot.is_up() {
        return metrics;
    }

    // Absent version fields are themselves informative, so the record is
    // emitted with "Unknown" rather than suppressed.
    metrics.info.push(InfoRecord {
        name: "prusalink_server_firmware_version",
        help: "Prusa firmware running on the printer",
        fields: vec![
            (
                "version",
                safe_str(snapshot, Resource::Version, &["server"], "Unknown"),
            ),
            (
                "api",
                safe_str(snapshot, Resource::Version, &["api"], "Unknown"),
            ),
        ],
    });

    let state = PrinterState::parse(&safe_str(
        snapshot,
        Resource::Status,
        &["printer", "state"],
        "UNKNOWN",
    ));

    metrics.states.push(StateRecord {
        name: "prusalink_printer_state",
        help: "Current printer state",
        current: state,
    });

    for &(name, help, resource, path) in GAUGE_TABLE {
        metrics.gauges.push(GaugeRecord {
            name,
            help,
            value: safe_f64(snapshot, resource, path),
        });
    }

    if state.job_active() {
        for &(name, help, path) in JOB_GAUGE_TABLE {
            metrics.gauges.push(GaugeRecord {
                name,
                help,
                value: safe_f64(snapshot, Resource::Job, path),
            });
        }

        metrics.info.push(InfoRecord {
            name: "prusalink_job",
            help: "Information about the current job",
            fields: vec![
                (
                    "filename",
                    safe_str(
                        snapshot,
                        Resource::Job,
                        &["file", "display_name"],
                        "Unknown",
                    ),
                ),
                (
                    "filesize",
                    safe_display(snapshot, Resource::Job, &["file", "size"], "Unknown"),
                ),
            ],
        });
    }

    metrics
}
