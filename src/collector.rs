//! Scrape orchestration and metric family assembly.
//!
//! Every inbound scrape refreshes all printers, then rebuilds the metric
//! families from scratch. Nothing accumulates across scrapes: gauges from an
//! offline printer disappear instead of freezing at their last value.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinSet;
use tracing::debug;

use crate::client::{PrinterClient, ScrapeSnapshot};
use crate::mapping::{self, PrinterState};

/// One sample: label pairs plus a numeric value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
}

/// Exposition type of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FamilyKind {
    Gauge,
    Info,
}

impl FamilyKind {
    /// The TYPE comment string for the exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            FamilyKind::Gauge => "gauge",
            FamilyKind::Info => "info",
        }
    }
}

/// A named group of samples sharing a help text, merged across printers
/// within one render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: FamilyKind,
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    fn new(name: &'static str, help: &'static str, kind: FamilyKind) -> Self {
        Self {
            name,
            help,
            kind,
            samples: Vec::new(),
        }
    }
}

/// Families keyed by name, created lazily the first time a name is seen.
///
/// Rebuilt fresh for every render pass; there is deliberately no registry
/// that outlives one scrape.
struct FamilySet {
    families: Vec<MetricFamily>,
    index: HashMap<&'static str, usize>,
}

impl FamilySet {
    fn new() -> Self {
        Self {
            families: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn family(
        &mut self,
        name: &'static str,
        help: &'static str,
        kind: FamilyKind,
    ) -> &mut MetricFamily {
        if let Some(&idx) = self.index.get(name) {
            return &mut self.families[idx];
        }
        self.families.push(MetricFamily::new(name, help, kind));
        let idx = self.families.len() - 1;
        self.index.insert(name, idx);
        &mut self.families[idx]
    }
}

/// Build metric families from one cycle's snapshots.
///
/// Pure: rendering the same snapshots twice yields identical families.
pub fn assemble(snapshots: &[ScrapeSnapshot]) -> Vec<MetricFamily> {
    let mut gauges = FamilySet::new();
    let mut infos = FamilySet::new();
    let mut states = FamilySet::new();

    // Emitted for every configured printer, up or down.
    let mut scrape_successful = MetricFamily::new(
        "prusalink_scrape_successful",
        "Indicates if the scrape from the printer was successful",
        FamilyKind::Gauge,
    );

    for snapshot in snapshots {
        let labels = mapping::labels(snapshot);
        let derived = mapping::derive(snapshot);

        for record in derived.gauges {
            // An absent reading is omitted entirely, never reported as zero.
            let Some(value) = record.value else { continue };
            gauges
                .family(record.name, record.help, FamilyKind::Gauge)
                .samples
                .push(Sample {
                    labels: labels.clone(),
                    value,
                });
        }

        for record in derived.info {
            let mut sample_labels = labels.clone();
            sample_labels.extend(record.fields);
            infos
                .family(record.name, record.help, FamilyKind::Info)
                .samples
                .push(Sample {
                    labels: sample_labels,
                    value: 1.0,
                });
        }

        // The exposition format has no native enum/state-set type, so a
        // state is encoded as one 0/1 sample per possible value, exactly one
        // of which is set.
        // TODO: emit an OpenMetrics stateset once downstream consumers take one
        for record in derived.states {
            let family = states.family(record.name, record.help, FamilyKind::Gauge);
            for state in PrinterState::ALL {
                let mut sample_labels = labels.clone();
                sample_labels.push(("state", state.as_str().to_string()));
                family.samples.push(Sample {
                    labels: sample_labels,
                    value: if state == record.current { 1.0 } else { 0.0 },
                });
            }
        }

        scrape_successful.samples.push(Sample {
            labels,
            value: if snapshot.is_up() { 1.0 } else { 0.0 },
        });
    }

    let mut families = vec![scrape_successful];
    families.extend(gauges.families);
    families.extend(infos.families);
    families.extend(states.families);
    families
}

/// Render metric families in Prometheus text exposition format.
pub fn encode(families: &[MetricFamily]) -> String {
    let mut output = Vec::with_capacity(families.len() * 200);

    for family in families {
        writeln!(output, "# HELP {} {}", family.name, family.help).ok();
        writeln!(output, "# TYPE {} {}", family.name, family.kind.as_str()).ok();
        for sample in &family.samples {
            writeln!(
                output,
                "{}{} {}",
                family.name,
                format_labels(&sample.labels),
                format_value(sample.value)
            )
            .ok();
        }
    }

    String::from_utf8(output).unwrap_or_default()
}

/// Counters describing scrape activity, for `/ready` and shutdown logging.
#[derive(Debug, Clone, Default)]
pub struct ScrapeStats {
    /// Completed scrape cycles.
    pub scrapes_total: u64,
    /// Configured printers.
    pub printers_total: usize,
    /// Printers that were up in the most recent cycle.
    pub printers_up: usize,
}

/// Fans a scrape out across every configured printer and merges the results
/// into metric families.
pub struct MetricCollector {
    printers: Vec<PrinterClient>,
    stats: RwLock<ScrapeStats>,
}

impl MetricCollector {
    /// Create a collector over an already-validated, non-empty printer list.
    pub fn new(printers: Vec<PrinterClient>) -> Self {
        Self {
            printers,
            stats: RwLock::new(ScrapeStats::default()),
        }
    }

    /// Number of configured printers.
    pub fn printer_count(&self) -> usize {
        self.printers.len()
    }

    /// Current scrape statistics.
    pub fn stats(&self) -> ScrapeStats {
        self.stats.read().clone()
    }

    /// Refresh every printer and build this cycle's metric families.
    pub async fn scrape(&self) -> Vec<MetricFamily> {
        let snapshots = self.refresh_all().await;
        let up = snapshots.iter().filter(|s| s.is_up()).count();

        {
            let mut stats = self.stats.write();
            stats.scrapes_total += 1;
            stats.printers_total = self.printers.len();
            stats.printers_up = up;
        }

        debug!(printers = snapshots.len(), up, "scrape cycle complete");
        assemble(&snapshots)
    }

    /// Refresh all printers concurrently; rendering only starts once every
    /// refresh has finished.
    async fn refresh_all(&self) -> Vec<ScrapeSnapshot> {
        let mut tasks = JoinSet::new();
        for (index, client) in self.printers.iter().enumerate() {
            let client = client.clone();
            tasks.spawn(async move { (index, client.refresh().await) });
        }

        // Keep configuration order so output is stable within a render.
        let mut slots: Vec<Option<ScrapeSnapshot>> = vec![None; self.printers.len()];
        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, snapshot)) = joined {
                slots[index] = Some(snapshot);
            }
        }
        slots.into_iter().flatten().collect()
    }
}

/// Create a shareable collector handle.
pub type SharedCollector = Arc<MetricCollector>;

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for the exposition format.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Format label pairs for the exposition format.
fn format_labels(labels: &[(&'static str, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}
