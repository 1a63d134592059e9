use std::sync::Arc;

use log::{debug, warn};
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};

use crate::error::{ExpositionError, InventoryError};
use crate::services::inventory::{ContainerRecord, InventorySource};

/// Static description of a gauge family: name, help text and label schema.
#[derive(Debug, PartialEq, Eq)]
pub struct FamilyDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

pub static CONTAINER_RUNNING_STATUS: FamilyDesc = FamilyDesc {
    name: "container_running_status",
    help: "container running status.",
    labels: &["name", "status"],
};

// Keeps the `status` label even though it is always "running", so existing
// dashboards and alert rules keep matching.
pub static CONTAINER_PID: FamilyDesc = FamilyDesc {
    name: "container_pid",
    help: "container process id.",
    labels: &["name", "status"],
};

impl FamilyDesc {
    /// `# HELP` / `# TYPE` preamble, escaped the way the text encoder escapes help.
    fn header(&self) -> String {
        format!(
            "# HELP {name} {help}\n# TYPE {name} gauge\n",
            name = self.name,
            help = self.help.replace('\\', "\\\\").replace('\n', "\\n")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Values in the same order as the family's `labels`.
    pub label_values: Vec<String>,
    pub value: f64,
}

impl MetricSample {
    fn for_record(record: &ContainerRecord, value: f64) -> Self {
        Self {
            label_values: vec![record.name.clone(), record.status.clone()],
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FamilySnapshot {
    pub desc: &'static FamilyDesc,
    pub samples: Vec<MetricSample>,
}

impl FamilySnapshot {
    fn new(desc: &'static FamilyDesc) -> Self {
        Self {
            desc,
            samples: Vec::new(),
        }
    }

    /// Protobuf form consumed by the `prometheus` encoders.
    pub fn to_metric_family(&self) -> MetricFamily {
        let mut family = MetricFamily::default();
        family.set_name(self.desc.name.to_string());
        family.set_help(self.desc.help.to_string());
        family.set_field_type(MetricType::GAUGE);

        for sample in &self.samples {
            let mut metric = Metric::default();
            for (name, value) in self.desc.labels.iter().zip(&sample.label_values) {
                let mut pair = LabelPair::default();
                pair.set_name(name.to_string());
                pair.set_value(value.clone());
                metric.mut_label().push(pair);
            }
            let mut gauge = Gauge::default();
            gauge.set_value(sample.value);
            metric.set_gauge(gauge);
            family.mut_metric().push(metric);
        }

        family
    }
}

/// All samples produced by one collection cycle, grouped by family.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub running_status: FamilySnapshot,
    pub pid: FamilySnapshot,
}

impl Snapshot {
    /// Both families, status first.
    pub fn families(&self) -> [&FamilySnapshot; 2] {
        [&self.running_status, &self.pid]
    }
}

/// Derives the samples for one inventory, in inventory order.
///
/// Every record yields exactly one `container_running_status` sample. Only running
/// records with a known pid yield a `container_pid` sample.
pub fn derive_snapshot(records: &[ContainerRecord]) -> Snapshot {
    let mut running_status = FamilySnapshot::new(&CONTAINER_RUNNING_STATUS);
    let mut pid = FamilySnapshot::new(&CONTAINER_PID);

    for record in records {
        if !record.is_running() {
            running_status
                .samples
                .push(MetricSample::for_record(record, 0.0));
            continue;
        }

        running_status
            .samples
            .push(MetricSample::for_record(record, 1.0));

        match record.pid {
            Some(value) => pid
                .samples
                .push(MetricSample::for_record(record, value as f64)),
            None => warn!(
                "Container {} is running but has no pid, skipping {}",
                record.name, CONTAINER_PID.name
            ),
        }
    }

    Snapshot {
        running_status,
        pid,
    }
}

/// Turns the current container inventory into a metrics snapshot on demand.
///
/// Holds no state besides the inventory source, so one instance can serve any
/// number of concurrent scrapes.
#[derive(Clone)]
pub struct CollectionEngine {
    source: Arc<dyn InventorySource>,
}

impl CollectionEngine {
    pub fn new(source: Arc<dyn InventorySource>) -> Self {
        Self { source }
    }

    /// Runs one collection cycle: a single inventory query, then derivation.
    ///
    /// # Errors
    ///
    /// Returns the inventory error unchanged if the runtime could not be queried.
    /// No samples are produced in that case.
    pub async fn collect(&self) -> Result<Snapshot, InventoryError> {
        let records = self.source.list_containers().await?;
        let snapshot = derive_snapshot(&records);

        debug!(
            "Collected {} status samples and {} pid samples",
            snapshot.running_status.samples.len(),
            snapshot.pid.samples.len()
        );

        Ok(snapshot)
    }
}

/// Renders a snapshot in the Prometheus text exposition format.
///
/// Families without samples still get their `HELP`/`TYPE` lines, so a successful
/// scrape always names both families.
pub fn encode_text(snapshot: &Snapshot) -> Result<String, ExpositionError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    for family in snapshot.families() {
        if family.samples.is_empty() {
            buffer.extend_from_slice(family.desc.header().as_bytes());
            continue;
        }
        encoder.encode(&[family.to_metric_family()], &mut buffer)?;
    }

    Ok(String::from_utf8(buffer)?)
}
