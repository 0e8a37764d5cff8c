use crate::metrics::HubMetrics;
use crate::models::Alert;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// Output handler for alerts and metrics
pub struct OutputHandler {
    format: OutputFormat,
    writer: Option<Box<dyn Write + Send>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputFormat {
    Json,
    Jsonl,
    Console,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "jsonl" => OutputFormat::Jsonl,
            "console" => OutputFormat::Console,
            _ => OutputFormat::Console, // Default
        }
    }
}

impl OutputHandler {
    /// Create a new output handler writing to `file_path`, or stdout if none
    pub fn new(format: OutputFormat, file_path: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let writer: Option<Box<dyn Write + Send>> = match file_path {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                Some(Box::new(BufWriter::new(file)))
            }
            None => None,
        };

        Ok(OutputHandler { format, writer })
    }

    /// Create a handler over an arbitrary writer
    pub fn with_writer(format: OutputFormat, writer: Box<dyn Write + Send>) -> Self {
        OutputHandler {
            format,
            writer: Some(writer),
        }
    }

    /// Write a single alert
    pub fn write_alert(&mut self, alert: &Alert) -> Result<(), Box<dyn std::error::Error>> {
        let output = match &self.format {
            OutputFormat::Json => serde_json::to_string_pretty(alert)?,
            OutputFormat::Jsonl => serde_json::to_string(alert)?,
            OutputFormat::Console => format_alert_line(alert),
        };
        self.write_output(&format!("{}\n", output))
    }

    /// Write a list of alerts
    ///
    /// JSON output is a single array so the result parses as one document.
    pub fn write_alerts(&mut self, alerts: &[Alert]) -> Result<(), Box<dyn std::error::Error>> {
        if self.format == OutputFormat::Json {
            let json = serde_json::to_string_pretty(alerts)?;
            return self.write_output(&format!("{}\n", json));
        }
        for alert in alerts {
            self.write_alert(alert)?;
        }
        Ok(())
    }

    /// Write a metrics snapshot
    pub fn write_metrics(&mut self, metrics: &HubMetrics) -> Result<(), Box<dyn std::error::Error>> {
        let output = match &self.format {
            OutputFormat::Json => serde_json::to_string_pretty(metrics)?,
            OutputFormat::Jsonl => serde_json::to_string(metrics)?,
            OutputFormat::Console => format_metrics(metrics),
        };
        self.write_output(&format!("{}\n", output))
    }

    fn write_output(&mut self, data: &str) -> Result<(), Box<dyn std::error::Error>> {
        match &mut self.writer {
            Some(writer) => {
                writer.write_all(data.as_bytes())?;
                writer.flush()?;
            }
            None => {
                print!("{}", data);
                io::stdout().flush()?;
            }
        }
        Ok(())
    }

    /// Flush any buffered output
    pub fn flush(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(writer) = &mut self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

fn format_alert_line(alert: &Alert) -> String {
    let score = alert
        .anomaly_score
        .map(|s| format!("{:.2}", s))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "#{} [{}] {} {} from {} (score: {}) - {}",
        alert.id,
        alert.severity,
        alert.timestamp,
        alert.event_type,
        alert.site_id,
        score,
        alert.summary
    )
}

fn format_metrics(metrics: &HubMetrics) -> String {
    let mut lines = vec![
        format!("Total alerts: {}", metrics.total_alerts),
        format!(
            "By severity: high={} medium={} low={}",
            metrics.by_severity.high, metrics.by_severity.medium, metrics.by_severity.low
        ),
        format!("Coordinated attacks: {}", metrics.coordinated_count),
        "By site:".to_string(),
    ];
    lines.extend(metrics.by_site.iter().map(|(site, n)| format!("  {}: {}", site, n)));
    lines.push("By event type:".to_string());
    lines.extend(
        metrics
            .by_event_type
            .iter()
            .map(|(event_type, n)| format!("  {}: {}", event_type, n)),
    );
    lines.join("\n")
}
