//! `vitalwatch run`: monitor a simulated patient fleet

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};
use tokio::sync::broadcast;

use vitalwatch_monitor::{
    Alert, InMemoryPatientDirectory, MonitorConfig, MonitorEvent, MonitoringSupervisor, Patient,
    PatientId, SensorDevice, Severity, SimulatedDevice,
};

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of simulated patients
    #[arg(short, long, default_value = "4")]
    pub patients: usize,

    /// Monitoring interval in milliseconds (overrides the config file)
    #[arg(short, long)]
    pub interval_ms: Option<u64>,

    /// Stop after this many seconds (runs until Ctrl-C if not specified)
    #[arg(short, long)]
    pub duration_secs: Option<u64>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Patient tasks allowed to run at once (overrides the config file)
    #[arg(short, long)]
    pub max_concurrent: Option<usize>,
}

#[derive(Tabled)]
struct AlertRow {
    #[tabled(rename = "Patient")]
    patient: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl From<&Alert> for AlertRow {
    fn from(alert: &Alert) -> Self {
        Self {
            patient: short_id(alert.patient_id()),
            severity: format_severity(alert.severity()),
            source: format!("{:?}", alert.source()),
            status: format!("{:?}", alert.status()),
            message: alert.message().to_string(),
        }
    }
}

fn short_id(id: &PatientId) -> String {
    id.to_string().chars().take(8).collect()
}

fn format_severity(severity: Severity) -> String {
    let label = severity.to_string();
    match severity {
        Severity::Critical => label.red().bold().to_string(),
        Severity::High => label.red().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::Low => label.dimmed().to_string(),
    }
}

fn load_config(args: &RunArgs) -> Result<MonitorConfig> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::from_json(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MonitorConfig::default(),
    };
    if let Some(interval) = args.interval_ms {
        config.monitoring_interval_ms = interval;
    }
    if let Some(max) = args.max_concurrent {
        config.max_concurrent_patients = max;
    }
    config.validate().context("invalid monitor configuration")?;
    Ok(config)
}

/// Four devices per patient, each drifting around a typical value
fn simulated_fleet(count: usize) -> (Vec<Patient>, Vec<Arc<dyn SensorDevice>>) {
    let mut patients = Vec::with_capacity(count);
    let mut devices: Vec<Arc<dyn SensorDevice>> = Vec::with_capacity(count * 4);

    for i in 0..count {
        let patient = Patient::new(
            PatientId::new(),
            format!("Simulated patient {}", i + 1),
            45 + (i as u32 * 7) % 40,
            if i % 2 == 0 { "FEMALE" } else { "MALE" },
        );
        let tag = short_id(&patient.id);
        let period = 10 + i as u64 % 7;

        let specs = [
            ("hr", "Heart Rate Monitor", 76.0, 30.0),
            ("bp", "Blood Pressure Cuff", 118.0, 18.0),
            ("spo2", "Oxygen Saturation Sensor", 97.0, 1.5),
            ("temp", "Temperature Sensor", 37.0, 0.8),
        ];
        for (prefix, category, base, amplitude) in specs {
            devices.push(Arc::new(
                SimulatedDevice::new(format!("{prefix}-{tag}"), category, base)
                    .with_sine(amplitude, period)
                    .for_patient(patient.id.clone()),
            ));
        }
        patients.push(patient);
    }

    (patients, devices)
}

/// Log the interesting events until the channel closes
async fn follow_events(mut events: broadcast::Receiver<MonitorEvent>) -> usize {
    let mut cycles = 0;
    loop {
        match events.recv().await {
            Ok(MonitorEvent::CycleCompleted { .. }) => cycles += 1,
            Ok(MonitorEvent::AlertDispatched { patient_id, severity, source, .. }) => {
                tracing::info!(patient = %short_id(&patient_id), %severity, ?source, "Alert dispatched");
            }
            Ok(MonitorEvent::AlertDispatchFailed { patient_id, severity, error, .. }) => {
                tracing::warn!(patient = %short_id(&patient_id), %severity, %error, "Alert not delivered");
            }
            Ok(MonitorEvent::InterventionRecommended { patient_id, description }) => {
                tracing::warn!(patient = %short_id(&patient_id), "Intervention recommended: {description}");
            }
            Ok(MonitorEvent::DeviceFailure { device_id, error, .. }) => {
                tracing::warn!(%device_id, %error, "Device failure");
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event follower lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    cycles
}

/// Execute the run command
pub async fn execute(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;
    let (patients, devices) = simulated_fleet(args.patients);
    let ids: Vec<PatientId> = patients.iter().map(|p| p.id.clone()).collect();

    println!("{} Starting patient monitoring...", "[VITALWATCH]".bright_cyan().bold());
    println!();
    println!("{}", "Configuration:".bold());
    println!("  {} {}", "Patients:".dimmed(), ids.len());
    println!("  {} {}", "Devices:".dimmed(), devices.len());
    println!("  {} {} ms", "Interval:".dimmed(), config.monitoring_interval_ms);
    println!("  {} {}", "Max concurrent:".dimmed(), config.max_concurrent_patients);
    println!();

    let supervisor = MonitoringSupervisor::builder(config)
        .patient_directory(Arc::new(InMemoryPatientDirectory::with_patients(patients)))
        .devices(devices)
        .build()
        .context("building supervisor")?;

    let follower = tokio::spawn(follow_events(supervisor.subscribe()));
    supervisor.start().await.context("starting supervisor")?;

    match args.duration_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    tracing::info!(secs, "Run duration elapsed");
                }
                result = tokio::signal::ctrl_c() => {
                    result.context("listening for Ctrl-C")?;
                    tracing::info!("Interrupted");
                }
            }
        }
        None => {
            tokio::signal::ctrl_c().await.context("listening for Ctrl-C")?;
            tracing::info!("Interrupted");
        }
    }

    supervisor.shutdown().await.context("shutting down")?;

    let mut alerts = Vec::new();
    for id in &ids {
        alerts.extend(supervisor.dispatcher().for_patient(id).await?);
    }
    alerts.sort_by(|a, b| b.severity().cmp(&a.severity()).then(a.created_at().cmp(b.created_at())));

    drop(supervisor);
    let cycles = follower.await.unwrap_or_default();

    println!();
    println!("{}", "Summary".bold().cyan());
    println!("{}", "=".repeat(80));
    println!("  {} {}", "Cycles:".dimmed(), cycles);
    println!("  {} {}", "Alerts:".dimmed(), alerts.len());
    println!();

    if alerts.is_empty() {
        println!("No alerts raised.");
    } else {
        let urgent = alerts.iter().filter(|a| a.severity().is_urgent()).count();
        if urgent > 0 {
            println!("{} {} urgent alert(s) raised", "[ALERT]".red().bold(), urgent);
            println!();
        }
        let rows: Vec<AlertRow> = alerts.iter().map(AlertRow::from).collect();
        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
    }

    Ok(())
}
