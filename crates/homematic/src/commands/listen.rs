//! Live event listener: registers with the CCU, prints every value change
//! until Ctrl-C, then unregisters.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use homematic_core::{Ccu, DeviceMap, Value};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::cli::{GlobalOpts, ListenArgs, OutputFormat};
use crate::error::CliError;
use crate::output;

/// How often the device list and event liveness are re-checked.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct EventLine {
    at: DateTime<Utc>,
    address: String,
    parameter: String,
    value: Value,
}

impl EventLine {
    fn render(&self, format: &OutputFormat) -> Result<String, CliError> {
        match format {
            OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(self, true),
            // One document per event so the stream stays valid multi-document YAML.
            OutputFormat::Yaml => {
                let doc = output::render_yaml(self)?;
                Ok(format!("---\n{}", doc.trim_end()))
            }
            OutputFormat::Plain => Ok(format!(
                "{} {} {}",
                self.address, self.parameter, self.value
            )),
            OutputFormat::Table => Ok(format!(
                "{}  {:<20} {:<16} {}",
                self.at.to_rfc3339_opts(SecondsFormat::Millis, true),
                self.address,
                self.parameter,
                self.value
            )),
        }
    }
}

pub async fn handle(ccu: &Ccu, args: &ListenArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<EventLine>();

    let devices = ccu.get_devices().await?;
    let mut attached = attach(&devices, &args.address, &tx);
    let mut device_updates = ccu.subscribe_devices();

    ccu.start().await?;
    tracing::info!(
        callback = %ccu.callback_addr(),
        devices = attached,
        "listening for events, Ctrl-C to stop"
    );

    let mut maintenance = tokio::time::interval(MAINTENANCE_INTERVAL);
    maintenance.tick().await;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            Some(line) = rx.recv() => {
                match line.render(&global.output) {
                    Ok(out) => output::print_output(&out, global.quiet),
                    Err(e) => break Err(e),
                }
            }
            Ok(()) = device_updates.changed() => {
                let snapshot = Arc::clone(&device_updates.borrow_and_update());
                attached = attach(&snapshot, &args.address, &tx);
                tracing::debug!(devices = attached, "device set changed");
            }
            _ = maintenance.tick() => {
                if let Err(e) = ccu.update_devices(false).await {
                    tracing::warn!(error = %e, "periodic device refresh failed");
                }
            }
        }
    };

    ccu.stop().await?;
    result
}

/// Install a forwarding handler on every device matching `filter` (all
/// devices when empty). Returns how many were attached.
fn attach(devices: &DeviceMap, filter: &[String], tx: &mpsc::UnboundedSender<EventLine>) -> usize {
    let wanted: HashSet<&str> = filter.iter().map(String::as_str).collect();
    let mut count = 0;
    for (address, device) in devices {
        if !wanted.is_empty() && !wanted.contains(address.as_str()) {
            continue;
        }
        let tx = tx.clone();
        let address = address.clone();
        device.set_value_changed_handler(Some(Arc::new(move |parameter: &str, value: &Value| {
            let _ = tx.send(EventLine {
                at: Utc::now(),
                address: address.clone(),
                parameter: parameter.to_owned(),
                value: value.clone(),
            });
        })));
        count += 1;
    }
    count
}
