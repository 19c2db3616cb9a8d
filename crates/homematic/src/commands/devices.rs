//! Device listing.

use homematic_core::{Ccu, DeviceSummary};
use tabled::Tabled;

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    device_type: String,
    #[tabled(rename = "Interface")]
    interface: String,
    #[tabled(rename = "Version")]
    version: i32,
}

impl From<&DeviceSummary> for DeviceRow {
    fn from(d: &DeviceSummary) -> Self {
        Self {
            address: d.address.clone(),
            name: d.name.clone(),
            device_type: d.device_type.clone(),
            interface: d.interface.clone(),
            version: d.version,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ccu: &Ccu, args: &DevicesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let devices = ccu.get_devices().await?;

    let mut summaries: Vec<DeviceSummary> = devices
        .values()
        .filter(|d| args.interface.as_deref().is_none_or(|id| d.interface() == id))
        .filter(|d| !args.no_channels || d.parent().is_empty())
        .map(|d| d.summary())
        .collect();
    summaries.sort_by(|a, b| a.address.cmp(&b.address));

    let out = output::render_list(
        &global.output,
        &summaries,
        |d| DeviceRow::from(d),
        |d| d.address.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
