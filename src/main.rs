//! CLI monitor: connects to the watch and prints the latest readings once
//! per second until Ctrl-C or link loss.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use wristlink::domain::settings::SettingsService;
use wristlink::infrastructure::bluetooth::backend::BtleplugAdapter;
use wristlink::infrastructure::bluetooth::SmartwatchService;
use wristlink::infrastructure::logging::init_logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = SettingsService::new()?;
    let _logging_guard = init_logger(&settings.get().log_settings)?;

    info!("Starting wristlink monitor");

    let adapter = Arc::new(BtleplugAdapter::new().await?);
    let watch = SmartwatchService::new(adapter, settings.get());

    watch.connect().await?;

    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, disconnecting");
                break;
            }
            _ = tick.tick() => {
                if !watch.is_connected() {
                    warn!("Watch disconnected");
                    break;
                }
                let bpm = watch
                    .latest_heart_rate()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let temperature = watch
                    .latest_temperature_f()
                    .map(|v| format!("{:.1}", v))
                    .unwrap_or_else(|| "-".to_string());
                println!("heart rate: {:>4} bpm | temperature: {:>6} F", bpm, temperature);
            }
        }
    }

    watch.disconnect().await;
    Ok(())
}
