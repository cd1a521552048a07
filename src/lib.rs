//! wristlink - BLE smartwatch telemetry driver.
//!
//! Discovers a watch advertising the standard Heart Rate and Health
//! Thermometer services, subscribes to both measurement characteristics,
//! and exposes the latest decoded readings plus a short rolling history.
//!
//! ```no_run
//! use std::sync::Arc;
//! use wristlink::domain::settings::Settings;
//! use wristlink::infrastructure::bluetooth::backend::BtleplugAdapter;
//! use wristlink::infrastructure::bluetooth::SmartwatchService;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let adapter = Arc::new(BtleplugAdapter::new().await?);
//! let watch = SmartwatchService::new(adapter, &Settings::default());
//! watch.connect().await?;
//! println!("bpm: {:?}", watch.latest_heart_rate());
//! watch.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::measurement::{Measurement, MetricKind};
pub use domain::telemetry::TelemetryStore;
pub use error::{DecodeError, SessionError};
pub use infrastructure::bluetooth::{SessionState, SmartwatchService};
