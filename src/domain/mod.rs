pub mod measurement;
pub mod settings;
pub mod telemetry;
