pub mod config;
pub mod error;
pub mod io;
pub mod local;
pub mod processing;
pub mod recording;
pub mod simulate;
pub mod utils;

pub use config::{load_config, save_config, Config};
pub use error::{Error, Result};
pub use processing::signal_processor::{DetectionReport, SpikeDetector};
pub use recording::{Channel, Recording, VoltageUnits};
