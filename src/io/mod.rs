pub mod csv_recording;
pub mod plx;
pub mod sev;
pub mod times;
