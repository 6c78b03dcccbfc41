// Uniwill notebook keyboard driver - shared library
// Board classification, DMI identity and configuration files

pub mod boards;
pub mod config;
pub mod dmi;

pub use boards::{BoardFeatures, DmiMatch};
pub use config::{ConfigError, DriverOverrides, RegisterDump, Settings};
pub use dmi::DmiIdentity;
