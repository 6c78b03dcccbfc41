// CLI definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use uniwill_keyboard::{ChargingPriority, ChargingProfile};

#[derive(Parser)]
#[command(name = "uniwill_driver")]
#[command(author, version, about = "Uniwill notebook keyboard driver core")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable transport monitoring (logs all register traffic and events)
    #[arg(long, global = true)]
    pub monitor: bool,

    /// Filter monitored traffic (all, reads, writes, events, addr=0xNNNN)
    #[arg(long, global = true)]
    pub filter: Option<String>,

    /// Driver settings file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Seed the simulated EC from a register dump (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    pub dump: Option<PathBuf>,

    /// Debug logging for all driver crates
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // === Query Commands ===
    /// Show probed features and current state
    #[command(visible_aliases = ["status", "i"])]
    Info,

    /// Show board features for this machine's DMI identity
    Classify,

    // === Keyboard Backlight ===
    /// Get or set keyboard brightness (0-200)
    #[command(visible_alias = "b")]
    Brightness {
        #[arg(value_parser = parse_number)]
        value: Option<u32>,
    },

    /// Get or set keyboard color (0xRRGGBB or #RRGGBB)
    #[command(visible_alias = "c")]
    Color {
        #[arg(value_parser = parse_color)]
        value: Option<u32>,
    },

    // === Charging ===
    /// Get or set charging priority (charge_battery, performance)
    ChargingPriority { value: Option<ChargingPriority> },

    /// Get or set charging profile (high_capacity, balanced, stationary)
    ChargingProfile { value: Option<ChargingProfile> },

    // === Lightbar ===
    /// Get or set the lightbar
    Lightbar {
        /// Red, green and blue channel values (0-36)
        #[arg(num_args = 3, value_names = ["R", "G", "B"])]
        rgb: Option<Vec<u8>>,

        /// Turn the firmware animation on or off
        #[arg(long)]
        animation: Option<Switch>,
    },

    // === Raw Register Access ===
    /// Read one EC register
    Read {
        #[arg(value_parser = parse_address)]
        address: u16,
    },

    /// Write one EC register
    Write {
        #[arg(value_parser = parse_address)]
        address: u16,
        #[arg(value_parser = parse_byte)]
        value: u8,
        /// Read back and retry until the value sticks
        #[arg(long)]
        verify: bool,
    },

    // === Events ===
    /// Inject hotkey event codes as if the EC had sent them
    #[command(visible_alias = "e")]
    Event {
        #[arg(required = true, value_parser = parse_number)]
        codes: Vec<u32>,
    },

    /// Feed key press/release pairs from the keyboard (input event codes)
    Keys {
        #[arg(required = true)]
        codes: Vec<u16>,
    },

    /// Probe and wait for the boot calibration to finish (Ctrl-C cancels)
    Boot,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        matches!(self, Switch::On)
    }
}

/// Parse a decimal or 0x-prefixed number
pub fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{s}': {e}"))
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let value = parse_number(s)?;
    u8::try_from(value).map_err(|_| format!("{value:#x} does not fit in a byte"))
}

fn parse_address(s: &str) -> Result<u16, String> {
    uniwill_driver::config::parse_address(s).map_err(|e| e.to_string())
}

/// Parse a color as `#rrggbb` or a number
pub fn parse_color(s: &str) -> Result<u32, String> {
    match s.trim().strip_prefix('#') {
        Some(hex) => u32::from_str_radix(hex, 16).map_err(|e| format!("invalid color '{s}': {e}")),
        None => parse_number(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(parse_number("0x10").unwrap(), 16);
        assert_eq!(parse_number("200").unwrap(), 200);
        assert!(parse_number("ten").is_err());
        assert_eq!(parse_color("#00ff00").unwrap(), 0x00ff00);
        assert_eq!(parse_color("0xff0000").unwrap(), 0xff0000);
        assert!(parse_byte("0x100").is_err());
        assert_eq!(parse_address("0x078c").unwrap(), 0x078c);
    }

    #[test]
    fn test_parse_commands() {
        let cli = Cli::parse_from(["uniwill_driver", "write", "0x0741", "1", "--verify"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Write {
                address: 0x0741,
                value: 1,
                verify: true
            })
        ));

        let cli = Cli::parse_from(["uniwill_driver", "charging-profile", "balanced"]);
        assert!(matches!(
            cli.command,
            Some(Commands::ChargingProfile {
                value: Some(ChargingProfile::Balanced)
            })
        ));

        let cli = Cli::parse_from(["uniwill_driver", "--monitor", "lightbar", "1", "2", "3"]);
        assert!(cli.monitor);
        match cli.command {
            Some(Commands::Lightbar { rgb, animation }) => {
                assert_eq!(rgb, Some(vec![1, 2, 3]));
                assert!(animation.is_none());
            }
            _ => panic!("expected lightbar"),
        }
    }
}
