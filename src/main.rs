//! Uniwill keyboard driver CLI
//!
//! Runs the driver core against a simulated EC. The EC starts from a register
//! dump (or all zeroes), the board features come from this machine's DMI
//! identity unless the config file names another board.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use uniwill_driver::{BoardFeatures, DmiIdentity, RegisterDump, Settings};
use uniwill_keyboard::{
    ChargingPriority, ChargingProfile, DriverConfig, InputEvent, KeyboardError, LightbarLed,
    RecordingSink, UniwillDriver,
};
use uniwill_transport::{
    BackendRegistry, BoxedBackend, MemoryBackend, PrinterBackend, PrinterConfig, TrafficFilter,
};

mod cli;
use cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.monitor);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, monitor: bool) {
    let mut filter = EnvFilter::from_default_env();
    let directives: &[&str] = if verbose {
        &[
            "uniwill_driver=debug",
            "uniwill_keyboard=debug",
            "uniwill_transport=debug",
        ]
    } else {
        &["uniwill_driver=info"]
    };
    for directive in directives {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    if monitor && !verbose {
        if let Ok(directive) = "uniwill_transport::printer=info".parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load(path).with_context(|| format!("config {}", path.display()))?,
        None => Settings::default(),
    };
    let identity = settings.identity(DmiIdentity::read());
    let config = settings.driver_config(&identity);

    let command = cli.command.unwrap_or(Commands::Info);
    if let Commands::Classify = command {
        classify(&identity, &config);
        return Ok(());
    }

    let registers = match &cli.dump {
        Some(path) => {
            RegisterDump::load(path).with_context(|| format!("dump {}", path.display()))?
        }
        None => Vec::new(),
    };
    let printer = printer_config(cli.monitor, cli.filter.as_deref())?;

    let sim = Simulator::start(config, registers, printer)?;
    let result = sim.run(command);
    sim.stop();
    result
}

fn printer_config(monitor: bool, filter: Option<&str>) -> Result<Option<PrinterConfig>> {
    if !monitor {
        return Ok(None);
    }
    let filter = match filter {
        Some(f) => f.parse::<TrafficFilter>().map_err(|e| anyhow!(e))?,
        None => TrafficFilter::All,
    };
    Ok(Some(
        PrinterConfig::default()
            .with_filter(filter)
            .with_errors(true),
    ))
}

fn classify(identity: &DmiIdentity, config: &DriverConfig) {
    let features = BoardFeatures::classify(identity);
    println!("DMI:");
    println!("  Board name:   {}", identity.board_name);
    println!("  Product name: {}", identity.product_name);
    println!("  Product SKU:  {}", identity.product_sku);
    println!("Board features:");
    println!("  Single-zone RGB:      {}", features.rgb_single_zone);
    println!("  Lightbar:             {}", features.lightbar);
    println!("  Fan profile scheme:   {:?}", features.fan_profile);
    println!("  Charging unsupported: {}", features.charging_unsupported);
    println!("Effective config:");
    println!("  {:?}", config);
}

/// Registry, simulated EC and driver wired together
struct Simulator {
    registry: Arc<BackendRegistry>,
    ec: Arc<MemoryBackend>,
    backend: BoxedBackend,
    driver: Arc<UniwillDriver>,
    sink: Arc<RecordingSink>,
}

impl Simulator {
    fn start(
        config: DriverConfig,
        registers: Vec<(u16, u8)>,
        printer: Option<PrinterConfig>,
    ) -> Result<Self> {
        let registry = Arc::new(BackendRegistry::new());
        let sink = Arc::new(RecordingSink::new());
        let driver = UniwillDriver::attach(Arc::clone(&registry), config, sink.clone())?;

        let ec = Arc::new(MemoryBackend::with_registers(registers));
        let backend: BoxedBackend = match printer {
            Some(printer) => PrinterBackend::wrap(ec.clone(), printer),
            None => ec.clone(),
        };
        registry
            .register(Arc::clone(&backend))
            .context("register simulated EC")?;
        if !driver.is_probed() {
            warn!("driver did not probe; only raw register access will work");
        }

        Ok(Self {
            registry,
            ec,
            backend,
            driver,
            sink,
        })
    }

    fn stop(self) {
        if let Err(e) = self.registry.unregister(self.backend.as_ref()) {
            warn!("unregister simulated EC: {}", e);
        }
    }

    fn run(&self, command: Commands) -> Result<()> {
        let driver = &self.driver;
        match command {
            Commands::Info => self.info(),
            Commands::Classify => Ok(()),

            Commands::Brightness { value: None } => {
                println!("Brightness: {}", driver.brightness()?);
                Ok(())
            }
            Commands::Brightness { value: Some(v) } => {
                driver.set_brightness(v)?;
                println!("Brightness: {}", driver.brightness()?);
                Ok(())
            }
            Commands::Color { value: None } => {
                println!("Color: 0x{:06x}", driver.color()?);
                Ok(())
            }
            Commands::Color { value: Some(v) } => {
                driver.set_color(v)?;
                println!("Color: 0x{:06x}", driver.color()?);
                Ok(())
            }

            Commands::ChargingPriority { value } => {
                if let Some(priority) = value {
                    driver.set_charging_priority(priority)?;
                }
                println!("Charging priority: {}", driver.charging_priority()?);
                println!("  Available: {}", ChargingPriority::available());
                Ok(())
            }
            Commands::ChargingProfile { value } => {
                if let Some(profile) = value {
                    driver.set_charging_profile(profile)?;
                }
                println!("Charging profile: {}", driver.charging_profile()?);
                println!("  Available: {}", ChargingProfile::available());
                Ok(())
            }

            Commands::Lightbar { rgb, animation } => {
                if let Some(rgb) = rgb {
                    let leds = [LightbarLed::Red, LightbarLed::Green, LightbarLed::Blue];
                    for (led, value) in leds.into_iter().zip(rgb) {
                        driver.set_lightbar_brightness(led, value)?;
                    }
                }
                if let Some(animation) = animation {
                    driver.set_lightbar_brightness(LightbarLed::Animation, animation.is_on() as u8)?;
                }
                println!("Lightbar:");
                for led in LightbarLed::ALL {
                    println!(
                        "  {:<28} {}/{}",
                        led.name(),
                        driver.lightbar_brightness(led)?,
                        led.max_brightness()
                    );
                }
                Ok(())
            }

            Commands::Read { address } => {
                let value = driver.ec().read(address)?;
                println!("0x{address:04x} = 0x{value:02x}");
                Ok(())
            }
            Commands::Write {
                address,
                value,
                verify,
            } => {
                if verify {
                    driver
                        .ec()
                        .write_verified(address, value, driver.config().write_retries)?;
                } else {
                    driver.ec().write(address, value)?;
                }
                println!("0x{address:04x} <- 0x{value:02x}");
                Ok(())
            }

            Commands::Event { codes } => {
                for code in codes {
                    if !self.ec.inject_event(code) {
                        return Err(anyhow!("no event callback installed"));
                    }
                }
                driver.flush();
                self.print_input();
                Ok(())
            }
            Commands::Keys { codes } => {
                for code in codes {
                    driver.key_event(code, true);
                    driver.key_event(code, false);
                }
                driver.flush();
                self.print_input();
                Ok(())
            }

            Commands::Boot => self.boot(),
        }
    }

    fn info(&self) -> Result<()> {
        let driver = &self.driver;
        let Some(features) = driver.features() else {
            println!("Driver not probed");
            return Ok(());
        };
        println!("Interface: {}", self.registry.current_identifier()?);
        println!("Model:     0x{:02x}", features.model);
        println!("Features:");
        println!("  Single-zone RGB:   {}", features.rgb_single_zone);
        println!("  Lightbar:          {}", features.lightbar);
        println!("  Fan profile v1:    {}", features.profile_v1());
        println!("  Charging priority: {}", features.charging_priority);
        println!("  Charging profile:  {}", features.charging_profile);

        println!("Keyboard backlight:");
        println!("  Enabled:    {}", driver.backlight_enabled()?);
        report("Brightness", driver.brightness());
        report("Color", driver.color().map(|c| format!("0x{c:06x}")));
        if features.charging_priority {
            report("Charging priority", driver.charging_priority());
        }
        if features.charging_profile {
            report("Charging profile", driver.charging_profile());
        }
        Ok(())
    }

    fn boot(&self) -> Result<()> {
        if !self.driver.config().rgb_single_zone {
            println!("No boot calibration on this board; backlight enabled at probe");
            return Ok(());
        }

        let running = Arc::new(AtomicBool::new(true));
        let handler_flag = Arc::clone(&running);
        ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))
            .context("install Ctrl-C handler")?;

        while running.load(Ordering::SeqCst) {
            if let Some(outcome) = self.driver.wait_for_calibration(Duration::from_millis(100)) {
                println!("Calibration: {outcome:?}");
                println!("Backlight enabled: {}", self.driver.backlight_enabled()?);
                return Ok(());
            }
        }
        debug!("interrupted, stopping calibration");
        println!("Calibration: interrupted");
        Ok(())
    }

    fn print_input(&self) {
        let events = self.sink.take();
        if events.is_empty() {
            println!("No input reported");
        }
        for event in events {
            match event {
                InputEvent::Key(key, pressed) => println!(
                    "{:<20} {}",
                    key.name(),
                    if pressed { "press" } else { "release" }
                ),
                InputEvent::Sync => println!("SYN"),
            }
        }
    }
}

fn report<T: std::fmt::Display>(label: &str, value: Result<T, KeyboardError>) {
    match value {
        Ok(v) => println!("  {:<11} {}", format!("{label}:"), v),
        Err(KeyboardError::NotSupported(_)) => {}
        Err(e) => println!("  {:<11} error: {}", format!("{label}:"), e),
    }
}
