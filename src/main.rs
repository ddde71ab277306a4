use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use stagekit::{
    init_logging, list_ports, presets, CommandResult, LogicalAxis, ProtocolEngine, RigConfig,
    SerialTransport, SimulatedTransport, BUILD_DATE, VERSION,
};
use stagekit_settings::default_config_path;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stagekit")]
#[command(about = "Drive a serial-attached motion stage", long_about = None)]
struct Cli {
    /// Rig config file (.toml or .json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Built-in rig preset, used when no config file is given
    #[arg(long, global = true)]
    preset: Option<String>,

    /// Override the serial port from the config
    #[arg(long, global = true)]
    port: Option<String>,

    /// Talk to a simulated controller that acknowledges everything
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List serial ports that look like motion controllers
    Ports,

    /// Write a preset to a config file
    InitConfig {
        /// Destination; defaults to the user config directory
        path: Option<PathBuf>,
    },

    #[command(flatten)]
    Rig(RigCommand),
}

/// Commands that talk to a connected rig
#[derive(Subcommand)]
enum RigCommand {
    /// Home axes (all mapped axes when none are given)
    Home {
        axes: Vec<String>,

        /// Run the park moves afterwards
        #[arg(long)]
        park: bool,
    },

    /// Rapid move of one or more axes
    Jog {
        #[arg(long, allow_negative_numbers = true)]
        x: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        y: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        z: Option<f64>,
        /// Feed rate override
        #[arg(long)]
        feed: Option<f64>,
    },

    /// Retract and descend to a Z height
    Pickup {
        height: f64,
        #[arg(long)]
        feed: Option<f64>,
    },

    /// Release the stepper drivers
    Disable,

    /// Start a program stored on the controller
    Run {
        path: String,
        /// Feed rate multiplier in percent
        #[arg(long, default_value = "100")]
        feed_multiplier: u32,
    },

    /// Send a command verbatim
    Raw {
        text: String,
        /// Wait for the stage to stop afterwards
        #[arg(long)]
        blocking: bool,
    },
}

fn main() -> Result<()> {
    init_logging()?;
    tracing::info!("stagekit {} (built {})", VERSION, BUILD_DATE);

    let cli = Cli::parse();

    match &cli.command {
        Commands::Ports => print_ports(),
        Commands::InitConfig { path } => init_config(&cli, path.clone()),
        Commands::Rig(command) => drive(&cli, command),
    }
}

fn drive(cli: &Cli, command: &RigCommand) -> Result<()> {
    let rig = load_rig(cli)?;
    let mut engine = connect(cli, &rig)?;

    let result = match command {
        RigCommand::Home { axes, park } => {
            let axes = parse_axes(axes)?;
            match (axes.is_empty(), *park) {
                (true, false) => engine.home_all(),
                (true, true) => {
                    let all: BTreeSet<LogicalAxis> = engine.axis_map().logical_axes().collect();
                    engine.home_and_park(&all)
                }
                (false, false) => engine.home(&axes),
                (false, true) => engine.home_and_park(&axes),
            }
        }
        RigCommand::Jog { x, y, z, feed } => {
            let targets = [(LogicalAxis::X, *x), (LogicalAxis::Y, *y), (LogicalAxis::Z, *z)]
                .into_iter()
                .filter_map(|(axis, value)| value.map(|v| (axis, v)));
            engine.jog(targets, *feed)
        }
        RigCommand::Pickup { height, feed } => engine.pickup(*height, *feed),
        RigCommand::Disable => engine.disable_drive(),
        RigCommand::Run {
            path,
            feed_multiplier,
        } => engine.run_program(path, *feed_multiplier),
        RigCommand::Raw { text, blocking } => engine.send_raw(text, *blocking),
    };

    report(result)?;
    engine.disconnect()?;
    Ok(())
}

fn print_ports() -> Result<()> {
    let ports = list_ports()?;
    if ports.is_empty() {
        println!("No controller ports found");
    }
    for port in ports {
        println!("{}\t{}", port.port_name, port.description);
    }
    Ok(())
}

fn init_config(cli: &Cli, path: Option<PathBuf>) -> Result<()> {
    let rig = presets::preset(cli.preset.as_deref().unwrap_or("pick_and_place"))?;
    let path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };
    rig.save_to_file(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {} preset to {}", rig.name, path.display());
    Ok(())
}

fn load_rig(cli: &Cli) -> Result<RigConfig> {
    let mut rig = match (&cli.config, &cli.preset) {
        (Some(path), _) => RigConfig::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        (None, Some(name)) => presets::preset(name)?,
        (None, None) => {
            let path = default_config_path()?;
            RigConfig::load_from_file(&path).with_context(|| {
                format!(
                    "Failed to load {}; pass --config or --preset",
                    path.display()
                )
            })?
        }
    };

    if let Some(port) = &cli.port {
        rig.connection.port = port.clone();
    }
    Ok(rig)
}

fn connect(cli: &Cli, rig: &RigConfig) -> Result<ProtocolEngine> {
    let (mut engine, profile) = if cli.dry_run {
        rig.build_engine(SimulatedTransport::acknowledging())?
    } else {
        if rig.connection.port.is_empty() {
            bail!("No serial port configured; pass --port");
        }
        rig.build_engine(SerialTransport::new(rig.connection.clone()))?
    };

    engine
        .connect(&profile)
        .with_context(|| format!("Failed to bring up rig '{}'", rig.name))?;
    Ok(engine)
}

fn parse_axes(names: &[String]) -> Result<BTreeSet<LogicalAxis>> {
    names
        .iter()
        .map(|name| name.parse::<LogicalAxis>().map_err(anyhow::Error::from))
        .collect()
}

fn report(result: stagekit_core::ProtocolResult<CommandResult>) -> Result<()> {
    match result {
        Ok(result) => {
            for line in &result.diagnostics {
                println!("{}", line);
            }
            println!("ok");
            Ok(())
        }
        Err(err) => {
            for line in err.diagnostics() {
                eprintln!("{}", line);
            }
            Err(err.into())
        }
    }
}
