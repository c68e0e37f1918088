use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use std::path::{Path, PathBuf};
use std::time::Instant;

use notefall::app::GameApp;
use notefall::config::Settings;
use notefall::core::audio::{AudioOutput, CpalOutput, WavOutput};
use notefall::core::judge::{demo_riff, Chart};
use notefall::core::midi::{DeviceManager, InputBackend, MidirBackend, PerformerConfig, ScriptedPerformer};
use notefall::messaging::LogHooks;

const CLIENT_NAME: &str = "notefall";
const OUTPUT_QUEUE_BLOCKS: usize = 8;

#[derive(Parser)]
#[command(name = "notefall")]
#[command(about = "Falling-note rhythm game engine with a MIDI-driven wavetable synth", long_about = None)]
struct Cli {
    /// Settings file (default: <config dir>/notefall/settings.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output volume 0.0-1.0
    #[arg(long, global = true)]
    volume: Option<f32>,

    /// Write the effective settings back to the settings file
    #[arg(long, global = true)]
    save_config: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct SessionArgs {
    /// Chart JSON file (default: built-in demo riff)
    #[arg(long)]
    chart: Option<PathBuf>,

    /// Stop after this many seconds instead of at the end of the chart
    #[arg(short, long)]
    duration: Option<f64>,

    /// Let the engine play the chart by itself
    #[arg(long)]
    auto_play: bool,
}

#[derive(Args, Clone)]
struct PerformerArgs {
    /// Max timing error of the simulated player in seconds
    #[arg(long, default_value = "0.0")]
    jitter: f64,

    /// Probability that the simulated player skips a note
    #[arg(long, default_value = "0.0")]
    miss_rate: f64,

    #[arg(long, default_value = "24301")]
    seed: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// List MIDI input ports
    Ports,

    /// Play along on a MIDI keyboard
    Play {
        #[command(flatten)]
        session: SessionArgs,

        /// Prefer input ports whose name contains this text
        #[arg(short, long)]
        port: Option<String>,
    },

    /// Play a chart with a simulated performer through the speakers
    Simulate {
        #[command(flatten)]
        session: SessionArgs,

        #[command(flatten)]
        performer: PerformerArgs,
    },

    /// Render a simulated session to a WAV file
    Render {
        /// Output WAV file
        output: PathBuf,

        #[command(flatten)]
        session: SessionArgs,

        #[command(flatten)]
        performer: PerformerArgs,

        /// Sample rate in Hz (default: from settings)
        #[arg(short, long)]
        sample_rate: Option<u32>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    log::info!("[MAIN] Starting notefall");

    let cli = Cli::parse();
    let mut settings = load_settings(&cli)?;

    match cli.command {
        Commands::Ports => list_ports(),
        Commands::Play { session, port } => {
            if let Some(port) = port {
                settings.device_patterns.insert(0, port);
            }
            apply_session(&mut settings, &session);
            play(settings, &session)
        },
        Commands::Simulate { session, performer } => {
            apply_session(&mut settings, &session);
            simulate(settings, &session, &performer)
        },
        Commands::Render { output, session, performer, sample_rate } => {
            if let Some(rate) = sample_rate {
                settings.sample_rate = rate;
            }
            apply_session(&mut settings, &session);
            render(settings.validated(), &session, &performer, &output)
        },
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => match Settings::default_path() {
            Ok(path) => path,
            Err(e) => {
                log::warn!("[MAIN] {}; using default settings", e);
                return Ok(Settings::default());
            },
        },
    };

    let mut settings = Settings::load(&path)
        .with_context(|| format!("loading settings from {}", path.display()))?;
    if let Some(volume) = cli.volume {
        settings.volume = volume;
        settings = settings.validated();
    }

    if cli.save_config {
        settings
            .save_to_file(&path)
            .with_context(|| format!("saving settings to {}", path.display()))?;
        log::info!("[MAIN] settings saved to {}", path.display());
    }
    Ok(settings)
}

fn apply_session(settings: &mut Settings, session: &SessionArgs) {
    if session.auto_play {
        settings.auto_play = true;
    }
}

fn load_chart(session: &SessionArgs) -> Result<Chart> {
    match &session.chart {
        Some(path) => Chart::load_from_file(path)
            .with_context(|| format!("loading chart {}", path.display())),
        None => Ok(demo_riff()),
    }
}

fn performer_for(chart: &Chart, settings: &Settings, args: &PerformerArgs) -> ScriptedPerformer {
    let notes = chart.clone().delayed(settings.lead_in).notes;
    let config = PerformerConfig {
        jitter: args.jitter.max(0.0),
        miss_rate: args.miss_rate,
        seed: args.seed,
        ..PerformerConfig::default()
    };
    ScriptedPerformer::new(&notes, &config)
}

fn list_ports() -> Result<()> {
    let mut backend = MidirBackend::new(CLIENT_NAME);
    let ports = backend.port_names()?;
    if ports.is_empty() {
        println!("No MIDI input ports found");
    }
    for (i, name) in ports.iter().enumerate() {
        println!("{}: {}", i, name);
    }
    Ok(())
}

fn play(settings: Settings, session: &SessionArgs) -> Result<()> {
    let chart = load_chart(session)?;
    let mut output = CpalOutput::open(OUTPUT_QUEUE_BLOCKS).context("opening audio output")?;

    let mut app = GameApp::new(settings.clone(), chart, output.sample_rate(), Box::new(LogHooks));
    let mut device = DeviceManager::new(
        MidirBackend::new(CLIENT_NAME),
        app.adapter(),
        settings.device_patterns.clone(),
        settings.reconnect_interval(),
    );
    if let Err(e) = device.connect() {
        log::warn!("[MAIN] no MIDI input yet ({}); will keep trying", e);
    }

    let score = app.run_live(&mut output, Some(&mut device), session.duration)?;
    device.suspend();
    println!("{}", score);
    Ok(())
}

fn simulate(settings: Settings, session: &SessionArgs, args: &PerformerArgs) -> Result<()> {
    let chart = load_chart(session)?;
    let mut output = CpalOutput::open(OUTPUT_QUEUE_BLOCKS).context("opening audio output")?;

    let mut app = GameApp::new(settings.clone(), chart.clone(), output.sample_rate(), Box::new(LogHooks));
    let performer = (!settings.auto_play)
        .then(|| performer_for(&chart, &settings, args).spawn(app.adapter(), Instant::now()));

    let score = app.run_live::<MidirBackend>(&mut output, None, session.duration)?;
    drop(performer);
    println!("{}", score);
    Ok(())
}

fn render(settings: Settings, session: &SessionArgs, args: &PerformerArgs, path: &Path) -> Result<()> {
    let chart = load_chart(session)?;
    let mut output = WavOutput::create(path, settings.sample_rate)
        .with_context(|| format!("creating {}", path.display()))?;

    let mut app = GameApp::new(settings.clone(), chart.clone(), settings.sample_rate, Box::new(LogHooks));
    let mut performer = (!settings.auto_play).then(|| performer_for(&chart, &settings, args));

    let score = app.run_offline(&mut output, performer.as_mut(), session.duration)?;
    log::info!("[MAIN] wrote {}", path.display());
    println!("{}", score);
    Ok(())
}
