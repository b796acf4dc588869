use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use hound::{SampleFormat, WavSpec, WavWriter};
use log::info;
use motor_audio::decoder::DecoderRegistry;
use motor_audio::{AudioConfig, AudioEngine, DirectorySource, SoftwareBackend, SourceKind};

#[derive(Parser, Debug)]
#[command(name = "motor-audio", about = "Offline driver for the motor audio engine")]
struct Cli {
    /// Log engine lifecycle events.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the format of an audio file.
    Probe { file: PathBuf },
    /// Play a file through the engine and write the mix to a WAV file.
    Render(RenderArgs),
}

#[derive(clap::Args, Debug, Clone)]
struct RenderArgs {
    file: PathBuf,

    #[arg(long, short)]
    output: PathBuf,

    /// Length of the render in seconds.
    #[arg(long, default_value_t = 5.0)]
    seconds: f32,

    /// Simulated frame rate; the stream pump runs once per frame.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Decode the whole file up front instead of streaming it.
    #[arg(long = "static")]
    static_source: bool,

    #[arg(long)]
    looping: bool,

    #[arg(long, default_value_t = 1.0)]
    volume: f32,

    #[arg(long, default_value_t = 1.0)]
    pitch: f32,

    /// Engine configuration (JSON).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, PartialEq)]
struct ProbeInfo {
    decoder: &'static str,
    channels: u16,
    sample_rate: u32,
    duration_frames: Option<u64>,
}

#[derive(Debug, PartialEq)]
struct RenderSummary {
    frames_written: usize,
    pump_restarts: usize,
    finished_early: bool,
}

fn probe(path: &Path) -> Result<ProbeInfo> {
    let registry = DecoderRegistry::with_defaults();
    let mut file =
        File::open(path).with_context(|| format!("Failed to open audio file: {}", path.display()))?;
    let factory = registry.select(&mut file)?;
    let decoder = factory
        .open(Box::new(file))
        .with_context(|| format!("Failed to decode audio file: {}", path.display()))?;
    Ok(ProbeInfo {
        decoder: factory.name(),
        channels: decoder.channels(),
        sample_rate: decoder.sample_rate(),
        duration_frames: decoder.duration_frames(),
    })
}

fn render(args: &RenderArgs) -> Result<RenderSummary> {
    if args.fps == 0 {
        bail!("--fps must be positive");
    }
    let config = match &args.config {
        Some(path) => AudioConfig::load_from(path)?,
        None => AudioConfig::default(),
    };
    let rate = config.sanitized().output_sample_rate;

    let root = args.file.parent().unwrap_or(Path::new("."));
    let name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid audio file name: {}", args.file.display()))?;

    let mut engine =
        AudioEngine::with_assets(SoftwareBackend::new(rate), config, DirectorySource::new(root));
    let kind = if args.static_source {
        SourceKind::Static
    } else {
        SourceKind::Stream
    };
    let source = engine.new_source(name, kind)?;
    engine.set_looping(source, args.looping)?;
    engine.set_volume(source, args.volume)?;
    engine.set_pitch(source, args.pitch)?;
    engine.play(source)?;

    let spec = WavSpec {
        channels: 2,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&args.output, spec)
        .with_context(|| format!("Failed to create output: {}", args.output.display()))?;

    let frames_per_tick = (rate / args.fps).max(1) as usize;
    let ticks = (args.seconds.max(0.0) * args.fps as f32).ceil() as usize;
    let mut mix = vec![0.0f32; frames_per_tick * 2];
    let mut summary = RenderSummary {
        frames_written: 0,
        pump_restarts: 0,
        finished_early: false,
    };

    for _ in 0..ticks {
        engine.backend_mut().render(&mut mix);
        for &sample in &mix {
            writer.write_sample((sample * i16::MAX as f32) as i16)?;
        }
        summary.frames_written += frames_per_tick;
        summary.pump_restarts += engine.update_streams().restarted;

        if engine.is_stopped(source)? {
            summary.finished_early = true;
            break;
        }
    }
    writer.finalize()?;
    engine.shutdown();

    info!(
        "Wrote {} frames to {} ({} pump restart(s))",
        summary.frames_written,
        args.output.display(),
        summary.pump_restarts
    );
    Ok(summary)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    match cli.command {
        Command::Probe { file } => {
            let info = probe(&file)?;
            println!("decoder:     {}", info.decoder);
            println!("channels:    {}", info.channels);
            println!("sample rate: {} Hz", info.sample_rate);
            match info.duration_frames {
                Some(frames) => println!(
                    "duration:    {:.3} s ({frames} frames)",
                    frames as f64 / info.sample_rate.max(1) as f64
                ),
                None => println!("duration:    unknown"),
            }
        }
        Command::Render(args) => {
            render(&args)?;
        }
    }
    Ok(())
}
