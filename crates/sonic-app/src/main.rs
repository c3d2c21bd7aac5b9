//! Command-line shell for Sonic Stream.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sonic_audio::{
    list_output_devices, OutputContext, SignalChain, SineSource, SpectrumFeed,
};
use sonic_core::{ChainParams, FormatInfo, Result, Track};
use sonic_player::{ChainSink, PlayerSession};
use sonic_store::Store;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sonic", about = "Sonic Stream audio core", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List output devices and their connectivity
    Devices,
    /// Play generated tones through the signal chain and show spectrum bars
    Demo {
        /// Base tone frequency in Hz
        #[arg(long, default_value_t = 440.0)]
        frequency: f32,
        /// How long to play each track, in seconds
        #[arg(long, default_value_t = 2.0)]
        seconds: f32,
    },
    /// Parse an LRC file and preview the result
    Lyrics {
        /// Path to the .lrc file
        file: PathBuf,
        /// Persist the parsed document under this "title::artist" key
        #[arg(long)]
        save: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Devices => devices(),
        Command::Demo { frequency, seconds } => demo(frequency, seconds),
        Command::Lyrics { file, save } => lyrics(&file, save.as_deref()),
    }
}

fn devices() -> Result<()> {
    let devices = list_output_devices()?;
    if devices.is_empty() {
        println!("no output devices found");
        return Ok(());
    }
    for device in devices {
        let marker = if device.is_default { "* " } else { "  " };
        let name = if device.name.is_empty() {
            "(unnamed)"
        } else {
            &device.name
        };
        println!("{marker}{name} [{}]", device.connectivity.label());
    }
    Ok(())
}

fn demo(frequency: f32, seconds: f32) -> Result<()> {
    let context = match OutputContext::open_default() {
        Ok(context) => context,
        Err(e) => {
            warn!("no output device ({e}), rendering detached");
            OutputContext::detached("demo")
        }
    };
    println!(
        "output: {} ({} Hz, {})",
        context.name(),
        context.sample_rate(),
        context.connectivity().label()
    );

    let chain = SignalChain::build(Arc::clone(&context), ChainParams::default())?;
    let feed = SpectrumFeed::start(chain.tap());

    // Each demo track auditions as a tone offset from the base frequency
    let sample_rate = context.sample_rate() as f32;
    let sink = ChainSink::new(
        chain,
        Box::new(move |track: &Track| {
            let offset = (track.id.as_u128() % 220) as f32;
            Ok(Box::new(SineSource::new(frequency + offset, sample_rate)))
        }),
    );

    let tracks = vec![
        demo_track("Chill Waves"),
        demo_track("Heavy Drums"),
        demo_track("Night Drive"),
    ];
    let mut session = PlayerSession::new(sink, tracks);

    session.play()?;
    for _ in 0..session.tracks().len() {
        std::thread::sleep(Duration::from_secs_f32(seconds.max(0.1)));
        let position = session.sink().position_secs();
        session.set_position(position);

        let snapshot = session.snapshot();
        let current = session.current_track().map_or("-", |t| t.title.as_str());
        let mood = session
            .current_track()
            .and_then(|t| t.mood)
            .map_or("-", |m| m.label());
        println!(
            "{current} [{mood}] at {:.1}s / index {:?}",
            snapshot.position, snapshot.current_index
        );
        print_bars(&feed);
        session.advance()?;
    }
    session.pause();
    Ok(())
}

fn demo_track(title: &str) -> Track {
    Track::new(title, "Sonic Stream", FormatInfo::new("sine"))
}

fn print_bars(feed: &SpectrumFeed) {
    for count in [32, 13] {
        let bars = feed.bars(count);
        println!("{count} bars:");
        for (i, bar) in bars.iter().enumerate() {
            let width = (bar / 2.0).round() as usize;
            println!("  {i:>2} |{}", "#".repeat(width));
        }
    }
}

fn lyrics(file: &PathBuf, save: Option<&str>) -> Result<()> {
    let input = std::fs::read_to_string(file)?;
    let doc = sonic_lyrics::parse_lrc(&input)?;

    let kind = if doc.synced { "synced" } else { "unsynced" };
    println!("{} lines, {kind}", doc.lines.len());
    for line in doc.lines.iter().take(10) {
        if doc.synced {
            println!("[{:>7.2}s] {}", line.time, line.text);
        } else {
            println!("{}", line.text);
        }
    }
    if doc.lines.len() > 10 {
        println!("…");
    }

    if let Some(key) = save {
        let store = Store::new()?;
        store.save_lyrics(key, &doc)?;
        println!("saved under \"{key}\"");
    }
    Ok(())
}
