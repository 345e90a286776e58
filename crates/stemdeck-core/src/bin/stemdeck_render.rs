//! Stemdeck offline renderer
//!
//! Drives the engine without an audio device: loads four synthetic stems,
//! applies a matrix preset and an effect preset, renders block by block
//! while ticking the control side on the simulated clock, and writes the
//! master bus to a WAV file.
//!
//! ## Command line flags
//!
//! - `--config <path>`: engine config (YAML or JSON), defaults otherwise
//! - `--matrix <name>`: built-in matrix preset (default `pass_through`)
//! - `--effects <name>`: built-in effect preset applied to every stem (default `club`)
//! - `--seconds <n>`: render length (default 8)
//! - `--out <dir>`: output directory (default current directory)

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use stemdeck_core::config::{default_config_path, load_config, EngineConfig};
use stemdeck_core::{build_engine, StemInput, StemKind, StereoBuffer};

struct Args {
    config: Option<PathBuf>,
    matrix: String,
    effects: String,
    seconds: f64,
    out_dir: PathBuf,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: None,
        matrix: "pass_through".to_string(),
        effects: "club".to_string(),
        seconds: 8.0,
        out_dir: PathBuf::from("."),
    };

    let mut iter = std::env::args().skip(1);
    while let Some(flag) = iter.next() {
        let mut value = || iter.next().with_context(|| format!("{} needs a value", flag));
        match flag.as_str() {
            "--config" => args.config = Some(PathBuf::from(value()?)),
            "--matrix" => args.matrix = value()?,
            "--effects" => args.effects = value()?,
            "--seconds" => {
                args.seconds = value()?.parse().context("--seconds must be a number")?;
            }
            "--out" => args.out_dir = PathBuf::from(value()?),
            other => bail!("unknown flag {}", other),
        }
    }
    Ok(args)
}

/// A few seconds of a detuned tone per stem kind
fn synth_stem(kind: StemKind, sample_rate: u32, seconds: f64) -> StemInput {
    let (freq, level) = match kind {
        StemKind::Vocals => (440.0, 0.2),
        StemKind::Drums => (110.0, 0.3),
        StemKind::Bass => (55.0, 0.3),
        StemKind::Other => (330.0, 0.15),
    };
    let frames = (seconds * sample_rate as f64) as usize;
    let mut samples = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let t = i as f64 / sample_rate as f64;
        let left = (std::f64::consts::TAU * freq * t).sin() * level;
        let right = (std::f64::consts::TAU * freq * 1.003 * t).sin() * level;
        samples.push(left as f32);
        samples.push(right as f32);
    }
    StemInput::new("synthetic", kind, sample_rate, 2, samples)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    let config: EngineConfig = load_config(
        &args
            .config
            .clone()
            .unwrap_or_else(|| default_config_path("engine.yaml")),
    );

    // Build the pool up front so the first parallel block doesn't pay for it
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.stem_count.max(1))
        .thread_name(|i| format!("rayon-render-{}", i))
        .build_global()
        .context("Failed to initialize Rayon thread pool")?;

    let (mut controller, mut renderer) = build_engine(&config);

    for kind in StemKind::ALL.into_iter().filter(|k| k.index() < config.stem_count) {
        controller
            .load_stem(synth_stem(kind, config.sample_rate, 4.0))
            .with_context(|| format!("loading {}", kind))?;
        controller
            .apply_builtin_effect_preset(kind, &args.effects)
            .with_context(|| format!("effect preset on {}", kind))?;
    }
    controller
        .apply_builtin_matrix_preset(&args.matrix)
        .context("matrix preset")?;

    let block = config.effective_block_frames();
    let total_frames = (args.seconds * config.sample_rate as f64) as usize;
    let tick_every = config.automation.tick_interval();

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {:?}", args.out_dir))?;
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let path = args.out_dir.join(format!("stemdeck-{}-{}-{}.wav", args.matrix, args.effects, stamp));
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: config.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&path, spec).with_context(|| format!("creating {:?}", path))?;

    let mut out = StereoBuffer::silence(block);
    let mut rendered = 0;
    let mut next_tick = 0.0;
    while rendered < total_frames {
        let frames = block.min(total_frames - rendered);
        out.set_len_from_capacity(frames);
        renderer.process(&mut out);
        for sample in out.iter() {
            writer.write_sample(sample.left)?;
            writer.write_sample(sample.right)?;
        }
        rendered += frames;

        let now = rendered as f64 / config.sample_rate as f64;
        if now >= next_tick {
            controller.control_tick(now);
            controller.maintain_if_due(now);
            next_tick = now + tick_every;
        }
    }
    writer.finalize()?;

    let status = controller.status();
    log::info!(
        "Rendered {:.1}s to {:?} (peak {:.3})",
        args.seconds,
        path,
        renderer.telemetry().master_peak()
    );
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
