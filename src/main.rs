// glitchbox: a desktop-glitch prank replayed on a window-sized surface.
// • `run` (default): asks twice, then a tone sequencer thread plays three
//   bytebeat tones while the tick loop fires screen payloads; each finished
//   tone moves the payload table to the next stage. ESC quits.
// • `tones`: writes the tone buffers to WAV files.
// • `corrupt`: glitches an image file by scrambling its BMP bytes.

mod audio;
mod backdrop;
mod bytebeat;
mod config;
mod corrupt;
mod draw;
mod error;
mod gdi;
mod icons;
mod payloads;
mod prompt;
mod raster;
mod scheduler;
mod types;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;

use bytebeat::ToneSequencer;
use config::{Backdrop, Settings};
use corrupt::{CorruptOptions, Method};
use draw::{Drawer, draw_crosshair, draw_text_5x7};
use error::Error;
use raster::RasterGdi;
use scheduler::{Scheduler, Stage, StageCell, TickOutcome};
use types::Point;

#[derive(Parser, Debug)]
#[command(name = "glitchbox", version, about = "Screen-glitch payloads driven by bytebeat tones")]
struct Cli {
    /// RON settings file; CLI flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides RUST_LOG (error, warn, info, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<log::LevelFilter>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the window and run the payload loop (default).
    Run(RunArgs),
    /// Render the configured tone buffers to 8-bit WAV files.
    Tones {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Glitch an image by corrupting its BMP encoding.
    Corrupt(CorruptArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    #[arg(long)]
    width: Option<usize>,
    #[arg(long)]
    height: Option<usize>,
    /// Stop once the tick counter reaches this value (e.g. 500).
    /// Unbounded by default: the run ends at the terminal stage, ESC or window close.
    #[arg(long)]
    tick_limit: Option<u64>,
    /// Stage to start in (1-3).
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    stage: Option<u8>,
    #[arg(long)]
    seed: Option<u64>,
    /// `pattern`, `camera`, `camera:N` or an image path.
    #[arg(long)]
    backdrop: Option<Backdrop>,
    /// Skip the start prompt.
    #[arg(long)]
    yes: bool,
    #[arg(long)]
    no_audio: bool,
    /// Overlay tick/stage/fps and a crosshair at the pointer.
    #[arg(long)]
    hud: bool,
    /// Window refresh rate.
    #[arg(long)]
    fps: Option<usize>,
    /// Save the final screen surface here on exit.
    #[arg(long)]
    screenshot: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CorruptArgs {
    input: PathBuf,
    output: PathBuf,
    #[arg(long, value_enum, default_value_t = Method::Offset)]
    method: Method,
    /// Bytes per corrupted run.
    #[arg(long, default_value_t = 50)]
    amount: usize,
    #[arg(long, default_value_t = 1)]
    iterations: usize,
    /// Added to each byte with `--method offset`.
    #[arg(long, default_value_t = 10)]
    offset: u8,
    #[arg(long, default_value_t = 128)]
    header_len: usize,
    #[arg(long, default_value_t = 128)]
    tail_len: usize,
    #[arg(long)]
    seed: Option<u64>,
}

fn init_logging(level: Option<log::LevelFilter>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.init();
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    init_logging(cli.log_level);
    log::info!("glitchbox v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load(cli.config.as_deref())?;
    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => run(settings, args),
        Command::Tones { out_dir } => tones(&settings, &out_dir),
        Command::Corrupt(args) => {
            let opts = CorruptOptions {
                method: args.method,
                header_len: args.header_len,
                tail_len: args.tail_len,
                iterations: args.iterations,
                amount: args.amount,
                offset: args.offset,
            };
            corrupt::corrupt_image(&args.input, &args.output, &opts, &mut rng_from(args.seed))
        }
    }
}

fn apply_overrides(settings: &mut Settings, args: &RunArgs) {
    if let Some(w) = args.width { settings.width = w; }
    if let Some(h) = args.height { settings.height = h; }
    if args.tick_limit.is_some() { settings.tick_limit = args.tick_limit; }
    if let Some(n) = args.stage { settings.start_stage = Stage::from_u8(n - 1); }
    if args.seed.is_some() { settings.seed = args.seed; }
    if let Some(b) = &args.backdrop { settings.backdrop = b.clone(); }
    if args.yes { settings.prompt = false; }
    if args.no_audio { settings.audio.enabled = false; }
    if args.hud { settings.hud = true; }
    if let Some(fps) = args.fps { settings.present_fps = fps; }
}

fn tones(settings: &Settings, out_dir: &std::path::Path) -> Result<(), Error> {
    settings.validate()?;
    std::fs::create_dir_all(out_dir)?;
    let mut seq = ToneSequencer::new(settings.audio.sample_rate, settings.audio.seconds);
    for waveform in settings.audio.parsed_waveforms()? {
        seq.generate(waveform);
    }
    for (i, buffer) in seq.buffers().iter().enumerate() {
        let path = out_dir.join(format!("tone-{}-{}.wav", i + 1, buffer.waveform));
        bytebeat::export_wav(&path, buffer, seq.sample_rate())?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}

fn run(mut settings: Settings, args: RunArgs) -> Result<(), Error> {
    apply_overrides(&mut settings, &args);
    settings.validate()?;

    if settings.prompt && !prompt::ask_to_start(&mut prompt::TerminalPrompt::stdio()) {
        log::info!("declined; nothing was run");
        return Ok(());
    }

    /* --- Screen surface + window --- */
    let screen = backdrop::load(&settings.backdrop, settings.width, settings.height)?;
    let gdi = RasterGdi::new(screen);
    let mut drawer = Drawer::new("glitchbox", settings.width, settings.height, settings.present_fps)?;

    /* --- Tone sequencer: the only writer of the stage --- */
    let stage = StageCell::new(settings.start_stage);
    let waveforms = settings.audio.parsed_waveforms()?;
    let tone_cfg = settings.audio.clone();
    let writer = stage.clone();
    thread::Builder::new().name("tone-sequencer".into()).spawn(move || {
        let mut seq = ToneSequencer::new(tone_cfg.sample_rate, tone_cfg.seconds);
        for waveform in waveforms {
            seq.generate(waveform);
        }
        let mut sink = audio::open_sink(tone_cfg.enabled);
        seq.run(sink.as_mut(), &writer);
    })?;

    /* --- Tick loop --- */
    let mut scheduler = Scheduler::new(settings.dispatch.clone(), stage, settings.tick_limit, rng_from(settings.seed));
    let frame_interval = Duration::from_secs_f64(1.0 / settings.present_fps as f64);
    let mut last_present: Option<Instant> = None;
    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;
    let mut hud_fps_text = String::from("FPS: 0.0");

    while drawer.is_open() && !drawer.esc_pressed() {
        let cursor = drawer.mouse_pos().map(|(x, y)| Point::new(x as i32, y as i32));
        gdi.set_cursor(cursor);

        if let TickOutcome::Finished(reason) = scheduler.tick(&gdi) {
            log::info!("finished after {} ticks: {reason:?}", scheduler.counter());
            break;
        }

        let now = Instant::now();
        if last_present.is_some_and(|t| now.duration_since(t) < frame_interval) { continue; }
        last_present = Some(now);

        if settings.hud {
            let mut frame = gdi.with_screen(|s| s.clone());
            if let Some(p) = cursor {
                draw_crosshair(&mut frame, p.x, p.y, 12, 0x00_FF_CC_33);
            }
            let hud = format!("TICK {} | STAGE {} | {}", scheduler.counter(), scheduler.stage(), hud_fps_text);
            draw_text_5x7(&mut frame, 8, 8, &hud, 0x00_FF_FF_FF);
            drawer.present(&frame)?;
        } else {
            gdi.with_screen(|s| drawer.present(s))?;
        }

        frames_this_second += 1;
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let fps = frames_this_second as f32 / now.duration_since(last_fps_time).as_secs_f32();
            log::debug!("FPS: {fps:.1}");
            hud_fps_text = format!("FPS: {fps:.1}");
            frames_this_second = 0;
            last_fps_time = now;
        }
    }

    log::debug!(
        "{} pattern inverts, {} handles outstanding",
        gdi.pattern_inverts(),
        gdi.outstanding_handles()
    );
    if let Some(path) = &args.screenshot {
        gdi.with_screen(|s| backdrop::save_screenshot(s, path))?;
    }
    // the tone thread is detached; it is parked in a blocking play call and dies with the process
    Ok(())
}
