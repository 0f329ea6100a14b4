// Separately:
// CPU: cycles_per_frame * 60 times per second
// Display: 60 times per second
// Timer: 60 times per second

use std::path::PathBuf;

use anyhow::{bail, Context};
use chipvm::{
    display::{HEIGHT, WIDTH},
    timer::TickClock,
    Config, Emulator, FrameBuffer, KeypadState, ShiftSource, StepOutcome,
};
use clap::Parser;
use minifb::{Key, Scale, Window, WindowOptions};

const PIXEL_ON: u32 = 0x007FFF;
const PIXEL_OFF: u32 = 0x000000;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum WindowScale {
    X1,
    X2,
    X4,
    X8,
    X16,
    X32,
}

impl From<WindowScale> for Scale {
    fn from(scale: WindowScale) -> Self {
        match scale {
            WindowScale::X1 => Scale::X1,
            WindowScale::X2 => Scale::X2,
            WindowScale::X4 => Scale::X4,
            WindowScale::X8 => Scale::X8,
            WindowScale::X16 => Scale::X16,
            WindowScale::X32 => Scale::X32,
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Run a CHIP-8 program. Keys 1234/QWER/ASDF/ZXCV, ESC to exit")]
struct Args {
    /// Program image to run
    rom: PathBuf,

    /// 8XY6/8XYE shift VY into VX (COSMAC VIP behaviour)
    #[arg(long)]
    legacy_shift: bool,

    /// Instructions executed per 60Hz frame
    #[arg(long, default_value_t = 10)]
    cycles_per_frame: u32,

    #[arg(long, value_enum, default_value_t = WindowScale::X16)]
    scale: WindowScale,

    /// Seed for the random number instruction
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = Config {
        shift_source: if args.legacy_shift {
            ShiftSource::Vy
        } else {
            ShiftSource::Vx
        },
        rng_seed: args.seed,
        ..Config::default()
    };
    let mut emu = Emulator::new(config, FrameBuffer::new(), KeypadState::new());
    emu.load_file(&args.rom)
        .with_context(|| format!("loading {}", args.rom.display()))?;

    let mut window = Window::new(
        "chipvm - ESC to exit",
        WIDTH,
        HEIGHT,
        WindowOptions {
            scale: args.scale.into(),
            ..WindowOptions::default()
        },
    )
    .context("creating window")?;
    // Limit to max ~60 fps update rate
    window.limit_update_rate(Some(std::time::Duration::from_micros(16600)));

    let mut pixel_buffer = vec![PIXEL_OFF; WIDTH * HEIGHT];
    let mut clock = TickClock::new();

    while window.is_open() && !window.is_key_down(Key::Escape) {
        emu.keypad_mut().update_from_window(&window.get_keys());

        for _ in 0..args.cycles_per_frame {
            match emu.step() {
                Ok(StepOutcome::Executed) => {}
                Ok(StepOutcome::AwaitingKey | StepOutcome::Halted) => break,
                Err(err) => bail!("program stopped: {err}"),
            }
        }

        for _ in 0..clock.poll() {
            emu.tick_timers();
        }

        emu.framebuffer()
            .render_into(&mut pixel_buffer, PIXEL_ON, PIXEL_OFF);
        window
            .update_with_buffer(&pixel_buffer, WIDTH, HEIGHT)
            .context("updating window")?;
    }

    log::info!("quitting");
    Ok(())
}
