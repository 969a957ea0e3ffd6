use anyhow::Context;
use clap::Parser;
use sqwclock_config::{BoardConfig, TestAssertion, TestScript, TimeOfDay};
use sqwclock_core::variant::{ActiveVariant, Variant};
use sqwclock_core::{Board, SimulationError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const DEFAULT_DURATION_MS: u64 = 5_000;
/// One simulated day.
const MAX_DURATION_MS: u64 = 86_400_000;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "SqwClock: RTC square-wave driven timer interrupt demo",
    long_about = None
)]
struct Args {
    /// Path to a test script (YAML) with board settings, limits and assertions
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Path to a board configuration (YAML); overrides the script's board
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulated run time in milliseconds (default: 5000, or the script's limit)
    #[arg(short, long)]
    duration_ms: Option<u64>,

    /// RTC time at power-on, HH:MM:SS
    #[arg(long)]
    start: Option<TimeOfDay>,

    /// Power on with the RTC oscillator halted
    #[arg(long)]
    halted: bool,

    /// Enable debug-level tracing
    #[arg(short, long)]
    trace: bool,

    /// Do not mirror UART output to stdout
    #[arg(long)]
    no_uart_stdout: bool,

    /// Write a JSON snapshot of the board after the run
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

/// What the run was asked to do, after merging the script with flags.
struct RunPlan {
    board: BoardConfig,
    duration_ms: u64,
    assertions: Vec<TestAssertion>,
}

fn plan(args: &Args) -> anyhow::Result<RunPlan> {
    let (mut board, script_duration, assertions) = match &args.script {
        Some(path) => {
            info!("Loading test script: {:?}", path);
            let script = TestScript::from_file(path)?;
            (
                script.board,
                Some(script.limits.duration_ms),
                script.assertions,
            )
        }
        None => (BoardConfig::default(), None, Vec::new()),
    };

    if let Some(path) = &args.config {
        info!("Loading board config: {:?}", path);
        board = BoardConfig::from_file(path)
            .with_context(|| format!("Failed to load board config {:?}", path))?;
    }
    if let Some(start) = args.start {
        board.rtc.start = start;
    }
    if args.halted {
        board.rtc.halted = true;
    }
    if args.no_uart_stdout {
        board.uart_echo = false;
    }

    let duration_ms = args
        .duration_ms
        .or(script_duration)
        .unwrap_or(DEFAULT_DURATION_MS);
    if duration_ms == 0 || duration_ms > MAX_DURATION_MS {
        anyhow::bail!(
            "Duration {} ms out of range (1..={} ms)",
            duration_ms,
            MAX_DURATION_MS
        );
    }

    Ok(RunPlan {
        board,
        duration_ms,
        assertions,
    })
}

fn check(assertion: &TestAssertion, uart: &str, ticks: u64) -> bool {
    let (passed, what) = match assertion {
        TestAssertion::UartContains(a) => (
            uart.contains(&a.uart_contains),
            format!("uart_contains {:?}", a.uart_contains),
        ),
        TestAssertion::MinTicks(a) => (ticks >= a.min_ticks, format!("min_ticks {}", a.min_ticks)),
        TestAssertion::MaxTicks(a) => (ticks <= a.max_ticks, format!("max_ticks {}", a.max_ticks)),
    };
    if passed {
        info!("PASS {}", what);
    } else {
        error!("FAIL {} (ticks: {})", what, ticks);
    }
    passed
}

fn run(args: &Args, plan: RunPlan) -> anyhow::Result<u8> {
    let profile = <ActiveVariant as Variant>::PROFILE;
    info!(
        "Board: {} (Timer{}, {:?} edge on D{})",
        profile.board, profile.timer, profile.edge, profile.clock_pin.number
    );
    let halted = if plan.board.rtc.halted { " (halted)" } else { "" };
    info!("RTC start: {}{}", plan.board.rtc.start, halted);

    let mut board: Board = Board::new(&plan.board);
    board.power_on()?;

    info!("Running for {} ms...", plan.duration_ms);
    let ticks = board.run(plan.duration_ms)?;
    info!(
        "Finished at {} ms: {} compare-match ticks, RTC {}",
        board.now_ms(),
        ticks,
        board.rtc_time()
    );

    if let Some(path) = &args.snapshot {
        let json = board.snapshot().to_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write snapshot to {:?}", path))?;
        info!("Snapshot written to {:?}", path);
    }

    let uart = board.uart().map(|u| u.output()).unwrap_or_default();
    let mut failed = 0;
    for assertion in &plan.assertions {
        if !check(assertion, &uart, ticks) {
            failed += 1;
        }
    }

    if failed > 0 {
        error!("{} of {} assertions failed", failed, plan.assertions.len());
        return Ok(EXIT_ASSERT_FAIL);
    }
    Ok(EXIT_PASS)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.trace {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    // UART output owns stdout
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting SqwClock");

    let plan = match plan(&args) {
        Ok(plan) => plan,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    match run(&args, plan) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            if e.downcast_ref::<SimulationError>().is_some() {
                error!("Simulation error: {:#}", e);
            } else {
                error!("{:#}", e);
            }
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}
