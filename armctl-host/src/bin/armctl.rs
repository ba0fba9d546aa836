//! armctl: record, replay and inspect servo arm motions

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use armctl_core::kinematics::calibration::CalibrationModel;
use armctl_core::safety::VerifyReport;
use armctl_core::scheduler::{DualError, PlaybackError, PlaybackOutcome, PlaybackTiming};
use armctl_core::{forward, play_dual, Arm, ArmConfig, ArmError, Playlist, Pose};
use armctl_host::config::render_config;
use armctl_host::session::{self, SessionSummary, WallClock};
use armctl_host::store::validate_name;
use armctl_host::transport::{open_serial, DEFAULT_BAUD};
use armctl_host::{logging, trims};
use armctl_host::{load_config, DualRecording, LineActuator, Link, SequenceStore, SimulatedArm, ThreadPacer};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::{debug, info, warn};

/// Arm controller over a boxed serial port or simulator
type BoardArm = Arm<LineActuator<Box<dyn Link>>>;

#[derive(Parser)]
#[command(name = "armctl", version, about = "Servo arm recorder and player")]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    opts: Options,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Options {
    /// Arm configuration file (built-in arm if omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Configuration of the second arm for dual commands
    #[arg(long, global = true)]
    config_b: Option<PathBuf>,

    /// Directory holding sequences, trims and live state
    #[arg(long, global = true, default_value = "sequences")]
    store: PathBuf,

    /// Trim file of the first arm (default: <store>/<arm>.trims)
    #[arg(long, global = true)]
    trims: Option<PathBuf>,

    /// Serial port of the servo board
    #[arg(long, global = true)]
    port: Option<String>,

    /// Serial port of the second board
    #[arg(long, global = true)]
    port_b: Option<String>,

    #[arg(long, global = true, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// Drive simulated boards instead of serial ports
    #[arg(long, global = true)]
    simulate: bool,

    /// Play poses in order at a fixed interval instead of recorded timing
    #[arg(long, global = true)]
    stepwise: bool,

    /// Interval between poses in stepwise mode
    #[arg(long, global = true, default_value_t = 0)]
    step_ms: u32,

    /// Start-pose tolerance in pulse units, overriding the config
    #[arg(long, global = true)]
    tolerance: Option<u16>,
}

#[derive(Subcommand)]
enum Command {
    /// Show joint angles and tool tip for a pose (the live pose if none given)
    Fk {
        /// One pulse per joint
        pulses: Vec<u16>,
    },

    /// Print the effective arm configuration as TOML
    Config,

    /// Send manual commands: set, s<joint>-<pulse>, m<magnet>-<0|1>, j<joint>+<step>
    Send {
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Record manual input read from stdin until `stop` or end of input
    Record {
        name: String,

        /// Drive both arms; lines are prefixed with 1: or 2:
        #[arg(long)]
        dual: bool,
    },

    /// Play a recorded sequence
    Play { name: String },

    /// Play sequences one after another, halting at the first failure
    Playlist {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Play a two-arm recording on both arms
    Dual { name: String },

    /// List stored sequences and two-arm recordings
    List,

    /// Store a trim (pulse units) for one joint of the first arm
    Trim {
        joint: u8,
        #[arg(allow_negative_numbers = true)]
        trim: i16,
    },
}

/// One arm's configuration and where its state lives
struct ArmSetup {
    config: ArmConfig,
    key: String,
}

struct Workspace {
    opts: Options,
    store: SequenceStore,
    cancel: Arc<AtomicBool>,
}

impl Workspace {
    fn new(opts: Options) -> Result<Self> {
        let store = SequenceStore::open(&opts.store)
            .with_context(|| format!("cannot open store {}", opts.store.display()))?;
        Ok(Self {
            opts,
            store,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    fn trims_path(&self, key: &str, first: bool) -> PathBuf {
        match (&self.opts.trims, first) {
            (Some(path), true) => path.clone(),
            _ => self.store.root().join(format!("{}.trims", key)),
        }
    }

    /// Load a config, apply its stored trims and the tolerance override
    ///
    /// `taken` is the state key of the other arm; a second arm with the same
    /// name gets a distinct key.
    fn arm_setup(&self, path: Option<&Path>, taken: Option<&str>) -> Result<ArmSetup> {
        let mut config = load_config(path)?;
        let key = match taken {
            Some(other) if other == config.name() => format!("{}_2", config.name()),
            _ => config.name().to_string(),
        };
        trims::apply_stored_trims(&self.trims_path(&key, taken.is_none()), &mut config)?;
        if let Some(tolerance) = self.opts.tolerance {
            config.set_tolerance(tolerance);
        }
        Ok(ArmSetup { config, key })
    }

    fn live_pose(&self, setup: &ArmSetup) -> Pose {
        match self.store.load_live(&setup.key) {
            Some(pose) if setup.config.fits(&pose) => pose,
            _ => setup.config.neutral_pose(),
        }
    }

    fn timing(&self) -> PlaybackTiming {
        if self.opts.stepwise {
            PlaybackTiming::Stepwise {
                step_ms: self.opts.step_ms,
            }
        } else {
            PlaybackTiming::Recorded
        }
    }

    fn connect(&self, setup: ArmSetup, port: Option<&str>) -> Result<BoardArm> {
        let live = self.live_pose(&setup);
        let link: Box<dyn Link> = if self.opts.simulate {
            info!("Simulating '{}'", setup.key);
            Box::new(SimulatedArm::resume(&setup.config, &live))
        } else {
            let Some(port) = port else {
                bail!("no serial port for '{}' (use --port or --simulate)", setup.key);
            };
            info!("Connecting '{}' on {} at {} baud", setup.key, port, self.opts.baud);
            Box::new(open_serial(port, self.opts.baud)?)
        };

        let actuator = LineActuator::with_magnets(link, live.magnets());
        let mut arm = Arm::with_live(setup.config, actuator, live);
        arm.set_timing(self.timing());
        Ok(arm)
    }

    fn open_arm(&self) -> Result<(BoardArm, String)> {
        let setup = self.arm_setup(self.opts.config.as_deref(), None)?;
        let key = setup.key.clone();
        let arm = self.connect(setup, self.opts.port.as_deref())?;
        Ok((arm, key))
    }

    fn open_pair(&self) -> Result<((BoardArm, String), (BoardArm, String))> {
        let setup_a = self.arm_setup(self.opts.config.as_deref(), None)?;
        let setup_b = self.arm_setup(self.opts.config_b.as_deref(), Some(&setup_a.key))?;
        let (key_a, key_b) = (setup_a.key.clone(), setup_b.key.clone());
        let arm_a = self.connect(setup_a, self.opts.port.as_deref())?;
        let arm_b = self.connect(setup_b, self.opts.port_b.as_deref())?;
        Ok(((arm_a, key_a), (arm_b, key_b)))
    }

    /// Remember where the arm was left and collect what the board said
    fn finish(&self, arm: &mut BoardArm, key: &str) {
        if let Err(e) = self.store.save_live(key, arm.live()) {
            warn!("Could not save live pose of '{}': {}", key, e);
        }
        match arm.actuator_mut().drain_responses() {
            Ok(lines) => debug!("'{}' board sent {} lines", key, lines.len()),
            Err(e) => warn!("Could not read from '{}' board: {}", key, e),
        }
    }

    /// Pacer stopped by Ctrl-C
    fn pacer(&self) -> Result<ThreadPacer> {
        let flag = Arc::clone(&self.cancel);
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .context("cannot install Ctrl-C handler")?;
        Ok(ThreadPacer::with_flag(Arc::clone(&self.cancel)))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose).context("invalid log filter")?;
    let ws = Workspace::new(cli.opts)?;

    match cli.command {
        Command::Fk { pulses } => run_fk(&ws, &pulses),
        Command::Config => {
            let setup = ws.arm_setup(ws.opts.config.as_deref(), None)?;
            print!("{}", render_config(&setup.config)?);
            Ok(())
        }
        Command::Send { commands } => run_send(&ws, &commands),
        Command::Record { name, dual: false } => run_record(&ws, &name),
        Command::Record { name, dual: true } => run_record_dual(&ws, &name),
        Command::Play { name } => run_play(&ws, &name),
        Command::Playlist { names } => run_playlist(&ws, &names),
        Command::Dual { name } => run_dual(&ws, &name),
        Command::List => run_list(&ws),
        Command::Trim { joint, trim } => run_trim(&ws, joint, trim),
    }
}

fn run_fk(ws: &Workspace, pulses: &[u16]) -> Result<()> {
    let setup = ws.arm_setup(ws.opts.config.as_deref(), None)?;
    let config = &setup.config;

    let pose = if pulses.is_empty() {
        ws.live_pose(&setup)
    } else {
        if pulses.len() != config.joint_count() as usize {
            bail!(
                "'{}' has {} joints, got {} pulses",
                config.name(),
                config.joint_count(),
                pulses.len()
            );
        }
        let magnets = vec![false; config.magnet_count() as usize];
        let pose = Pose::new(pulses, &magnets).map_err(|e| anyhow!("{}", e))?;
        config.clamp_pose(&pose)
    };

    let angles = CalibrationModel::new(config.joints()).joint_angles_deg(&pose);
    for ((joint, pulse), angle) in config.joints().iter().zip(pose.pulses()).zip(angles.iter()) {
        println!("J{}  {:>4}  {:>8.2} deg", joint.id, pulse, angle);
    }
    let tip = forward(config, &pose);
    println!("tip  x={:.2}  y={:.2}  z={:.2} mm", tip.x, tip.y, tip.z);
    Ok(())
}

fn report_session(summary: &SessionSummary) {
    info!(
        "{} changes, {} unchanged, {} rejected",
        summary.changed, summary.unchanged, summary.rejected
    );
}

fn run_send(ws: &Workspace, commands: &[String]) -> Result<()> {
    let (mut arm, key) = ws.open_arm()?;
    let script = commands.join("\n");
    let result = session::drive(&mut arm, script.as_bytes(), &mut WallClock::start());
    ws.finish(&mut arm, &key);

    let summary = result.context("cannot read commands")?;
    report_session(&summary);
    println!("{}", arm.live().pulses().iter().map(u16::to_string).collect::<Vec<_>>().join(" "));
    Ok(())
}

fn run_record(ws: &Workspace, name: &str) -> Result<()> {
    validate_name(name)?;
    let (mut arm, key) = ws.open_arm()?;
    let mut clock = WallClock::start();
    arm.start_recording(name, 0).map_err(|e| anyhow!("{}", e))?;
    info!("Recording '{}', type `stop` to finish", name);

    let result = session::drive(&mut arm, io::stdin().lock(), &mut clock);
    let sequence = arm.stop_recording().map_err(|e| anyhow!("{}", e));
    ws.finish(&mut arm, &key);
    report_session(&result.context("cannot read stdin")?);

    let sequence = sequence?;
    if sequence.is_empty() {
        warn!("Nothing recorded, '{}' not saved", name);
        return Ok(());
    }
    let saved = ws.store.save(&sequence)?;
    println!(
        "saved '{}' ({} poses, {} ms)",
        saved,
        sequence.len(),
        sequence.duration_ms()
    );
    Ok(())
}

fn run_record_dual(ws: &Workspace, name: &str) -> Result<()> {
    validate_name(name)?;
    let ((mut arm_a, key_a), (mut arm_b, key_b)) = ws.open_pair()?;
    let start = (arm_a.live().clone(), arm_b.live().clone());
    let mut clock = WallClock::start();
    arm_a.start_recording(name, 0).map_err(|e| anyhow!("{}", e))?;
    arm_b.start_recording(name, 0).map_err(|e| anyhow!("{}", e))?;
    info!("Recording '{}' on both arms, prefix lines with 1: or 2:", name);

    let result = session::drive_dual(&mut arm_a, &mut arm_b, io::stdin().lock(), &mut clock);
    let sequences = arm_a
        .stop_recording()
        .and_then(|a| Ok((a, arm_b.stop_recording()?)))
        .map_err(|e| anyhow!("{}", e));
    ws.finish(&mut arm_a, &key_a);
    ws.finish(&mut arm_b, &key_b);
    report_session(&result.context("cannot read stdin")?);

    let (seq_a, seq_b) = sequences?;
    if seq_a.is_empty() && seq_b.is_empty() {
        warn!("Nothing recorded, '{}' not saved", name);
        return Ok(());
    }
    let recording = DualRecording::combine(name, (&start.0, &start.1), &seq_a, &seq_b);
    let saved = ws.store.save_dual(&recording)?;
    println!(
        "saved '{}' ({} events, {} ms)",
        saved,
        recording.timeline.len(),
        recording.duration_ms()
    );
    Ok(())
}

fn log_refusal(arm: &str, report: &VerifyReport) {
    warn!(
        "'{}' is not at the start pose (worst deviation {}, tolerance {})",
        arm,
        report.worst(),
        report.tolerance
    );
    for deviation in &report.deviations {
        warn!("  {}", deviation);
    }
}

fn run_play(ws: &Workspace, name: &str) -> Result<()> {
    let sequence = ws.store.load(name)?;
    let (mut arm, key) = ws.open_arm()?;
    let mut pacer = ws.pacer()?;

    info!("Playing '{}' ({} poses)", name, sequence.len());
    let result = arm.play(&sequence, &mut pacer);
    ws.finish(&mut arm, &key);

    match result {
        Ok(report) => {
            match report.outcome {
                PlaybackOutcome::Completed => println!("played '{}' ({} poses)", name, report.written),
                PlaybackOutcome::Cancelled => {
                    println!("cancelled '{}' after {} poses", name, report.written)
                }
            }
            Ok(())
        }
        Err(ArmError::Playback(PlaybackError::SafetyMismatch(report))) => {
            log_refusal(&key, &report);
            bail!("refused to play '{}': move the arm to its start pose first", name)
        }
        Err(e) => Err(anyhow!("playing '{}' failed: {}", name, e)),
    }
}

fn run_playlist(ws: &Workspace, names: &[String]) -> Result<()> {
    let mut playlist = Playlist::new();
    for name in names {
        playlist.add(name);
    }
    let (mut arm, key) = ws.open_arm()?;
    let mut pacer = ws.pacer()?;
    let mut library = ws.store.clone();

    info!("Running playlist of {} sequences", playlist.len());
    let result = arm.run_playlist(&playlist, &mut library, &mut pacer);
    ws.finish(&mut arm, &key);

    match result {
        Ok(report) if report.cancelled => {
            println!("cancelled after {} of {} sequences", report.completed, playlist.len());
            Ok(())
        }
        Ok(report) => {
            println!("played {} sequences", report.completed);
            Ok(())
        }
        Err(ArmError::PlaylistEntry {
            index,
            error: PlaybackError::SafetyMismatch(report),
        }) => {
            log_refusal(&key, &report);
            bail!("playlist halted at entry {}", index + 1)
        }
        Err(e) => {
            warn!("Playlist halted");
            Err(anyhow!("{}", e))
        }
    }
}

fn run_dual(ws: &Workspace, name: &str) -> Result<()> {
    let recording = ws.store.load_dual(name)?;
    let ((mut arm_a, key_a), (mut arm_b, key_b)) = ws.open_pair()?;
    let shape = |arm: &BoardArm| (arm.config().joint_count(), arm.config().magnet_count());
    let (seq_a, seq_b) = recording
        .split(shape(&arm_a), shape(&arm_b))
        .map_err(|e| anyhow!("'{}' does not fit these arms: {}", name, e))?;
    let mut pacer = ws.pacer()?;

    info!("Playing '{}' on both arms ({} events)", name, recording.timeline.len());
    let result = play_dual(&mut arm_a, &mut arm_b, (&seq_a, &seq_b), ws.timing(), &mut pacer);
    ws.finish(&mut arm_a, &key_a);
    ws.finish(&mut arm_b, &key_b);

    match result {
        Ok(report) => {
            match report.outcome {
                PlaybackOutcome::Completed => println!("played '{}' ({} poses)", name, report.written),
                PlaybackOutcome::Cancelled => {
                    println!("cancelled '{}' after {} poses", name, report.written)
                }
            }
            Ok(())
        }
        Err(ArmError::Dual(DualError::Refused { a, b })) => {
            for (key, error) in [(&key_a, a), (&key_b, b)] {
                match error {
                    Some(PlaybackError::SafetyMismatch(report)) => log_refusal(key, &report),
                    Some(e) => warn!("'{}': {}", key, e),
                    None => {}
                }
            }
            bail!("refused to play '{}' on both arms", name)
        }
        Err(e) => Err(anyhow!("playing '{}' failed: {}", name, e)),
    }
}

fn run_list(ws: &Workspace) -> Result<()> {
    for name in ws.store.list()? {
        match ws.store.load(&name) {
            Ok(seq) => println!(
                "{:<24} {:>5} poses {:>8} ms",
                name,
                seq.len(),
                seq.duration_ms()
            ),
            Err(e) => println!("{:<24} unreadable: {}", name, e),
        }
    }
    for name in ws.store.list_dual()? {
        match ws.store.load_dual(&name) {
            Ok(rec) => println!(
                "{:<24} {:>5} events {:>7} ms (dual)",
                name,
                rec.timeline.len(),
                rec.duration_ms()
            ),
            Err(e) => println!("{:<24} unreadable: {}", name, e),
        }
    }
    Ok(())
}

fn run_trim(ws: &Workspace, joint: u8, trim: i16) -> Result<()> {
    let setup = ws.arm_setup(ws.opts.config.as_deref(), None)?;
    let mut config = setup.config;
    config
        .set_trim(joint, trim)
        .map_err(|e| anyhow!("cannot trim joint {}: {}", joint, e))?;

    let path = ws.trims_path(&setup.key, true);
    trims::save_joint_trim(&path, joint, trim)?;
    if let Some(joint) = config.joint(joint) {
        println!(
            "J{} trim {:+} saved to {} (neutral now {})",
            joint.id,
            trim,
            path.display(),
            joint.neutral_pulse()
        );
    }
    Ok(())
}
