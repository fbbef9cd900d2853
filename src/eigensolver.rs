//! Eigensolver adapter.
//!
//! The optimizer only needs the [`Eigensolver`] contract: an outline and a
//! material in, ascending non-trivial eigenfrequencies out.
//! [`CalculixSolver`] fulfils it by meshing the outline with `cgx` and
//! running a frequency step with `ccx` in a private working directory.

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::curve::Outline;
use crate::error::SolverError;
use crate::optimization::types::MaterialParams;
use crate::types::RIGID_BODY_MODES;

/// Computes plate eigenfrequencies for an outline.
///
/// Implementations must be shareable across worker threads.
pub trait Eigensolver: Send + Sync {
    /// Ascending eigenfrequencies (Hz) of the plate, rigid-body modes
    /// excluded. At most `num_modes` values are returned.
    fn solve(
        &self,
        outline: &Outline,
        material: &MaterialParams,
        num_modes: usize,
    ) -> Result<Vec<f64>, SolverError>;

    /// Fails when the solver cannot run at all, whatever the shape.
    fn check(&self) -> Result<(), SolverError> {
        Ok(())
    }
}

impl<F> Eigensolver for F
where
    F: Fn(&Outline, &MaterialParams, usize) -> Result<Vec<f64>, SolverError> + Send + Sync,
{
    fn solve(
        &self,
        outline: &Outline,
        material: &MaterialParams,
        num_modes: usize,
    ) -> Result<Vec<f64>, SolverError> {
        self(outline, material, num_modes)
    }
}

// ============================================================================
// CalculiX
// ============================================================================

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const MAX_DIR_ATTEMPTS: usize = 32;
const LOG_FILE: &str = "solver.log";
const EIGENVALUE_HEADER: &str = "E I G E N V A L U E   O U T P U T";

/// Settings for the CalculiX adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Pre-processor used for meshing.
    pub cgx: PathBuf,
    /// Solver executable.
    pub ccx: PathBuf,
    /// Directory under which per-run working directories are created.
    pub work_root: PathBuf,
    /// Wall-clock limit for each subprocess, in seconds.
    pub timeout_secs: u64,
    /// Leave working directories in place after a run.
    pub keep_files: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            cgx: PathBuf::from("cgx"),
            ccx: PathBuf::from("ccx"),
            work_root: env::temp_dir(),
            timeout_secs: 600,
            keep_files: false,
        }
    }
}

/// Eigensolver backed by the CalculiX `cgx`/`ccx` executables.
#[derive(Debug, Clone, Default)]
pub struct CalculixSolver {
    config: SolverConfig,
}

impl CalculixSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Create a fresh, uniquely named working directory.
    fn create_workdir(&self) -> Result<(PathBuf, String), SolverError> {
        fs::create_dir_all(&self.config.work_root)?;
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_DIR_ATTEMPTS {
            let name = unique_run_name(&mut rng);
            let path = self.config.work_root.join(&name);
            match fs::create_dir(&path) {
                Ok(()) => return Ok((path, name)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(SolverError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "could not find an unused working directory name",
        )))
    }

    /// Run `program` in `dir`, killing it when it exceeds the timeout.
    fn run(&self, program: &Path, args: &[&str], dir: &Path) -> Result<(), SolverError> {
        let label = program.display().to_string();
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE))?;

        let mut child = Command::new(program)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log))
            .spawn()
            .map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    SolverError::ExecutableNotFound(label.clone())
                } else {
                    SolverError::Spawn {
                        program: label.clone(),
                        source,
                    }
                }
            })?;

        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        loop {
            if let Some(status) = child.try_wait()? {
                return if status.success() {
                    Ok(())
                } else {
                    Err(SolverError::NonZeroExit {
                        program: label,
                        status: status.code().unwrap_or(-1),
                    })
                };
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SolverError::Timeout {
                    program: label,
                    seconds: self.config.timeout_secs,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn solve_in(
        &self,
        dir: &Path,
        name: &str,
        outline: &Outline,
        material: &MaterialParams,
        num_modes: usize,
    ) -> Result<Vec<f64>, SolverError> {
        let fbd = format!("{name}.fbd");
        let mut writer = BufWriter::new(File::create(dir.join(&fbd))?);
        write_fbd(outline, material.thickness, &mut writer)?;
        writer.flush()?;

        let mut writer = BufWriter::new(File::create(dir.join(format!("{name}.inp")))?);
        write_inp(material, num_modes + RIGID_BODY_MODES, &mut writer)?;
        writer.flush()?;

        self.run(&self.config.cgx, &["-b", "-bg", &fbd], dir)?;
        self.run(&self.config.ccx, &[name], dir)?;

        let dat = dir.join(format!("{name}.dat"));
        let text = match fs::read_to_string(&dat) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SolverError::MissingOutput(dat));
            }
            Err(e) => return Err(e.into()),
        };

        let mut frequencies: Vec<f64> = parse_dat(&text)?
            .into_iter()
            .skip(RIGID_BODY_MODES)
            .collect();
        frequencies.sort_by(f64::total_cmp);
        frequencies.truncate(num_modes);
        Ok(frequencies)
    }
}

impl Eigensolver for CalculixSolver {
    fn solve(
        &self,
        outline: &Outline,
        material: &MaterialParams,
        num_modes: usize,
    ) -> Result<Vec<f64>, SolverError> {
        let (dir, name) = self.create_workdir()?;
        debug!(dir = %dir.display(), points = outline.len(), "running calculix");

        let result = self.solve_in(&dir, &name, outline, material, num_modes);

        if self.config.keep_files {
            debug!(dir = %dir.display(), "keeping solver files");
        } else if let Err(e) = fs::remove_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %e, "failed to remove solver directory");
        }
        result
    }

    fn check(&self) -> Result<(), SolverError> {
        for program in [&self.config.cgx, &self.config.ccx] {
            if find_executable(program).is_none() {
                return Err(SolverError::ExecutableNotFound(
                    program.display().to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Resolve `program` against `PATH`, or check it directly when it has a
/// directory component.
fn find_executable(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Write a `cgx` batch script that extrudes `outline` by `thickness` and
/// meshes it with 10-node tetrahedra.
pub fn write_fbd<W: Write>(outline: &Outline, thickness: f64, w: &mut W) -> io::Result<()> {
    let n = outline.len();
    for (i, p) in outline.points.iter().enumerate() {
        writeln!(w, "pnt p{} {} {} 0", i, p.x, p.y)?;
    }
    for i in 0..n {
        writeln!(w, "line l{} p{} p{}", i, i, (i + 1) % n)?;
    }

    // l0 and l1 bound the surface directly, the rest form one combined line
    writeln!(w, "lcmb U0 + l2")?;
    for i in 3..n {
        writeln!(w, "lcmb U0 ADD - l{}", i)?;
    }
    writeln!(w, "gsur s0 + BLEND + U0 + l0 + l1")?;
    writeln!(w, "seta botpts0 s0")?;
    writeln!(w, "swep botpts0 toppts0 tra 0 0 {}", thickness)?;

    writeln!(w, "merge n all")?;
    writeln!(w, "div all 2")?;
    writeln!(w, "elty all te10")?;
    writeln!(w, "mesh all")?;
    writeln!(w, "send all abq")?;
    writeln!(w, "quit")
}

/// Write the `ccx` deck: material card plus a frequency step for
/// `num_modes` modes over the mesh produced by `cgx`.
pub fn write_inp<W: Write>(material: &MaterialParams, num_modes: usize, w: &mut W) -> io::Result<()> {
    writeln!(w, "*INCLUDE, INPUT=all.msh")?;
    writeln!(w, "*MATERIAL, NAME=PLATE")?;
    writeln!(w, "*ELASTIC")?;
    writeln!(w, "{}, {}", material.e, material.nu)?;
    writeln!(w, "*DENSITY")?;
    writeln!(w, "{}", material.rho)?;
    writeln!(w, "*SOLID SECTION, ELSET=Eall, MATERIAL=PLATE")?;
    writeln!(w, "*STEP, PERTURBATION")?;
    writeln!(w, "*FREQUENCY")?;
    writeln!(w, "{}", num_modes)?;
    writeln!(w, "*NODE PRINT, FREQUENCY=0")?;
    writeln!(w, "*EL PRINT, FREQUENCY=0")?;
    writeln!(w, "*END STEP")
}

/// Extract the cycles-per-time column of the eigenvalue table in a `.dat` file.
///
/// Rows look like `MODE  EIGENVALUE  OMEGA(rad)  FREQ(cycles)  IMAG`; the
/// table ends at the first row that does not start with a mode number.
pub fn parse_dat(text: &str) -> Result<Vec<f64>, SolverError> {
    let mut lines = text.lines().skip_while(|line| !line.contains(EIGENVALUE_HEADER));
    if lines.next().is_none() {
        return Err(SolverError::MalformedOutput(
            "no eigenvalue table".to_string(),
        ));
    }

    let mut frequencies = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let is_row = fields.len() >= 4 && fields[0].parse::<usize>().is_ok();
        if !is_row {
            if frequencies.is_empty() {
                continue;
            }
            break;
        }
        let freq = fields[3].parse::<f64>().map_err(|_| {
            SolverError::MalformedOutput(format!("bad frequency in row: {}", line.trim()))
        })?;
        frequencies.push(freq);
    }

    if frequencies.is_empty() {
        return Err(SolverError::MalformedOutput(
            "eigenvalue table is empty".to_string(),
        ));
    }
    Ok(frequencies)
}

const ADJECTIVES: &[&str] = &[
    "amber", "brisk", "copper", "dusky", "eager", "frosty", "gentle", "hollow", "ivory", "jolly",
    "keen", "lunar", "mellow", "nimble", "opal", "quiet", "rustic", "silver", "tawny", "velvet",
];

const NOUNS: &[&str] = &[
    "anvil", "bell", "chime", "drum", "echo", "flute", "gong", "harp", "lyre", "marimba", "oboe",
    "piano", "reed", "sitar", "tabla", "viola",
];

/// Human-readable run name such as `amber-gong-3fa2`.
pub fn unique_run_name<R: Rng>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("plain");
    let noun = NOUNS.choose(rng).copied().unwrap_or("plate");
    format!("{}-{}-{:04x}", adjective, noun, rng.gen_range(0..=0xffffu32))
}
