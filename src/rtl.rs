//! RTL simulator boundary
//!
//! The simulator is an opaque child process: it reads `program.hex`
//! from its working directory and announces the final architectural
//! state on stdout as lines of the form `REGDUMP x<n> <hex>`, together
//! with the advisory tokens `*** PASS ***` and `*** TIMEOUT ***`. This
//! module owns spawning, the wall-clock timeout, draining stdout
//! before the child is reaped, and parsing the dump. Everything that
//! can go wrong is an [`RtlError`] for the harness to report as a test
//! outcome; nothing here panics on simulator misbehaviour.

use itertools::Itertools;
use log::debug;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

pub const REGDUMP_PREFIX: &str = "REGDUMP";
pub const PASS_TOKEN: &str = "*** PASS ***";
pub const TIMEOUT_TOKEN: &str = "*** TIMEOUT ***";

/// Default wall-clock budget for one simulator invocation
pub const DEFAULT_SIM_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum RtlError {
    #[error("failed to spawn simulator '{path}': {source}")]
    SpawnFailed { path: PathBuf, source: io::Error },
    #[error("simulator did not finish within {0:?}")]
    WallClockTimeout(Duration),
    #[error("simulator exited with {0}")]
    SimulatorFailed(std::process::ExitStatus),
    #[error("malformed REGDUMP line '{0}'")]
    MalformedRegdump(String),
    #[error("register dump is missing x{0}")]
    MissingRegister(usize),
    #[error("simulator I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Everything the simulator reported about one run
#[derive(Debug, Clone)]
pub struct SimResult {
    /// Final values of x0..x31
    pub regs: [u32; 32],
    /// The simulator printed its advisory pass token
    pub reported_pass: bool,
    /// The simulator printed its advisory timeout token
    pub reported_timeout: bool,
}

/// Run the simulator in workdir (where the caller has already written
/// program.hex) and parse its register dump.
///
/// The child's stdout is drained by a separate thread and fully
/// consumed before the child is reaped; if the wall-clock budget
/// expires the child is killed and reaped before returning.
pub fn run_simulator(sim: &Path, workdir: &Path, timeout: Duration) -> Result<SimResult, RtlError> {
    let mut child = Command::new(sim)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| RtlError::SpawnFailed {
            path: sim.to_path_buf(),
            source,
        })?;

    let mut pipe = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "simulator stdout was not captured"))?;
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut captured = String::new();
        let result = pipe.read_to_string(&mut captured).map(|_| captured);
        let _ = tx.send(result);
    });

    let stdout = match rx.recv_timeout(timeout) {
        Ok(Ok(stdout)) => stdout,
        Ok(Err(e)) => {
            let _ = child.wait();
            return Err(e.into());
        }
        Err(_) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RtlError::WallClockTimeout(timeout));
        }
    };

    let status = child.wait()?;
    debug!("simulator exited with {status}, {} bytes of stdout", stdout.len());
    if !status.success() {
        return Err(RtlError::SimulatorFailed(status));
    }
    parse_sim_output(&stdout)
}

/// Parse simulator stdout: REGDUMP lines plus the advisory tokens.
/// Register values are hexadecimal with or without a 0x prefix.
pub fn parse_sim_output(stdout: &str) -> Result<SimResult, RtlError> {
    let mut regs: [Option<u32>; 32] = [None; 32];
    for line in stdout.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix(REGDUMP_PREFIX) else {
            continue;
        };
        let (index, value) = parse_regdump(rest)
            .ok_or_else(|| RtlError::MalformedRegdump(line.to_string()))?;
        regs[index] = Some(value);
    }

    let mut dump = [0u32; 32];
    for (index, reg) in regs.iter().enumerate() {
        dump[index] = reg.ok_or(RtlError::MissingRegister(index))?;
    }
    Ok(SimResult {
        regs: dump,
        reported_pass: stdout.contains(PASS_TOKEN),
        reported_timeout: stdout.contains(TIMEOUT_TOKEN),
    })
}

/// Parse the "x<n> <hex>" tail of a REGDUMP line
fn parse_regdump(rest: &str) -> Option<(usize, u32)> {
    let (reg, value) = rest.split_whitespace().collect_tuple()?;
    let index: usize = reg.strip_prefix('x')?.parse().ok()?;
    if index >= 32 {
        return None;
    }
    let digits = value.strip_prefix("0x").unwrap_or(value);
    let value = u32::from_str_radix(digits, 16).ok()?;
    Some((index, value))
}
