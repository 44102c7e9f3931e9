use crate::StrError;
use russell_lab::Vector;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Holds a snapshot of the transient state (solution and derivative at a time)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransientState {
    /// Time
    pub t: f64,

    /// Time step size
    pub h: f64,

    /// Solution vector (velocity block followed by pressure block)
    pub yy: Vector,

    /// Time derivative of the solution vector
    pub yy_dot: Vector,
}

impl TransientState {
    /// Reads a JSON file containing the state data
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn read_json<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let input = File::open(path).map_err(|_| "cannot open file")?;
        let buffered = BufReader::new(input);
        let state = serde_json::from_reader(buffered).map_err(|_| "cannot parse JSON file")?;
        Ok(state)
    }

    /// Writes a JSON file with the state data
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    pub fn write_json<P>(&self, full_path: &P) -> Result<(), StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).map_err(|_| "cannot create directory")?;
        }
        let mut file = File::create(&path).map_err(|_| "cannot create file")?;
        serde_json::to_writer(&mut file, &self).map_err(|_| "cannot write file")?;
        Ok(())
    }
}

/// Defines the interface consumed to report results after accepted steps
pub trait OutputSink {
    /// Writes the solution and derivative at a step
    fn write(&mut self, step: usize, state: &TransientState) -> Result<(), StrError>;

    /// Records the error of the solution against the exact one
    fn record_error(&mut self, t: f64, error_l2: f64) -> Result<(), StrError>;
}

/// Writes transient states as JSON files under a directory
pub struct JsonOutput {
    /// Output directory
    pub dir: PathBuf,

    /// File name prefix
    pub prefix: String,

    /// Recorded (time, L2 error) pairs
    pub errors: Vec<(f64, f64)>,
}

impl JsonOutput {
    /// Allocates a new instance
    pub fn new(dir: &str, prefix: &str) -> Self {
        JsonOutput {
            dir: PathBuf::from(dir),
            prefix: prefix.to_string(),
            errors: Vec::new(),
        }
    }
}

impl OutputSink for JsonOutput {
    fn write(&mut self, step: usize, state: &TransientState) -> Result<(), StrError> {
        let path = self.dir.join(format!("{}-{:0>8}.json", self.prefix, step));
        state.write_json(&path)
    }

    fn record_error(&mut self, t: f64, error_l2: f64) -> Result<(), StrError> {
        self.errors.push((t, error_l2));
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
