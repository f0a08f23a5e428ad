//! Invocation of the external table generator.
//!
//! The generator reads the number of cards, attributes and tables from
//! standard input, followed by a confirmation answer, and writes its report
//! to a fixed file relative to its working directory.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use crate::{
    error::Error,
    report::{parse_report, SimulationReport, AVERAGE_MARKER, SET_COUNTS_MARKER},
};

/// File the generator writes its report to.
pub const DEFAULT_REPORT_FILE: &str = "data.txt";
/// Flag selecting the generator's optimized SET search.
pub const OPTIMIZED_FLAG: &str = "-o";
/// Answer to the generator's closing question.
const CONFIRMATION: &str = "n";
/// Default upper bound on waiting for the report after the generator exited.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Parameters of one generator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorRequest {
    /// Cards per table
    pub num_cards: usize,
    /// Attributes per card
    pub num_attributes: usize,
    /// Number of tables to generate
    pub num_tables: usize,
}

impl GeneratorRequest {
    /// Constructor.
    pub fn new(num_cards: usize, num_attributes: usize, num_tables: usize) -> Self {
        Self {
            num_cards,
            num_attributes,
            num_tables,
        }
    }

    /// Text sent to the generator's standard input.
    pub fn stdin_payload(&self) -> String {
        format!(
            "{}\n{}\n{}\n{CONFIRMATION}\n",
            self.num_cards, self.num_attributes, self.num_tables
        )
    }
}

/// Handle on the generator executable and where it leaves its report.
#[derive(Debug, Clone)]
pub struct Generator {
    /// Path of the executable
    executable: PathBuf,
    /// Working directory of the child; the current directory if unset
    working_directory: Option<PathBuf>,
    /// Report location relative to the working directory
    report_file: PathBuf,
    /// Pass [OPTIMIZED_FLAG]
    optimized: bool,
    /// How long to wait for a complete report after exit
    settle_timeout: Duration,
}

impl Generator {
    /// Generator at `executable` with default settings.
    pub fn new<P: Into<PathBuf>>(executable: P) -> Self {
        Self {
            executable: executable.into(),
            working_directory: None,
            report_file: PathBuf::from(DEFAULT_REPORT_FILE),
            optimized: true,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
        }
    }

    /// Run the generator in `directory`.
    pub fn working_directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.working_directory = Some(directory.into());
        self
    }

    /// Name of the report file written by the generator.
    pub fn report_file<P: Into<PathBuf>>(mut self, file: P) -> Self {
        self.report_file = file.into();
        self
    }

    /// Whether to request the optimized search.
    pub fn optimized(mut self, optimized: bool) -> Self {
        self.optimized = optimized;
        self
    }

    /// Upper bound on waiting for the report.
    pub fn settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    /// Path of the executable.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Where the report of a run is expected.
    pub fn report_path(&self) -> PathBuf {
        match &self.working_directory {
            Some(directory) => directory.join(&self.report_file),
            None => self.report_file.clone(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.executable);
        if self.optimized {
            command.arg(OPTIMIZED_FLAG);
        }
        if let Some(directory) = &self.working_directory {
            command.current_dir(directory);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    /// Run the generator and return the raw text of its report.
    pub fn run_raw(&self, request: GeneratorRequest) -> Result<String, Error> {
        let report_path = self.report_path();
        remove_stale_report(&report_path)?;

        log::debug!("Running {} for {request:?}", self.executable.display());
        let spawn_error = |error: std::io::Error| Error::GeneratorSpawn {
            error,
            executable: self.executable.clone(),
        };

        let mut child = self.command().spawn().map_err(spawn_error)?;
        if let Some(mut stdin) = child.stdin.take() {
            // A generator that exits early reports through its status instead.
            if let Err(error) = stdin.write_all(request.stdin_payload().as_bytes()) {
                if error.kind() != ErrorKind::BrokenPipe {
                    return Err(spawn_error(error));
                }
            }
        }
        let output = child.wait_with_output().map_err(spawn_error)?;

        if !output.status.success() {
            return Err(Error::GeneratorFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        log::trace!("{}", String::from_utf8_lossy(&output.stdout));

        wait_for_report(&report_path, self.settle_timeout)
    }

    /// Run the generator and parse its report.
    pub fn run(&self, request: GeneratorRequest) -> Result<SimulationReport, Error> {
        let text = self.run_raw(request)?;
        parse_report(&text)
    }
}

/// Delete a report left behind by an earlier run, so that it cannot be
/// mistaken for the result of the next one.
fn remove_stale_report(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path) {
        Ok(()) => {
            log::debug!("Removed previous report {}", path.display());
            Ok(())
        }
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(Error::IOWriting {
            error,
            filename: path.to_path_buf(),
        }),
    }
}

/// A report is complete once its summary section has been written.
fn is_complete(text: &str) -> bool {
    text.lines().any(|line| line.trim_end() == SET_COUNTS_MARKER)
        && text.lines().any(|line| line.starts_with(AVERAGE_MARKER))
}

/// Poll for a complete report at `path` until `timeout` expires.
fn wait_for_report(path: &Path, timeout: Duration) -> Result<String, Error> {
    let start = Instant::now();

    loop {
        match fs::read_to_string(path) {
            Ok(text) if is_complete(&text) => return Ok(text),
            Ok(_) => {}
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => {
                return Err(Error::IOReading {
                    error,
                    filename: path.to_path_buf(),
                })
            }
        }

        let waited = start.elapsed();
        if waited >= timeout {
            return Err(Error::ReportNotReady {
                path: path.to_path_buf(),
                waited,
            });
        }
        thread::sleep(POLL_INTERVAL.min(timeout - waited));
    }
}

#[cfg(test)]
mod test {
    use assert_fs::{prelude::*, TempDir};
    use test_log::test;

    use super::*;

    #[test]
    fn payload() {
        let request = GeneratorRequest::new(12, 4, 1000);
        assert_eq!(request.stdin_payload(), "12\n4\n1000\nn\n");
    }

    #[test]
    fn report_location() {
        let generator = Generator::new("./gen").working_directory("/tmp/run");
        assert_eq!(generator.report_path(), PathBuf::from("/tmp/run/data.txt"));

        let generator = Generator::new("./gen").report_file("Data.txt");
        assert_eq!(generator.report_path(), PathBuf::from("Data.txt"));
    }

    #[test]
    fn missing_report_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("data.txt");

        let result = wait_for_report(path.path(), Duration::from_millis(60));
        assert!(matches!(result, Err(Error::ReportNotReady { .. })));
    }

    #[test]
    fn incomplete_report_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("data.txt");
        path.write_str("# Parameters:\nNumber of cards: 3\n").unwrap();

        let result = wait_for_report(path.path(), Duration::from_millis(60));
        assert!(matches!(result, Err(Error::ReportNotReady { .. })));
    }

    #[test]
    fn complete_report_is_returned() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("data.txt");
        let text = "# Number of SETs in each Table\n\n1 2\n\n# Average number of SETs: 1.5\n";
        path.write_str(text).unwrap();

        assert_eq!(
            wait_for_report(path.path(), Duration::from_millis(60)).unwrap(),
            text
        );
    }

    #[test]
    fn stale_report_is_removed() {
        let dir = TempDir::new().unwrap();
        let path = dir.child("data.txt");
        path.write_str("old").unwrap();

        remove_stale_report(path.path()).unwrap();
        path.assert(predicates::path::missing());
        remove_stale_report(path.path()).unwrap();
    }
}
