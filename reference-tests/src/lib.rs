//! Reference test framework for droplet impact runs
//!
//! A reference test runs a complete simulation through the orchestrator into
//! a throwaway directory, then validates the artifacts it left behind: the
//! step log, the movie frames and the seeded interface.

#[cfg(test)]
mod tests;

use orchestrator::config::SimulationConfig;
use orchestrator::output::{FRAME_INDEX_WIDTH, LOG_FILE_NAME};
use orchestrator::{create_simulation, RunSummary};
use std::fs;
use std::path::Path;

/// Expected result criteria for a reference test
#[derive(Debug, Clone, Default)]
pub struct ExpectedResult {
    /// Minimum number of frame files
    pub frame_count: Option<FrameCountCheck>,
    /// Time on the last step log line
    pub final_time: Option<FinalTimeCheck>,
    /// Step log lines in increasing (iteration, time) order
    pub log_order: bool,
    /// Lexicographic and numeric frame order coincide
    pub frame_order: bool,
    /// Seeded liquid area against the analytic circle
    pub initial_area: Option<InitialAreaCheck>,
}

/// Check the number of frame files written
#[derive(Debug, Clone)]
pub struct FrameCountCheck {
    /// Fewest acceptable frames
    pub min_frames: usize,
}

/// Check the time of the last log line
#[derive(Debug, Clone)]
pub struct FinalTimeCheck {
    /// Earliest acceptable final time (s)
    pub min_time: f64,
}

/// Check the seeded area `sum(f * dA)` against `pi (D/2)^2`
#[derive(Debug, Clone)]
pub struct InitialAreaCheck {
    /// Relative tolerance (0.0 to 1.0)
    pub tolerance: f64,
}

/// Result of running a reference test
#[derive(Debug)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Whether test passed
    pub passed: bool,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Run summary reported by the driver
    pub summary: RunSummary,
}

/// Result of an individual validation check
#[derive(Debug)]
pub struct CheckResult {
    /// Check name
    pub name: String,
    /// Whether check passed
    pub passed: bool,
    /// Details, or the reason for failure
    pub message: Option<String>,
}

impl CheckResult {
    fn pass(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            message: Some(message),
        }
    }

    fn fail(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            message: Some(message),
        }
    }
}

/// A reference test case
pub struct ReferenceTest {
    /// Test name
    pub name: String,
    /// Run configuration; its output root is replaced by a temporary directory
    pub config: SimulationConfig,
    /// Expected results to validate
    pub expected: ExpectedResult,
}

impl ReferenceTest {
    /// Run the reference test and return results
    pub fn run(&self) -> Result<TestResult, Box<dyn std::error::Error>> {
        tracing::info!("Running reference test: {}", self.name);

        let output = tempfile::tempdir()?;
        let config = SimulationConfig {
            output_root: output.path().to_path_buf(),
            ..self.config.clone()
        };

        let mut runner = create_simulation(config)?;
        let summary = runner.run()?;
        tracing::info!(
            "Simulation complete: {} steps, {:.6}s simulated",
            summary.iterations,
            summary.final_time
        );

        let log = fs::read_to_string(summary.run_dir.join(LOG_FILE_NAME))?;
        let frames = frame_names(&summary.run_dir)?;

        // Validate results
        let mut checks = Vec::new();

        if let Some(ref check) = self.expected.frame_count {
            checks.push(validate_frame_count(&frames, check));
        }
        if let Some(ref check) = self.expected.final_time {
            checks.push(validate_final_time(&log, check));
        }
        if self.expected.log_order {
            checks.push(validate_log_order(&log));
        }
        if self.expected.frame_order {
            checks.push(validate_frame_order(&frames));
        }
        if let Some(ref check) = self.expected.initial_area {
            checks.push(validate_initial_area(&summary, check));
        }

        Ok(TestResult {
            name: self.name.clone(),
            passed: checks.iter().all(|c| c.passed),
            checks,
            summary,
        })
    }
}

/// PNG file names in `dir`, in directory order
fn frame_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.ends_with(".png") {
            names.push(name);
        }
    }
    Ok(names)
}

/// Parse `"<iteration> <time>"` lines
fn parse_log(log: &str) -> Result<Vec<(u64, f64)>, String> {
    log.lines()
        .enumerate()
        .map(|(n, line)| {
            let parsed = line
                .split_once(' ')
                .and_then(|(i, t)| Some((i.parse().ok()?, t.parse().ok()?)));
            parsed.ok_or_else(|| format!("line {}: malformed entry {:?}", n + 1, line))
        })
        .collect()
}

/// Validate that enough frames were written
fn validate_frame_count(frames: &[String], check: &FrameCountCheck) -> CheckResult {
    let name = "Frame Count";
    if frames.len() >= check.min_frames {
        CheckResult::pass(name, format!("{} frames (min {})", frames.len(), check.min_frames))
    } else {
        CheckResult::fail(
            name,
            format!("{} frames, expected at least {}", frames.len(), check.min_frames),
        )
    }
}

/// Validate the time on the last log line
fn validate_final_time(log: &str, check: &FinalTimeCheck) -> CheckResult {
    let name = "Final Time";
    let entries = match parse_log(log) {
        Ok(entries) => entries,
        Err(e) => return CheckResult::fail(name, e),
    };
    match entries.last() {
        // The log carries six significant digits
        Some(&(i, t)) if t >= check.min_time * (1.0 - 1e-6) => {
            CheckResult::pass(name, format!("last line: i = {}, t = {}", i, t))
        }
        Some(&(i, t)) => CheckResult::fail(
            name,
            format!("last line: i = {}, t = {} < {}", i, t, check.min_time),
        ),
        None => CheckResult::fail(name, "log is empty".to_string()),
    }
}

/// Validate strictly increasing iterations and non-decreasing times
fn validate_log_order(log: &str) -> CheckResult {
    let name = "Log Order";
    let entries = match parse_log(log) {
        Ok(entries) => entries,
        Err(e) => return CheckResult::fail(name, e),
    };
    for (n, pair) in entries.windows(2).enumerate() {
        let ((i0, t0), (i1, t1)) = (pair[0], pair[1]);
        if i1 <= i0 || t1 < t0 {
            return CheckResult::fail(
                name,
                format!(
                    "lines {} and {} out of order: ({}, {}) then ({}, {})",
                    n + 1,
                    n + 2,
                    i0,
                    t0,
                    i1,
                    t1
                ),
            );
        }
    }
    CheckResult::pass(name, format!("{} lines in order", entries.len()))
}

/// Validate that sorting frame names as strings sorts them by iteration
fn validate_frame_order(frames: &[String]) -> CheckResult {
    let name = "Frame Order";
    let mut sorted = frames.to_vec();
    sorted.sort();

    let mut previous: Option<u64> = None;
    for frame in &sorted {
        let index = frame
            .get(..FRAME_INDEX_WIDTH)
            .and_then(|prefix| prefix.parse::<u64>().ok());
        let Some(index) = index else {
            return CheckResult::fail(name, format!("bad frame name {:?}", frame));
        };
        if previous.is_some_and(|p| index <= p) {
            return CheckResult::fail(
                name,
                format!("{:?} sorts after iteration {:?}", frame, previous),
            );
        }
        previous = Some(index);
    }
    CheckResult::pass(name, format!("{} frames in iteration order", sorted.len()))
}

/// Validate the seeded liquid area
fn validate_initial_area(summary: &RunSummary, check: &InitialAreaCheck) -> CheckResult {
    let name = "Initial Area";
    let error = summary.seed.area_error();
    let message = format!(
        "Expected: {:.4e} m^2, Got: {:.4e} m^2 (error: {:.2}%)",
        summary.seed.exact_area,
        summary.seed.liquid_area,
        error * 100.0
    );
    if error <= check.tolerance {
        CheckResult::pass(name, message)
    } else {
        CheckResult::fail(
            name,
            format!("{}, tolerance: {:.2}%", message, check.tolerance * 100.0),
        )
    }
}

impl TestResult {
    /// Print a summary of the test result
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("Test: {}", self.name);
        println!("{}", "=".repeat(80));
        println!("Status: {}", if self.passed { "PASSED" } else { "FAILED" });
        println!("Iterations: {}", self.summary.iterations);
        println!("Simulated time: {:.6} s", self.summary.final_time);
        println!(
            "Frames: {} written, {} failed",
            self.summary.frames_written, self.summary.frames_failed
        );
        println!(
            "Step size: {:.3e} .. {:.3e} s",
            self.summary.min_dt, self.summary.max_dt
        );
        println!("Final cells: {}", self.summary.cells);
        for (level, count) in &self.summary.levels {
            println!("  level {:>2}: {}", level, count);
        }
        println!("\nValidation Checks:");
        for check in &self.checks {
            let status = if check.passed { "PASS" } else { "FAIL" };
            print!("  [{}] {}", status, check.name);
            if let Some(ref msg) = check.message {
                print!(" - {}", msg);
            }
            println!();
        }
        println!("{}", "=".repeat(80));
    }
}
