//! Diagnostics & artifact writer
//!
//! Owns the run directory and everything written into it: the append-only
//! step log and the sequence of movie frames. Every write is best-effort; a
//! failure is logged as a warning, counted, and the run carries on.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use kernel::{HeatmapOptions, QuadGrid, RenderError, Renderer, RunClock};

use crate::config::{DerivedNumbers, FrameSettings, SimulationConfig};

/// Digits of the zero-padded iteration prefix in frame names.
pub const FRAME_INDEX_WIDTH: usize = 8;

/// Name of the step log inside the run directory.
pub const LOG_FILE_NAME: &str = "log.log";

/// Format a number like C's `%g`: six significant digits, trailing zeros
/// removed, scientific notation when the exponent is below -4 or at least 6.
pub fn format_g(value: f64) -> String {
    const PRECISION: i32 = 6;

    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    // Exponent after rounding to the target precision
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exponent < -4 || exponent >= PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            strip_trailing_zeros(mantissa),
            sign,
            exponent.abs()
        )
    } else {
        let decimals = (PRECISION - 1 - exponent) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Iteration number zero-padded to [`FRAME_INDEX_WIDTH`] digits, so that
/// lexicographic and numeric order agree below `10^8`.
pub fn frame_index(iteration: u64) -> String {
    format!("{:0width$}", iteration, width = FRAME_INDEX_WIDTH)
}

/// `<iter8>_t=<time>.png`
pub fn frame_file_name(iteration: u64, time: f64) -> String {
    format!("{}_t={}.png", frame_index(iteration), format_g(time))
}

/// `v=<U0>__D=<D>`
pub fn run_directory_name(impact_velocity: f64, drop_diameter: f64) -> String {
    format!(
        "v={}__D={}",
        format_g(impact_velocity),
        format_g(drop_diameter)
    )
}

/// One step log line, `"<iteration> <time>\n"`
pub fn log_line(clock: RunClock) -> String {
    format!("{} {}\n", clock.iteration, format_g(clock.time))
}

/// Draw one movie frame and save it to `path`: interface contour of `f`,
/// linear heatmap of `u.y`, domain box.
pub fn render_frame(
    renderer: &mut dyn Renderer,
    grid: &QuadGrid,
    settings: &FrameSettings,
    path: &Path,
) -> Result<(), RenderError> {
    renderer.set_view(settings.view());
    renderer.clear();
    renderer.draw_interface(grid, "f")?;
    renderer.draw_scalar_heatmap(
        grid,
        "u.y",
        HeatmapOptions {
            linear: true,
            spread: settings.spread,
        },
    )?;
    renderer.draw_box(grid);
    renderer.save(path)
}

/// Writer for the step log and movie frames of one run
#[derive(Debug)]
pub struct ArtifactWriter {
    run_dir: PathBuf,
    log_path: PathBuf,
    frame: FrameSettings,
    log_lines: u64,
    log_failures: u64,
    frames_written: u64,
    frames_failed: u64,
}

impl ArtifactWriter {
    /// Create the run directory under `config.output_root` and truncate its
    /// step log. Failures are logged; later writes will fail the same way
    /// and be counted.
    pub fn prepare(config: &SimulationConfig) -> Self {
        let run_dir = config.output_root.join(run_directory_name(
            config.impact_velocity,
            config.drop_diameter,
        ));
        let log_path = run_dir.join(LOG_FILE_NAME);

        if let Err(e) = fs::create_dir_all(&run_dir) {
            tracing::warn!("Failed to create run directory {}: {}", run_dir.display(), e);
        } else if let Err(e) = fs::File::create(&log_path) {
            tracing::warn!("Failed to truncate {}: {}", log_path.display(), e);
        } else {
            tracing::info!("Writing artifacts to {}", run_dir.display());
        }

        Self {
            run_dir,
            log_path,
            frame: config.frame,
            log_lines: 0,
            log_failures: 0,
            frames_written: 0,
            frames_failed: 0,
        }
    }

    /// Run directory
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Step log path
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Append `"<i> <t>"` to the step log, opening and closing the file.
    pub fn append_step(&mut self, clock: RunClock) -> bool {
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .and_then(|mut file| file.write_all(log_line(clock).as_bytes()));
        match result {
            Ok(()) => {
                self.log_lines += 1;
                true
            }
            Err(e) => {
                self.log_failures += 1;
                tracing::warn!(
                    "Failed to append to {} at i = {}: {}",
                    self.log_path.display(),
                    clock.iteration,
                    e
                );
                false
            }
        }
    }

    /// Render and save the frame for `clock`. Returns the path on success.
    pub fn write_frame(
        &mut self,
        renderer: &mut dyn Renderer,
        grid: &QuadGrid,
        clock: RunClock,
    ) -> Option<PathBuf> {
        let path = self
            .run_dir
            .join(frame_file_name(clock.iteration, clock.time));
        match render_frame(renderer, grid, &self.frame, &path) {
            Ok(()) => {
                self.frames_written += 1;
                tracing::debug!("Frame saved: {}", path.display());
                Some(path)
            }
            Err(e) => {
                self.frames_failed += 1;
                tracing::warn!("Failed to write frame {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Print the Re/We banner to stdout and the tracing log.
    ///
    /// The banner is not appended to the step log, which holds only
    /// `<iteration> <time>` lines so that its last line is the final time.
    pub fn announce(&self, numbers: &DerivedNumbers) {
        let banner = numbers.banner();
        println!("{}", banner);
        tracing::info!("{}", banner);
    }

    /// Step log lines written
    pub fn log_lines(&self) -> u64 {
        self.log_lines
    }

    /// Step log appends that failed
    pub fn log_failures(&self) -> u64 {
        self.log_failures
    }

    /// Frames saved
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Frames that failed to render or save
    pub fn frames_failed(&self) -> u64 {
        self.frames_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::{RasterRenderer, ViewParams};

    fn clock(iteration: u64, time: f64) -> RunClock {
        RunClock { iteration, time }
    }

    #[test]
    fn test_format_g_matches_printf() {
        let cases = [
            (0.0, "0"),
            (1.0, "1"),
            (0.03, "0.03"),
            (0.001, "0.001"),
            (1e-4, "0.0001"),
            (1e-5, "1e-05"),
            (2.5e-5, "2.5e-05"),
            (0.0123456789, "0.0123457"),
            (123456.0, "123456"),
            (1234567.0, "1.23457e+06"),
            (100000.0, "100000"),
            (1e6, "1e+06"),
            (-0.5, "-0.5"),
            (9.9999996e-5, "0.0001"),
            (0.00299999999999, "0.003"),
        ];
        for (value, expected) in cases {
            assert_eq!(format_g(value), expected, "format_g({value:e})");
        }
    }

    #[test]
    fn test_frame_names() {
        assert_eq!(frame_index(0), "00000000");
        assert_eq!(frame_index(42), "00000042");
        assert_eq!(frame_index(99_999_999), "99999999");
        assert_eq!(frame_file_name(42, 0.0042), "00000042_t=0.0042.png");
        assert_eq!(frame_file_name(0, 0.0), "00000000_t=0.png");
    }

    #[test]
    fn test_frame_names_sort_numerically() {
        let iterations = [0_u64, 7, 42, 99, 100, 1_000, 12_345, 9_999_999];
        let mut names: Vec<String> = iterations
            .iter()
            .map(|&i| frame_file_name(i, i as f64 * 1e-4))
            .collect();
        names.sort();
        let sorted: Vec<u64> = names
            .iter()
            .map(|n| n[..FRAME_INDEX_WIDTH].parse().unwrap())
            .collect();
        assert_eq!(sorted, iterations);
    }

    #[test]
    fn test_run_directory_and_log_line() {
        assert_eq!(run_directory_name(1.0, 1e-3), "v=1__D=0.001");
        assert_eq!(run_directory_name(2.5, 2e-5), "v=2.5__D=2e-05");
        assert_eq!(log_line(clock(300, 0.03)), "300 0.03\n");
        assert_eq!(log_line(clock(0, 0.0)), "0 0\n");
    }

    #[test]
    fn test_writer_truncates_and_appends_log() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimulationConfig {
            output_root: dir.path().to_path_buf(),
            ..SimulationConfig::default()
        };

        let run_dir = dir.path().join("v=1__D=0.001");
        fs::create_dir_all(&run_dir).unwrap();
        fs::write(run_dir.join(LOG_FILE_NAME), "stale\n").unwrap();

        let mut writer = ArtifactWriter::prepare(&config);
        assert_eq!(writer.run_dir(), run_dir.as_path());
        assert!(writer.append_step(clock(0, 0.0)));
        assert!(writer.append_step(clock(1, 1e-4)));

        let log = fs::read_to_string(writer.log_path()).unwrap();
        assert_eq!(log, "0 0\n1 0.0001\n");
        assert_eq!(writer.log_lines(), 2);
    }

    #[test]
    fn test_log_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the output root should be a directory
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "").unwrap();
        let config = SimulationConfig {
            output_root: blocker,
            ..SimulationConfig::default()
        };

        let mut writer = ArtifactWriter::prepare(&config);
        assert!(!writer.append_step(clock(0, 0.0)));
        assert_eq!(writer.log_failures(), 1);

        let mut renderer = RasterRenderer::new(ViewParams::default());
        let grid = QuadGrid::new([0.0, 0.0], 1.0, 2);
        assert!(writer.write_frame(&mut renderer, &grid, clock(0, 0.0)).is_none());
        assert_eq!(writer.frames_failed(), 1);
    }
}
