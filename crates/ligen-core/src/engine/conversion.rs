use super::config::ConversionConfig;
use super::executor::ParallelExecutor;
use super::progress::{Progress, ProgressReporter};
use crate::core::models::ligand::LigandRecord;
use crate::core::models::population::Population;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, instrument, warn};

pub const SUBMISSION_DIR: &str = "conversion_submission_files";
pub const SDF_DIR: &str = "3D_SDFs";
pub const LOG_DIR: &str = "3D_SDFs/log";
pub const PDB_DIR: &str = "PDBs";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("'{program}' did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("'{program}' exited with {status}")]
    Failed { program: String, status: ExitStatus },
    #[error("Expected output {0} was not produced")]
    NoOutput(PathBuf),
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Produces 3-D structure files for an accepted ligand.
pub trait StructureConverter: Send + Sync {
    /// Converts one record, writing under `gen_dir`, and returns the files produced.
    fn convert(
        &self,
        record: &LigandRecord,
        gen_dir: &Path,
        timeout: Duration,
    ) -> Result<Vec<PathBuf>, ConversionError>;
}

/// One external command invocation. `{input}` and `{output}` in the arguments are
/// replaced by the step's input and output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionStep {
    pub args: Vec<String>,
    pub output_dir: String,
    pub output_extension: String,
}

impl ConversionStep {
    pub fn new(args: &[&str], output_dir: &str, output_extension: &str) -> Self {
        Self {
            args: args.iter().map(|a| a.to_string()).collect(),
            output_dir: output_dir.to_string(),
            output_extension: output_extension.to_string(),
        }
    }
}

/// Runs an external program once per step, feeding each step the previous output.
///
/// The default steps generate 3-D coordinates from SMILES into `3D_SDFs/` and then
/// convert them to PDB in `PDBs/`, the way Open Babel is usually driven.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    steps: Vec<ConversionStep>,
}

impl CommandConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_steps(
            program,
            vec![
                ConversionStep::new(
                    &["-ismi", "{input}", "-osdf", "-O", "{output}", "--gen3d"],
                    SDF_DIR,
                    "sdf",
                ),
                ConversionStep::new(&["-isdf", "{input}", "-opdb", "-O", "{output}"], PDB_DIR, "pdb"),
            ],
        )
    }

    pub fn with_steps(program: impl Into<String>, steps: Vec<ConversionStep>) -> Self {
        Self {
            program: program.into(),
            steps,
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Self {
        Self::new(config.program.clone())
    }

    /// Runs one step, killing it once `deadline` passes. `timeout` is only reported.
    fn run_step(
        &self,
        args: &[String],
        log_path: &Path,
        deadline: Option<Instant>,
        timeout: Duration,
    ) -> Result<(), ConversionError> {
        let expired = || deadline.is_some_and(|d| Instant::now() >= d);
        if expired() {
            return Err(ConversionError::Timeout {
                program: self.program.clone(),
                timeout,
            });
        }
        let log = File::options()
            .create(true)
            .append(true)
            .open(log_path)
            .map_err(|e| io_error(log_path, e))?;
        let log_err = log.try_clone().map_err(|e| io_error(log_path, e))?;

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .spawn()
            .map_err(|source| ConversionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        loop {
            let polled = child.try_wait().map_err(|e| io_error(log_path, e))?;
            if let Some(status) = polled {
                if status.success() {
                    return Ok(());
                }
                return Err(ConversionError::Failed {
                    program: self.program.clone(),
                    status,
                });
            }
            if expired() {
                // The process may exit between the poll and the kill.
                let _ = child.kill();
                let _ = child.wait();
                return Err(ConversionError::Timeout {
                    program: self.program.clone(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl StructureConverter for CommandConverter {
    fn convert(
        &self,
        record: &LigandRecord,
        gen_dir: &Path,
        timeout: Duration,
    ) -> Result<Vec<PathBuf>, ConversionError> {
        let stem = file_stem_for(record.name());
        for dir in [SUBMISSION_DIR, LOG_DIR] {
            let path = gen_dir.join(dir);
            fs::create_dir_all(&path).map_err(|e| io_error(&path, e))?;
        }
        let mut input = gen_dir.join(SUBMISSION_DIR).join(format!("{stem}.smi"));
        fs::write(&input, format!("{}\t{}\n", record.smiles(), record.name()))
            .map_err(|e| io_error(&input, e))?;
        let log_path = gen_dir.join(LOG_DIR).join(format!("{stem}.log"));

        // One budget covers every step of this ligand.
        let deadline = Instant::now().checked_add(timeout);
        let mut outputs = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let out_dir = gen_dir.join(&step.output_dir);
            fs::create_dir_all(&out_dir).map_err(|e| io_error(&out_dir, e))?;
            let output = out_dir.join(format!("{stem}.{}", step.output_extension));
            let args: Vec<String> = step
                .args
                .iter()
                .map(|arg| {
                    arg.replace("{input}", &input.to_string_lossy())
                        .replace("{output}", &output.to_string_lossy())
                })
                .collect();
            self.run_step(&args, &log_path, deadline, timeout)?;
            if !output.is_file() {
                return Err(ConversionError::NoOutput(output));
            }
            outputs.push(output.clone());
            input = output;
        }
        Ok(outputs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    pub converted: usize,
    pub failed: usize,
}

/// Converts every ligand of a finished generation. Failures are logged per ligand and
/// never affect the population.
#[instrument(skip_all, name = "structure_conversion")]
pub fn convert_population<E: ParallelExecutor>(
    executor: &E,
    converter: &dyn StructureConverter,
    population: &Population,
    gen_dir: &Path,
    timeout: Duration,
    reporter: &ProgressReporter,
) -> ConversionSummary {
    reporter.report(Progress::TaskStart {
        total_steps: population.len() as u64,
    });
    let results = executor.run(population.iter().collect(), |record: &LigandRecord| {
        converter.convert(record, gen_dir, timeout)
    });
    let mut summary = ConversionSummary::default();
    for (record, result) in population.iter().zip(results) {
        match result {
            Ok(Ok(_)) => summary.converted += 1,
            Ok(Err(e)) => {
                warn!(ligand = record.name(), error = %e, "3-D conversion failed");
                summary.failed += 1;
            }
            Err(e) => {
                warn!(ligand = record.name(), error = %e, "3-D conversion panicked");
                summary.failed += 1;
            }
        }
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    info!(
        converted = summary.converted,
        failed = summary.failed,
        "Structure conversion finished"
    );
    summary
}

/// A file-system safe stem for a ligand name.
fn file_stem_for(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn io_error(path: &Path, source: std::io::Error) -> ConversionError {
    ConversionError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::smiles::parse_smiles;
    use crate::engine::executor::SerialExecutor;
    use tempfile::tempdir;

    fn record(name: &str) -> LigandRecord {
        LigandRecord::seed(name, parse_smiles("CCO").unwrap())
    }

    #[test]
    fn file_stems_are_sanitized() {
        assert_eq!(file_stem_for("Gen_1_Cross_2"), "Gen_1_Cross_2");
        assert_eq!(file_stem_for("a/b c:d"), "a_b_c_d");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let dir = tempdir().unwrap();
        let converter = CommandConverter::new("ligen-no-such-converter-program");
        let err = converter
            .convert(&record("x"), dir.path(), Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, ConversionError::Spawn { .. }));
        assert!(dir.path().join(SUBMISSION_DIR).join("x.smi").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn slow_program_is_killed_at_the_timeout() {
        let dir = tempdir().unwrap();
        let converter =
            CommandConverter::with_steps("sleep", vec![ConversionStep::new(&["5"], SDF_DIR, "sdf")]);
        let started = Instant::now();
        let err = converter
            .convert(&record("slow"), dir.path(), Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(err, ConversionError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_covers_all_steps_of_one_ligand() {
        let dir = tempdir().unwrap();
        let converter = CommandConverter::with_steps(
            "sh",
            vec![
                ConversionStep::new(&["-c", "sleep 0.4; cp {input} {output}"], SDF_DIR, "sdf"),
                ConversionStep::new(&["-c", "sleep 0.4; cp {input} {output}"], PDB_DIR, "pdb"),
            ],
        );
        let started = Instant::now();
        let err = converter
            .convert(&record("two_steps"), dir.path(), Duration::from_millis(600))
            .unwrap_err();
        assert!(matches!(err, ConversionError::Timeout { .. }));
        assert!(dir.path().join(SDF_DIR).join("two_steps.sdf").is_file());
        assert!(!dir.path().join(PDB_DIR).join("two_steps.pdb").exists());
        assert!(started.elapsed() < Duration::from_millis(790));
    }

    #[cfg(unix)]
    #[test]
    fn steps_chain_outputs_and_failures_do_not_abort_the_batch() {
        let dir = tempdir().unwrap();
        let converter = CommandConverter::with_steps(
            "sh",
            vec![
                ConversionStep::new(&["-c", "cp {input} {output}"], SDF_DIR, "sdf"),
                ConversionStep::new(&["-c", "cp {input} {output}"], PDB_DIR, "pdb"),
            ],
        );
        let outputs = converter
            .convert(&record("Gen_0_Cross_1"), dir.path(), Duration::from_secs(10))
            .unwrap();
        assert_eq!(
            outputs,
            vec![
                dir.path().join(SDF_DIR).join("Gen_0_Cross_1.sdf"),
                dir.path().join(PDB_DIR).join("Gen_0_Cross_1.pdb"),
            ]
        );
        assert!(fs::read_to_string(&outputs[1]).unwrap().starts_with("CCO\t"));

        let failing =
            CommandConverter::with_steps("sh", vec![ConversionStep::new(&["-c", "exit 3"], SDF_DIR, "sdf")]);
        let mut population = Population::new();
        population.try_push(record("a"));
        population.try_push(LigandRecord::seed("b", parse_smiles("CCN").unwrap()));
        let summary = convert_population(
            &SerialExecutor,
            &failing,
            &population,
            dir.path(),
            Duration::from_secs(10),
            &ProgressReporter::new(),
        );
        assert_eq!(
            summary,
            ConversionSummary {
                converted: 0,
                failed: 2
            }
        );
    }
}
