//! Per-file jobs and batch bookkeeping.
//!
//! Each job reads one input, runs one backend operation and writes the result next to
//! the output directory. A failing job reports which file and which stage failed and
//! does not affect the rest of the batch.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use iblenv_core::{
    container, BrdfIntegrator, BrdfLut, Converter, Convolver, EncodeOptions, HdrImage,
    HdrLoadOptions, IblEnv, IblError, Resizer,
};
use thiserror::Error;

use crate::size::SizeSpec;

/// The step of a job that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Process,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => write!(f, "loading"),
            Self::Process => write!(f, "processing"),
            Self::Write => write!(f, "writing"),
        }
    }
}

/// A job failure with the file and stage it happened in.
#[derive(Error, Debug)]
#[error("{stage} {}: {source}", .path.display())]
pub struct JobError {
    pub path: PathBuf,
    pub stage: Stage,
    pub source: IblError,
}

impl JobError {
    fn at(path: &Path, stage: Stage) -> impl FnOnce(IblError) -> Self + '_ {
        move |source| Self {
            path: path.to_path_buf(),
            stage,
            source,
        }
    }
}

/// What a successful job wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub output: PathBuf,
    pub base_size: u32,
    pub levels: u32,
}

impl JobReport {
    fn new(output: PathBuf, env: &IblEnv) -> Self {
        Self {
            output,
            base_size: env.base_size(),
            levels: env.levels(),
        }
    }
}

/// Where results are written: `<dir>/<input stem><suffix><ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNaming {
    pub dir: PathBuf,
    pub suffix: String,
    pub ext: String,
}

impl OutputNaming {
    pub fn new(dir: impl Into<PathBuf>, suffix: impl Into<String>, ext: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.into(),
            ext: ext.into(),
        }
    }

    /// The output path for `input`.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        self.dir.join(format!("{stem}{}{}", self.suffix, self.ext))
    }
}

fn write(
    input: &Path,
    output: &OutputNaming,
    env: &IblEnv,
    encode: &EncodeOptions,
) -> Result<JobReport, JobError> {
    let path = output.output_path(input);
    log::info!("writing {}", path.display());
    container::encode_file(&path, env, encode).map_err(JobError::at(input, Stage::Write))?;
    Ok(JobReport::new(path, env))
}

fn load_env(input: &Path) -> Result<IblEnv, JobError> {
    container::decode_file(input).map_err(JobError::at(input, Stage::Load))
}

/// Converts an equirectangular image file; `size` is relative to the image width.
///
/// # Errors
///
/// Returns a [`JobError`] naming the failed stage.
pub fn convert_file(
    input: &Path,
    converter: &dyn Converter,
    size: SizeSpec,
    load: &HdrLoadOptions,
    output: &OutputNaming,
    encode: &EncodeOptions,
) -> Result<JobReport, JobError> {
    let image = HdrImage::load(input, load).map_err(JobError::at(input, Stage::Load))?;

    let size = size.resolve(image.width());
    log::info!("converting to {size}x{size}x6 cube map");
    let env = converter
        .convert(&image, size)
        .map_err(JobError::at(input, Stage::Process))?;

    write(input, output, &env, encode)
}

/// Convolves an environment file; `size` is relative to its base size.
///
/// # Errors
///
/// Returns a [`JobError`] naming the failed stage.
pub fn convolve_file(
    input: &Path,
    convolver: &dyn Convolver,
    size: SizeSpec,
    output: &OutputNaming,
    encode: &EncodeOptions,
) -> Result<JobReport, JobError> {
    let env = load_env(input)?;

    let size = size.resolve(env.base_size());
    log::info!("convolving to {size}x{size}x6 cube map");
    let result = convolver
        .convolve(&env, size)
        .map_err(JobError::at(input, Stage::Process))?;

    write(input, output, &result, encode)
}

/// Resizes an environment file; `size` is relative to its base size.
///
/// # Errors
///
/// Returns a [`JobError`] naming the failed stage.
pub fn resize_file(
    input: &Path,
    resizer: &dyn Resizer,
    size: SizeSpec,
    output: &OutputNaming,
    encode: &EncodeOptions,
) -> Result<JobReport, JobError> {
    let env = load_env(input)?;

    let size = size.resolve(env.base_size());
    log::info!(
        "resizing from {0}x{0} to {size}x{size} cube map",
        env.base_size()
    );
    let result = resizer
        .resize(&env, size)
        .map_err(JobError::at(input, Stage::Process))?;

    write(input, output, &result, encode)
}

/// Rewrites an environment file of any supported version in the current version.
///
/// # Errors
///
/// Returns a [`JobError`] naming the failed stage.
pub fn update_file(
    input: &Path,
    output: &OutputNaming,
    encode: &EncodeOptions,
) -> Result<JobReport, JobError> {
    let env = load_env(input)?;
    write(input, output, &env, encode)
}

/// How a BRDF lookup table is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LutOutput {
    /// Write scale and bias as two separate images suffixed `_r` and `_g`.
    pub grayscale: bool,
    /// Also write a normalized 8-bit `.png` next to every float image.
    pub preview: bool,
}

fn with_stem_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    path.with_file_name(name)
}

/// Generates a `size`×`size` BRDF lookup table and writes it to `output`.
///
/// The image format follows the extension of `output` and must hold float pixels
/// (`.exr` or `.hdr`).
///
/// # Errors
///
/// Returns a [`JobError`] naming the failed stage.
pub fn brdf_lut_file(
    output: &Path,
    integrator: &dyn BrdfIntegrator,
    size: u32,
    options: LutOutput,
) -> Result<JobReport, JobError> {
    log::info!("integrating {size}x{size} brdf lookup table");
    let lut = integrator
        .integrate(size)
        .map_err(JobError::at(output, Stage::Process))?;

    let images = if options.grayscale {
        vec![
            (with_stem_suffix(output, "_r"), lut.channel_image(0), 1),
            (with_stem_suffix(output, "_g"), lut.channel_image(1), 1),
        ]
    } else {
        vec![(output.to_path_buf(), lut.to_image(), BrdfLut::CHANNELS)]
    };

    for (path, image, channels) in &images {
        log::info!("writing {}", path.display());
        image
            .save(path)
            .map_err(|err| JobError::at(output, Stage::Write)(err.into()))?;
        if options.preview {
            let preview = path.with_extension("png");
            log::info!("writing {}", preview.display());
            BrdfLut::preview(image, *channels)
                .save(&preview)
                .map_err(|err| JobError::at(output, Stage::Write)(err.into()))?;
        }
    }

    Ok(JobReport {
        output: output.to_path_buf(),
        base_size: size,
        levels: 1,
    })
}

/// The outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub reports: Vec<JobReport>,
    pub failures: Vec<JobError>,
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Runs `job` for every input, continuing after failures.
    pub fn run<P, F>(inputs: &[P], mut job: F) -> Self
    where
        P: AsRef<Path>,
        F: FnMut(&Path) -> Result<JobReport, JobError>,
    {
        let start = Instant::now();
        let mut summary = Self {
            total: inputs.len(),
            ..Self::default()
        };

        for (i, input) in inputs.iter().enumerate() {
            let input = input.as_ref();
            log::info!("processing file {}/{} {}", i + 1, inputs.len(), input.display());
            match job(input) {
                Ok(report) => summary.reports.push(report),
                Err(err) => {
                    log::debug!("{err}");
                    summary.failures.push(err);
                }
            }
        }

        summary.elapsed = start.elapsed();
        summary
    }

    pub fn processed(&self) -> usize {
        self.reports.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {}/{} files in {:.3} seconds",
            self.processed(),
            self.total,
            self.elapsed.as_secs_f32()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path() {
        let naming = OutputNaming::new("/out", "_diffuse", ".iblenv");
        assert_eq!(
            naming.output_path(Path::new("in/studio.iblenv")),
            PathBuf::from("/out/studio_diffuse.iblenv")
        );
        assert_eq!(
            naming.output_path(Path::new("sky.hdr")),
            PathBuf::from("/out/sky_diffuse.iblenv")
        );
    }

    #[test]
    fn test_stem_suffix() {
        assert_eq!(
            with_stem_suffix(Path::new("out/lut.exr"), "_r"),
            PathBuf::from("out/lut_r.exr")
        );
        assert_eq!(with_stem_suffix(Path::new("lut"), "_g"), PathBuf::from("lut_g"));
    }

    #[test]
    fn test_error_names_file_and_stage() {
        let err = JobError::at(Path::new("a/b.hdr"), Stage::Load)(IblError::ZeroSizeInput);
        let message = err.to_string();
        assert!(message.starts_with("loading a/b.hdr"), "{message}");
        assert!(message.contains("zero size"));
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let inputs = ["ok1", "bad", "ok2"];
        let summary = BatchSummary::run(&inputs, |input| {
            if input == Path::new("bad") {
                Err(JobError::at(input, Stage::Process)(IblError::ZeroSizeInput))
            } else {
                Ok(JobReport {
                    output: input.to_path_buf(),
                    base_size: 1,
                    levels: 1,
                })
            }
        });

        assert_eq!(summary.total, 3);
        assert_eq!(summary.processed(), 2);
        assert!(!summary.is_success());
        assert_eq!(summary.failures[0].path, PathBuf::from("bad"));
        assert!(summary.to_string().starts_with("Processed 2/3 files in "));
    }
}
