//! Command line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use iblenv::brdf::{DEFAULT_LUT_SAMPLES, DEFAULT_LUT_SIZE};
use iblenv::{
    Compression, EncodeOptions, HdrLoadOptions, Implementation, LutOutput, SampleSequence,
    SizeSpec,
};

#[derive(Debug, Parser)]
#[command(name = "iblconv", version, about = "Convert and filter image-based lighting environments", long_about = None)]
pub struct Cli {
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Do not report per-file errors (they still fail the run)
    #[arg(long, global = true)]
    pub suppress: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Convert equirectangular HDR images to ibl environments
    Convert {
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        backend: BackendArgs,
        /// Keep the image rows in file order instead of flipping them
        #[arg(long)]
        no_flip: bool,
        /// Gamma used to linearize LDR images
        #[arg(long, default_value_t = 2.2)]
        gamma: f32,
        /// Scale applied to linearized LDR images
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
    },

    /// Convolve ibl environments into diffuse irradiance maps
    #[command(alias = "convolve")]
    Diffuse {
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        backend: BackendArgs,
        /// Sample quality: quality + 1 rings of 4 * quality directions
        #[arg(long, default_value_t = 128)]
        samples: u32,
    },

    /// Prefilter ibl environments into specular mip chains
    Specular {
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        backend: BackendArgs,
        /// Samples per mip level
        #[arg(long, default_value_t = 4096)]
        samples: u32,
        /// Number of mip levels, from mirror to fully rough
        #[arg(long, default_value_t = 5)]
        levels: u32,
        /// Point sequence the GGX samples are drawn from
        #[arg(long, value_enum, default_value_t = Sequence::Hammersley)]
        sequence: Sequence,
        /// Seed for the random sequence
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Resize ibl environments
    Resize {
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        backend: BackendArgs,
        /// Supersampling grid size per axis
        #[arg(long, default_value_t = 5)]
        samples: u32,
    },

    /// Rewrite ibl environments in the current file version
    Update {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Integrate the split-sum BRDF lookup table into a float image (.exr or .hdr)
    #[command(alias = "brdflut")]
    BrdfLut {
        /// Output image
        #[arg(default_value = "ibl_brdf_lut.exr")]
        output: PathBuf,
        /// Table resolution in px
        #[arg(short, long, default_value_t = DEFAULT_LUT_SIZE)]
        size: u32,
        /// Samples of the integral per texel
        #[arg(long, default_value_t = DEFAULT_LUT_SAMPLES)]
        samples: u32,
        /// Write the two terms as separate images suffixed _r and _g
        #[arg(long)]
        grayscale: bool,
        /// Also write a normalized png preview
        #[arg(long)]
        preview: bool,
        #[command(flatten)]
        device: DeviceArgs,
    },
}

/// Input files and how results are written.
#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Input file globs
    #[arg(required = true, value_name = "FILE_GLOB")]
    pub files: Vec<String>,

    /// Output directory (defaults to the working directory)
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Compression level from 0 (none) to 10 (high)
    #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub compress: u32,

    /// Result file extension
    #[arg(long, default_value = ".iblenv")]
    pub ext: String,

    /// Result file suffix (defaults depend on the command)
    #[arg(long)]
    pub suffix: Option<String>,
}

impl OutputArgs {
    pub fn encode_options(&self) -> iblenv::Result<EncodeOptions> {
        EncodeOptions::new().compression(Compression::from_cli_level(self.compress))
    }
}

/// Target size and backend selection.
#[derive(Debug, Args)]
pub struct BackendArgs {
    /// Cube face resolution, either % of the input width or absolute px
    #[arg(short, long)]
    pub size: Option<SizeSpec>,

    #[command(flatten)]
    pub device: DeviceArgs,
}

/// Which implementation runs the work.
#[derive(Debug, Args)]
pub struct DeviceArgs {
    /// Implementation: gpu (alias opencl) or software
    #[arg(long = "impl", default_value = "gpu")]
    pub implementation: Implementation,

    /// Run the software backend on a single thread
    #[arg(long)]
    pub serial: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Sequence {
    Hammersley,
    Roberts,
    Random,
}

impl Sequence {
    pub fn with_seed(self, seed: u64) -> SampleSequence {
        match self {
            Self::Hammersley => SampleSequence::Hammersley,
            Self::Roberts => SampleSequence::Roberts,
            Self::Random => SampleSequence::Random { seed },
        }
    }
}

pub fn lut_output(grayscale: bool, preview: bool) -> LutOutput {
    LutOutput { grayscale, preview }
}

pub fn load_options(no_flip: bool, gamma: f32, scale: f32) -> HdrLoadOptions {
    HdrLoadOptions {
        flip_vertically: !no_flip,
        ldr_gamma: gamma,
        ldr_scale: scale,
    }
}
