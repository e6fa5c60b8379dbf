use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use log::info;
use pxd_lib::{
    bina::{Bina, FileKind},
    ksxp::Ksxp,
    naxp::Naxp,
    outanim::OutAnim,
    tracks::TrackCompressor,
};
use pxd_model::{AllFrames, Animation, Orientation, Skeleton, is_outanim};
use rayon::prelude::*;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Log informational messages in addition to warnings.
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Read and rewrite every .pxd and .outanim file in a folder.
    /// Files that fail to round trip are listed at the end.
    Check {
        /// The folder to search recursively.
        input_folder: String,
    },
    /// Convert between legacy .outanim files and .anm.pxd files with sparse tracks.
    /// The output format is determined by the output extension.
    Convert {
        /// The input .outanim or .anm.pxd file.
        input: String,
        /// The output .outanim or .anm.pxd file.
        output: String,
    },
}

// Compression requires an external library.
// Compressed tracks are checked without decompressing them.
struct MissingCompressor;

impl TrackCompressor for MissingCompressor {
    fn compress(&self, _: &[u8]) -> Vec<u8> {
        Vec::new()
    }

    fn decompress(&self, _: &[u8]) -> Vec<u8> {
        Vec::new()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .init()
        .unwrap();

    let start = std::time::Instant::now();

    let code = match cli.command {
        Commands::Check { input_folder } => check_all(&input_folder),
        Commands::Convert { input, output } => match convert(&input, &output) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{e:?}");
                ExitCode::FAILURE
            }
        },
    };

    println!("Finished in {:?}", start.elapsed());
    code
}

fn check_all(input_folder: &str) -> ExitCode {
    let walker = match globwalk::GlobWalkerBuilder::from_patterns(
        input_folder,
        &["*.pxd", "*.outanim"],
    )
    .build()
    {
        Ok(walker) => walker,
        Err(e) => {
            eprintln!("Invalid input folder {input_folder:?}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let results: Vec<_> = walker
        .par_bridge()
        .map(|entry| match entry {
            Ok(entry) => {
                let path = entry.path();
                info!("Checking {path:?}");
                check_file(path).err().map(|e| (path.to_owned(), e))
            }
            Err(e) => Some((
                e.path().map(Path::to_path_buf).unwrap_or_default(),
                anyhow!(e),
            )),
        })
        .collect();

    let file_count = results.len();
    let mut failures: Vec<(PathBuf, anyhow::Error)> = results.into_iter().flatten().collect();
    failures.sort_by(|(a, _), (b, _)| a.cmp(b));

    for (path, e) in &failures {
        println!("{path:?}: {e:?}");
    }
    println!("Checked {file_count} files with {} failures", failures.len());

    if failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn check_file(path: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {path:?}"))?;

    if is_outanim(path) {
        let outanim = OutAnim::from_bytes(&bytes)?;
        return check_outanim(&outanim);
    }

    let bina = Bina::from_bytes(&bytes)?;
    match bina.kind() {
        Some(FileKind::Skeleton) => check_skeleton(&Ksxp::from_bina(&bina)?),
        Some(FileKind::Animation) => check_animation(&Naxp::from_bina(&bina)?),
        None => bail!("unrecognized payload magic"),
    }
}

fn check_skeleton(ksxp: &Ksxp) -> anyhow::Result<()> {
    let skeleton = Skeleton::from_ksxp(ksxp, Orientation::Native);
    skeleton.hierarchy_order()?;

    let new_ksxp = skeleton.to_ksxp(Orientation::Native)?;
    if new_ksxp.names != ksxp.names || new_ksxp.parent_indices != ksxp.parent_indices {
        bail!("bone names or parents changed after conversion");
    }

    let bytes = new_ksxp.to_bina()?.to_bytes()?;
    let reread = Ksxp::from_bina(&Bina::from_bytes(bytes)?)?;
    if reread != new_ksxp {
        bail!("skeleton changed after writing");
    }
    Ok(())
}

fn check_animation(naxp: &Naxp) -> anyhow::Result<()> {
    let bytes = naxp.to_bina()?.to_bytes()?;
    let bina = Bina::from_bytes(bytes)?;
    let reread = Naxp::from_bina(&bina)?;
    if &reread != naxp {
        bail!("animation changed after writing");
    }

    if naxp.is_compressed() {
        return Ok(());
    }

    let animation = Animation::from_naxp(naxp, &MissingCompressor)?;
    let sparse = animation.to_naxp_sparse(&AllFrames);
    let bytes = sparse.to_bina()?.to_bytes()?;
    let new_naxp = Naxp::from_bina(&Bina::from_bytes(bytes)?)?;
    let new_animation = Animation::from_naxp(&new_naxp, &MissingCompressor)?;
    if new_animation.frames != animation.frames
        || new_animation.root_motion != animation.root_motion
    {
        bail!("animation tracks changed after rewriting keys");
    }
    Ok(())
}

fn check_outanim(outanim: &OutAnim) -> anyhow::Result<()> {
    let new_outanim = Animation::from_outanim(outanim).to_outanim();
    if new_outanim.frame_count != outanim.frame_count
        || new_outanim.bone_count != outanim.bone_count
        || new_outanim.samples != outanim.samples
    {
        bail!("outanim samples changed after conversion");
    }
    Ok(())
}

fn convert(input: &str, output: &str) -> anyhow::Result<()> {
    let animation = pxd_model::load_animation(input, &MissingCompressor)
        .with_context(|| format!("failed to load {input:?}"))?;

    let result = if is_outanim(Path::new(output)) {
        pxd_model::save_outanim(output, &animation)
    } else {
        pxd_model::save_animation_sparse(output, &animation, &AllFrames)
    };
    result.with_context(|| format!("failed to save {output:?}"))?;

    Ok(())
}
