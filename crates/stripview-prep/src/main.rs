//! `stripview-prep`: build and take apart strip containers
//!
//! ```text
//! stripview-prep pack photo.png photo.svs --strip-height 40
//! stripview-prep unpack photo.svs strips/
//! stripview-prep inspect photo.svs
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stripview_core::container::StripContainer;
use stripview_core::{PANEL_HEIGHT, PANEL_WIDTH};
use stripview_prep::{
    describe, pack, strip_file_name, PackOptions, DEFAULT_QUALITY, DEFAULT_STRIP_HEIGHT,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Prepare JPEG strips for a stripview panel")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit an image to the panel and write a strip container
    Pack {
        input: PathBuf,
        output: PathBuf,

        /// Rows per strip, a multiple of 8
        #[arg(long, default_value_t = DEFAULT_STRIP_HEIGHT)]
        strip_height: u16,

        /// JPEG quality of every strip
        #[arg(long, default_value_t = DEFAULT_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: u8,

        #[arg(long, default_value_t = PANEL_WIDTH)]
        width: u16,

        #[arg(long, default_value_t = PANEL_HEIGHT)]
        height: u16,
    },

    /// Write each strip of a container as strip_NNN.jpg
    Unpack { container: PathBuf, dir: PathBuf },

    /// Print the container header and strip sizes
    Inspect { container: PathBuf },
}

fn main() -> Result<()> {
    match Args::parse().command {
        Command::Pack {
            input,
            output,
            strip_height,
            quality,
            width,
            height,
        } => {
            let img = image::open(&input)
                .with_context(|| format!("cannot read image {}", input.display()))?;
            let options = PackOptions {
                width,
                height,
                strip_height,
                quality,
            };
            let bytes = pack(&img, &options)?;
            fs::write(&output, &bytes)
                .with_context(|| format!("cannot write {}", output.display()))?;
            let container = StripContainer::parse(&bytes)?;
            println!(
                "{}: {}x{} in {} strips, {} bytes",
                output.display(),
                width,
                height,
                container.len(),
                bytes.len()
            );
        }
        Command::Unpack { container, dir } => {
            let bytes = read(&container)?;
            let parsed = StripContainer::parse(&bytes)?;
            fs::create_dir_all(&dir)
                .with_context(|| format!("cannot create {}", dir.display()))?;
            for (i, strip) in parsed.strips().enumerate() {
                let path = dir.join(strip_file_name(i));
                fs::write(&path, strip)
                    .with_context(|| format!("cannot write {}", path.display()))?;
            }
            println!("{} strips written to {}", parsed.len(), dir.display());
        }
        Command::Inspect { container } => {
            let bytes = read(&container)?;
            let parsed = StripContainer::parse(&bytes)?;
            let header = parsed.header();
            println!(
                "{}x{}, {} strips of {} rows",
                header.width, header.height, header.strip_count, header.strip_height
            );
            for line in describe(&parsed) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("cannot read {}", path.display()))
}
