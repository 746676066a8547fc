use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser as _;
use webpmux::{AnimationMuxer, ChunkRecord, Config, ContainerReader, FileSink, MuxParams};

#[derive(clap::Parser)]
struct Args {
    /// Read and write containers without padding odd-length chunks.
    #[clap(long, global = true)]
    no_padding: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Log every chunk of a WebP file.
    Dump {
        /// Path to the file to read.
        file: PathBuf,

        /// Don't check the container length declared in the header.
        #[clap(long)]
        no_check_len: bool,
    },

    /// Combine single-image WebP files into an animation, one frame per file.
    Mux {
        /// Path to write the animation to.
        #[clap(long, short = 'o')]
        output: PathBuf,

        /// Canvas width in pixels.
        #[clap(long)]
        width: u32,

        /// Canvas height in pixels.
        #[clap(long)]
        height: u32,

        /// Number of times to repeat the animation, with 0 meaning forever.
        ///
        /// If not specified, a single file is written as a still image.
        #[clap(long)]
        loop_count: Option<u16>,

        /// Display duration of each frame in milliseconds.
        #[clap(long, default_value_t = 100)]
        duration: u32,

        /// The frame files, in display order.
        #[clap(required = true)]
        frames: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    if let Err(error) = run() {
        log::error!("{error:?}");
        eprintln!("{}", webpmux::USER_ERROR_MESSAGE);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run() -> Result<(), anyhow::Error> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init()
        .context("Error initializing logging")?;

    let args = Args::try_parse().context("Error parsing command line arguments")?;
    let padding = !args.no_padding;

    match args.command {
        Command::Dump { file, no_check_len } => {
            let config = Config::builder().chunk_padding(padding).check_file_len(!no_check_len).build();
            let file = File::open(file).context("Error opening file")?;
            let mut reader = ContainerReader::with_config(BufReader::new(file), config);
            let mut frame_count = 0;
            while let Some(record) = reader.next_chunk().context("Error reading webp file")? {
                frame_count += matches!(record, ChunkRecord::AnimationFrame(_)) as u32;
            }
            log::info!("{} bytes, {frame_count} animation frames", reader.position());
        }
        Command::Mux { output, width, height, loop_count, duration, frames } => {
            let config = Config::builder().chunk_padding(padding).build();
            let mut params = MuxParams::builder();
            params.width(width).height(height).frame_duration_ms(duration);
            if let Some(loop_count) = loop_count {
                params.loop_count(loop_count);
            }
            let params = params.build().context("Invalid animation parameters")?;

            let sink = FileSink::create(&output).context("Error creating output file")?;
            let mut muxer = AnimationMuxer::with_config(sink, config);
            let result = mux_files(&mut muxer, params, &frames);
            if result.is_err() {
                discard_output(&mut muxer, &output);
            }
            result?;
        }
    }

    Ok(())
}

/// Close `muxer` without finishing its container, and delete the incomplete file at `output`.
fn discard_output(muxer: &mut AnimationMuxer<FileSink>, output: &Path) {
    if let Err(error) = muxer.abandon() {
        log::warn!("error closing incomplete output: {error}");
    }
    if let Err(error) = fs::remove_file(output) {
        log::warn!("error removing incomplete output: {error}");
    }
}

fn mux_files(muxer: &mut AnimationMuxer<FileSink>, params: MuxParams, frames: &[PathBuf]) -> anyhow::Result<()> {
    muxer.configure_with(params).context("Invalid animation parameters")?;
    for path in frames {
        let frame = fs::read(path).with_context(|| format!("Error reading frame {}", path.display()))?;
        muxer
            .submit_frame(&frame)
            .with_context(|| format!("Error muxing frame {}", path.display()))?;
    }
    let output = muxer.close().context("Error finishing animation")?;
    log::info!(
        "wrote {} bytes: {} frames on {}x{} canvas",
        output.bytes_written,
        output.frame_count,
        output.width,
        output.height,
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn failed_mux_removes_output() {
        let output = std::env::temp_dir().join(format!("webpmux-cli-{}.webp", std::process::id()));
        let mut muxer = AnimationMuxer::new(FileSink::create(&output).unwrap());
        let params = MuxParams::builder().width(1).height(1).loop_count(0).build().unwrap();
        let missing = output.with_extension("missing");

        let error = mux_files(&mut muxer, params, &[missing]).unwrap_err();
        discard_output(&mut muxer, &output);
        assert!(error.to_string().starts_with("Error reading frame"), "{error}");
        assert!(!output.exists());
    }
}
