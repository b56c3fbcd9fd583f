mod config;
mod output;

use anyhow::Context;
use chhttp_codec::RowReader;
use chhttp_core::Column;
use clap::Parser;
use config::Config;
use output::{Format, RowWriter};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::FmtSubscriber;

/// Decode a TabSeparatedWithNamesAndTypes result body and print its rows.
#[derive(Debug, Parser)]
#[command(name = "chhttp-cat", version)]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Row buffer size in bytes. Every single field must fit in it.
    #[arg(long)]
    buffer_size: Option<usize>,
    /// Zone applied to Date and DateTime columns.
    #[arg(long)]
    timezone: Option<String>,
    /// Let a zone declared by a DateTime column win over --timezone.
    #[arg(long)]
    prefer_declared_timezone: bool,
    #[arg(long, value_enum)]
    format: Option<Format>,
    /// Input file; stdin when omitted.
    input: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder().with_writer(io::stderr).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(size) = args.buffer_size {
        config.reader.buffer_size = size;
    }
    if let Some(zone) = args.timezone {
        config.reader.default_timezone = Some(zone);
    }
    if args.prefer_declared_timezone {
        config.reader.prefer_declared_timezone = true;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    config.validate()?;

    let source: Box<dyn Read> = match &args.input {
        Some(path) => Box::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        ),
        None => Box::new(io::stdin().lock()),
    };
    info!(
        input = ?args.input,
        buffer_size = config.reader.buffer_size,
        "decoding row stream"
    );

    let mut reader = RowReader::open(source, config.reader_options()?)?;
    let columns = reader.columns().to_vec();
    let mut writer = RowWriter::new(BufWriter::new(io::stdout().lock()), config.output.format);
    writer.write_header(&columns)?;

    let copied = copy_rows(&mut reader, &mut writer, &columns);
    reader.close();
    let rows = copied?;
    writer.finish()?;
    debug!(rows, "row stream finished");
    Ok(())
}

fn copy_rows<R: Read, W: Write>(
    reader: &mut RowReader<R>,
    writer: &mut RowWriter<W>,
    columns: &[Column],
) -> anyhow::Result<usize> {
    let mut rows = 0;
    for row in reader {
        let row = row.with_context(|| format!("row {}", rows + 1))?;
        writer.write_row(columns, &row)?;
        rows += 1;
    }
    Ok(rows)
}
