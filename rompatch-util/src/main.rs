mod cli;

use clap::Parser;
use cli::{Cli, Command};
use rompatch::aps::ApsPatch;
use rompatch::ips::IpsPatch;
use rompatch::{EditRecord, Format};
use rompatch_util::{
    ConsoleProgress, CreateOutcome, PatchApplier, PatchCreator, SilentProgress,
    default_output_path, default_patch_path,
};
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use std::path::{Path, PathBuf};
use tracing::Level;

/// Top-level application errors for rompatch.
#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to read input"))]
    MapFile {
        source: rompatch_util::MapFileError,
    },

    #[snafu(display("failed to create patch"))]
    Create {
        source: rompatch_util::CreateError,
    },

    #[snafu(display("failed to patch '{}'", path.display()))]
    Apply {
        path: PathBuf,
        source: rompatch_util::ApplyError,
    },

    #[snafu(display("'{}' is the original image; choose another output", path.display()))]
    OutputIsInput { path: PathBuf },

    #[snafu(display("'{}' is not an IPS or APS patch", path.display()))]
    UnknownFormat { path: PathBuf },

    #[snafu(display("failed to parse patch '{}'", path.display()))]
    ParsePatch {
        path: PathBuf,
        source: rompatch::ApplyError,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[snafu::report]
fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Create {
            original,
            modified,
            output,
            format,
            description,
            force,
            quiet,
        } => cmd_create(
            &original,
            &modified,
            output.as_deref(),
            format.into(),
            description,
            force,
            quiet,
        ),
        Command::Apply {
            patch,
            original,
            output,
            format,
            force,
            quiet,
        } => cmd_apply(
            &patch,
            &original,
            output.as_deref(),
            format.map(Format::from),
            force,
            quiet,
        ),
        Command::Info { patch } => cmd_info(&patch),
    }
}

fn cmd_create(
    original: &Path,
    modified: &Path,
    output: Option<&Path>,
    format: Format,
    description: String,
    force: bool,
    quiet: bool,
) -> Result<()> {
    let patch_path = output.map_or_else(|| default_patch_path(modified, format), Path::to_path_buf);

    ensure!(
        !same_file(&patch_path, original) && !same_file(&patch_path, modified),
        OutputIsInputSnafu { path: patch_path }
    );

    let original_map = unsafe { rompatch_util::map_file(original).context(MapFileSnafu)? };
    let modified_map = unsafe { rompatch_util::map_file(modified).context(MapFileSnafu)? };

    if !quiet {
        println!("Creating {format} patch {}...", patch_path.display());
    }

    let start = std::time::Instant::now();

    let outcome = if quiet {
        PatchCreator::new(format, SilentProgress, force)
            .description(description)
            .create(&original_map, &modified_map, &patch_path)
    } else {
        PatchCreator::new(format, ConsoleProgress::new("Diffing"), force)
            .description(description)
            .create(&original_map, &modified_map, &patch_path)
    }
    .context(CreateSnafu)?;

    match outcome {
        CreateOutcome::Identical => {
            println!("The files are identical, no patch was written.");
        }
        CreateOutcome::Created(summary) if !quiet => {
            println!(
                "{} differing bytes in {} records. Done in {:.2}s.",
                summary.differing,
                summary.records,
                start.elapsed().as_secs_f64()
            );
        }
        CreateOutcome::Created(_) => {}
    }

    Ok(())
}

fn cmd_apply(
    patch: &Path,
    original: &Path,
    output: Option<&Path>,
    format: Option<Format>,
    force: bool,
    quiet: bool,
) -> Result<()> {
    let output = output.map_or_else(|| default_output_path(original), Path::to_path_buf);

    ensure!(
        !same_file(&output, original) && !same_file(&output, patch),
        OutputIsInputSnafu { path: output }
    );

    let patch_map = unsafe { rompatch_util::map_file(patch).context(MapFileSnafu)? };
    let original_map = unsafe { rompatch_util::map_file(original).context(MapFileSnafu)? };

    if !quiet {
        println!("Patching {} to {}...", original.display(), output.display());
    }

    let start = std::time::Instant::now();

    let format = match format {
        Some(format) => format,
        None => Format::detect(&patch_map).context(UnknownFormatSnafu { path: patch })?,
    };

    let summary = if quiet {
        PatchApplier::new(SilentProgress, force)
            .format(format)
            .apply(&patch_map, &original_map, &output)
    } else {
        PatchApplier::new(ConsoleProgress::new("Patching"), force)
            .format(format)
            .apply(&patch_map, &original_map, &output)
    }
    .context(ApplySnafu { path: original })?;

    if !quiet {
        if let Some(description) = summary.description.as_deref().filter(|d| !d.is_empty()) {
            println!("Description: {description}");
        }

        for warning in &summary.warnings {
            println!("Warning: {warning}");
        }

        println!(
            "Applied {} records, output is {} bytes. Done in {:.2}s.",
            summary.records,
            summary.final_len,
            start.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

fn cmd_info(path: &Path) -> Result<()> {
    let data = unsafe { rompatch_util::map_file(path).context(MapFileSnafu)? };
    let format = Format::detect(&data).context(UnknownFormatSnafu { path })?;

    println!("Patch: {}", path.display());
    println!();
    println!("Format:         {format}");

    let records = match format {
        Format::Ips => {
            let patch = IpsPatch::parse(&data).context(ParsePatchSnafu { path })?;

            match patch.truncate_to {
                Some(len) => println!("Truncate To:    {len} bytes"),
                None => println!("Truncate To:    (none)"),
            }

            patch.records
        }
        Format::Aps => {
            let patch = ApsPatch::parse(&data).context(ParsePatchSnafu { path })?;
            let header = &patch.header;

            println!("Description:    {}", header.description());
            match header.dump_layout() {
                Some(layout) => println!("Dump Format:    {layout}"),
                None => println!("Dump Format:    unknown (0x{:02X})", header.dump_format()),
            }
            println!(
                "Cartridge ID:   {}",
                String::from_utf8_lossy(&header.cart_id())
            );
            println!(
                "Territory:      {}",
                char::from(header.territory()).escape_default()
            );
            println!("CRC:            {}", hex(&header.crc()));
            println!("Target Size:    {} bytes", header.target_size());

            patch.records
        }
    };

    println!("Record Count:   {}", records.len());
    println!();
    println!("{:>6}  {:>10}  {:>8}  Kind", "Index", "Offset", "Length");
    println!("{:-<6}  {:-<10}  {:-<8}  {:-<12}", "", "", "", "");

    for (index, record) in records.iter().enumerate() {
        let kind = match record {
            EditRecord::Literal { .. } => "literal".to_string(),
            EditRecord::Run { fill, .. } => format!("run of 0x{fill:02X}"),
        };

        println!(
            "{:>6}  0x{:08X}  {:>8}  {}",
            index,
            record.offset(),
            record.len(),
            kind
        );
    }

    Ok(())
}

/// Returns `true` if both paths name the same existing file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}
