mod cli;

use rescene::commands::{self, FileInfo, SfvStatus};
use rescene::config::{self, Config};
use rescene_srs::MissingTrackPolicy;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "rescene=trace,rescene_srr=debug,rescene_srs=debug,rescene_common=debug".to_string()
        } else {
            "rescene=info,rescene_srr=info,rescene_srs=info,rescene_common=info".to_string()
        }
    });

    // stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Rar {
            srr,
            input,
            output,
            skip_validation,
        } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;
            config.rar.skip_validation |= skip_validation;
            run_rar(&srr, input, output, &config)
        }
        Commands::Sample {
            srs,
            source,
            output,
            strict,
        } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;
            if strict {
                config.sample.missing_tracks = MissingTrackPolicy::Fail;
            }
            run_sample(&srs, &source, output, &config)
        }
        Commands::Info { file, json } => show_info(&file, json),
        Commands::Extract { srr, output } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            run_extract(&srr, output, &config)
        }
        Commands::Version => {
            println!("rescene {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_rar(
    srr: &Path,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    if !srr.exists() {
        anyhow::bail!("SRR file does not exist: {:?}", srr);
    }

    let input = input.unwrap_or_else(|| {
        srr.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    let output = output.unwrap_or_else(|| config.output.dir.clone());
    let options = commands::RarOptions {
        skip_validation: config.rar.skip_validation,
        verify_sfv: config.rar.verify_sfv,
        overwrite: config.output.overwrite,
    };

    let reports = commands::rebuild_rar(srr, &input, &output, &options)?;

    let mut failed = 0;
    for report in &reports {
        match (&report.error, report.size, report.crc32) {
            (Some(error), _, _) => println!("✗ {}: {}", report.name, error),
            (None, Some(size), Some(crc)) => {
                let sfv = match report.sfv {
                    SfvStatus::Match => " [SFV OK]".to_string(),
                    SfvStatus::Mismatch { expected } => {
                        format!(" [SFV MISMATCH, expected {:08X}]", expected)
                    }
                    SfvStatus::NotListed => " [not in SFV]".to_string(),
                    SfvStatus::Skipped => String::new(),
                };
                let status = if report.is_ok() { "✓" } else { "✗" };
                println!("{} {} ({} bytes, CRC {:08X}){}", status, report.name, size, crc, sfv);
            }
            _ => println!("? {}", report.name),
        }
        if !report.is_ok() {
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} volumes failed", failed, reports.len());
    }
    println!("\nAll {} volumes rebuilt in {:?}", reports.len(), output);
    Ok(())
}

fn run_sample(srs: &Path, source: &Path, output: Option<PathBuf>, config: &Config) -> Result<()> {
    if !srs.exists() {
        anyhow::bail!("SRS file does not exist: {:?}", srs);
    }

    let output = output.unwrap_or_else(|| config.output.dir.clone());
    let run = commands::rebuild_sample(
        srs,
        source,
        &output,
        config.sample.missing_tracks,
        config.output.overwrite,
    )?;
    let report = &run.report;

    println!("Sample: {}", run.sample_name);
    println!("Output: {}", report.path.display());
    println!(
        "Size:   {} bytes (expected {})",
        report.size, report.expected_size
    );
    println!(
        "CRC32:  {:08X} (expected {:08X})",
        report.crc32, report.expected_crc32
    );
    if report.zero_filled > 0 {
        println!("Zero-filled: {} bytes of missing track data", report.zero_filled);
    }

    if report.is_match() {
        println!("\n✓ Sample matches");
    } else if config.sample.verify {
        anyhow::bail!("Rebuilt sample does not match the SRS checksum");
    } else {
        println!("\n✗ Sample does not match (verification disabled)");
    }
    Ok(())
}

fn run_extract(srr: &Path, output: Option<PathBuf>, config: &Config) -> Result<()> {
    if !srr.exists() {
        anyhow::bail!("SRR file does not exist: {:?}", srr);
    }

    let output = output.unwrap_or_else(|| config.output.dir.clone());
    let written = commands::extract_stored(srr, &output, config.output.overwrite)?;
    for path in &written {
        println!("{}", path.display());
    }
    println!("\nExtracted {} files", written.len());
    Ok(())
}

fn show_info(file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let info = commands::inspect(file)?;

    if json {
        let json_str = serde_json::to_string_pretty(&info)?;
        println!("{}", json_str);
        return Ok(());
    }

    match &info {
        FileInfo::Srr {
            app_name,
            stored_files,
            volumes,
            blocks,
        } => {
            println!("Format: SRR");
            if let Some(app) = app_name {
                println!("Created by: {}", app);
            }
            println!("Blocks: {}", blocks.len());

            println!("\nStored Files: {}", stored_files.len());
            for (i, stored) in stored_files.iter().enumerate() {
                println!("  [{}] {} ({} bytes)", i, stored.name, stored.size);
            }

            println!("\nVolumes: {}", volumes.len());
            for (i, volume) in volumes.iter().enumerate() {
                println!(
                    "  [{}] {} ({} bytes, {} blocks)",
                    i, volume.name, volume.expected_size, volume.blocks
                );
                for name in &volume.packed_files {
                    println!("      {}", name);
                }
            }
        }
        FileInfo::Srs { kind, meta } => {
            println!("Format: SRS ({})", kind.extension());
            println!("Created by: {}", meta.file.app_name);
            println!("Sample: {}", meta.file.sample_name);
            println!("Size: {} bytes", meta.file.original_size);
            println!("CRC32: {:08X}", meta.file.crc32);

            println!("\nTracks: {}", meta.tracks.len());
            for track in meta.tracks.values() {
                println!(
                    "  [{}] {} bytes at offset {}",
                    track.track_number, track.data_length, track.match_offset
                );
            }
        }
    }

    Ok(())
}
