use super::check_overwrite;
use anyhow::{Context, Result};
use rescene_srs::{MissingTrackPolicy, SampleOptions, SampleReport, SrsFile};
use std::path::Path;

/// Sample rebuild result together with the name recorded in the SRS.
#[derive(Debug, Clone)]
pub struct SampleRun {
    pub sample_name: String,
    pub report: SampleReport,
}

/// Rebuild the sample described by `srs_path` from the full `source` file.
pub fn rebuild_sample(
    srs_path: &Path,
    source: &Path,
    output_dir: &Path,
    policy: MissingTrackPolicy,
    overwrite: bool,
) -> Result<SampleRun> {
    if !source.exists() {
        anyhow::bail!("Source file does not exist: {:?}", source);
    }

    let srs = SrsFile::open(srs_path)
        .with_context(|| format!("Failed to read SRS file: {:?}", srs_path))?;

    let out_path = output_dir.join(srs.output_name());
    check_overwrite(&out_path, overwrite)?;

    tracing::info!(
        "Rebuilding {} from {:?} ({} tracks)",
        srs.meta.file.sample_name,
        source,
        srs.meta.tracks.len()
    );
    let options = SampleOptions {
        missing_tracks: policy,
    };
    let report = srs
        .rebuild_to_file(source, &out_path, &options)
        .with_context(|| format!("Failed to rebuild sample {:?}", out_path))?;

    Ok(SampleRun {
        sample_name: srs.meta.file.sample_name.clone(),
        report,
    })
}
