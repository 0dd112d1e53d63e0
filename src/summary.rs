//! Summary Joiner: cross-references downloaded objects against the TOI
//! table, with per-object spectra counts as a provenance signal.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use crate::domain::{CandidateId, TicId};
use crate::download;
use crate::error::DiggerError;
use crate::store;
use crate::toi::ToiTable;

/// One downloaded object joined with its alert-table entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub tic: TicId,
    pub toi: CandidateId,
    /// Archive display name, recovered from the saved-file header comment.
    pub harps_name: Option<String>,
    /// Max data-row count across the object's saved velocity files.
    pub nspectra: usize,
    pub tess_mag: Option<f64>,
    pub depth_mmag: Option<f64>,
    pub planet_radius_re: Option<f64>,
    pub period_days: Option<f64>,
    pub stellar_radius_rs: Option<f64>,
    pub stellar_teff_k: Option<f64>,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Summary {
    rows: Vec<SummaryRow>,
}

impl Summary {
    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// View sorted by TESS magnitude ascending (brightest first); rows
    /// without a magnitude sink to the end.
    pub fn by_brightness(&self) -> Vec<&SummaryRow> {
        let mut view: Vec<&SummaryRow> = self.rows.iter().collect();
        view.sort_by(|a, b| {
            let a_mag = a.tess_mag.unwrap_or(f64::INFINITY);
            let b_mag = b.tess_mag.unwrap_or(f64::INFINITY);
            a_mag.total_cmp(&b_mag)
        });
        view
    }

    /// View sorted by candidate id ascending.
    pub fn by_candidate(&self) -> Vec<&SummaryRow> {
        let mut view: Vec<&SummaryRow> = self.rows.iter().collect();
        view.sort_by_key(|row| row.toi);
        view
    }
}

/// Builds the cross-reference table. `tics` defaults to the `tic*` directory
/// names under `output_root`; each one's saved velocity files supply the
/// spectra count and archive name, and its alert row supplies the rest. A
/// TIC with no alert entry is reported and skipped, not fatal.
pub fn summarize(
    tics: Option<Vec<TicId>>,
    toi_table: &ToiTable,
    output_root: &Utf8Path,
) -> Result<Summary, DiggerError> {
    let dirs: Vec<(TicId, Utf8PathBuf)> = match tics {
        Some(tics) => tics
            .into_iter()
            .map(|tic| (tic, output_root.join(tic.to_string())))
            .collect(),
        None => store::list_tic_dirs(output_root)?,
    };
    if dirs.is_empty() {
        return Err(DiggerError::NoDownloads(output_root.to_owned()));
    }
    info!(objects = dirs.len(), "summarizing downloaded objects");

    let mut rows = Vec::new();
    for (tic, dir) in dirs {
        let (nspectra, harps_name) = count_spectra(&dir)?;
        let alert = match toi_table.by_tic(tic).into_iter().next() {
            Some(alert) => alert.clone(),
            None => {
                warn!(%tic, "no alert-table entry, skipping");
                continue;
            }
        };
        rows.push(SummaryRow {
            tic,
            toi: alert.toi,
            harps_name,
            nspectra,
            tess_mag: alert.tess_mag,
            depth_mmag: alert.depth_mmag,
            planet_radius_re: alert.planet_radius_re,
            period_days: alert.period_days,
            stellar_radius_rs: alert.stellar_radius_rs,
            stellar_teff_k: alert.stellar_teff_k,
            comments: alert.comments,
        });
    }
    Ok(Summary { rows })
}

/// Max row count across the directory's saved `.vels` CSVs (several pipeline
/// variants may exist side by side), plus the archive name recorded in the
/// header of the richest file.
fn count_spectra(dir: &Utf8Path) -> Result<(usize, Option<String>), DiggerError> {
    let mut best: (usize, Option<String>) = (0, None);
    let entries = std::fs::read_dir(dir.as_std_path())
        .map_err(|err| DiggerError::Filesystem(format!("read {dir}: {err}")))?;
    for entry in entries {
        let entry = entry.map_err(|err| DiggerError::Filesystem(err.to_string()))?;
        let path = Utf8PathBuf::from_path_buf(entry.path())
            .map_err(|path| DiggerError::Filesystem(format!("non-utf8 path {}", path.display())))?;
        if path.extension() != Some("vels") {
            continue;
        }
        let (names, series) = download::read_saved(&path)?;
        if series.len() > best.0 {
            best = (series.len(), names.into_iter().next());
        }
    }
    Ok(best)
}

const SELECTED_HEADERS: [&str; 9] = [
    "TIC",
    "TESS Mag",
    "TOI",
    "Depth (mmag)",
    "Planet Radius (R_Earth)",
    "Period (days)",
    "nspectra",
    "HARPS_name",
    "Comments",
];

/// Persists both views: the full table sorted by brightness, and the
/// selected-columns table sorted by candidate id.
pub fn save(summary: &Summary, output_root: &Utf8Path) -> Result<(), DiggerError> {
    let full_path = output_root.join("TOI_with_harps_data.csv");
    let selected_path = output_root.join("TOI_with_harps_data_selected_cols.csv");

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "TIC",
            "TOI",
            "HARPS_name",
            "nspectra",
            "TESS Mag",
            "Depth (mmag)",
            "Planet Radius (R_Earth)",
            "Period (days)",
            "Stellar Radius (R_Sun)",
            "Stellar Eff Temp (K)",
            "Comments",
        ])
        .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
    for row in summary.by_brightness() {
        writer
            .write_record([
                row.tic.value().to_string(),
                row.toi.to_string(),
                row.harps_name.clone().unwrap_or_default(),
                row.nspectra.to_string(),
                fmt_opt(row.tess_mag),
                fmt_opt(row.depth_mmag),
                fmt_opt(row.planet_radius_re),
                fmt_opt(row.period_days),
                fmt_opt(row.stellar_radius_rs),
                fmt_opt(row.stellar_teff_k),
                row.comments.clone().unwrap_or_default(),
            ])
            .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
    store::write_bytes_atomic(&full_path, &bytes)?;
    info!(path = %full_path, "saved summary");

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(SELECTED_HEADERS)
        .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
    for row in summary.by_candidate() {
        writer
            .write_record([
                row.tic.value().to_string(),
                fmt_opt(row.tess_mag),
                row.toi.to_string(),
                fmt_opt(row.depth_mmag),
                fmt_opt(row.planet_radius_re),
                fmt_opt(row.period_days),
                row.nspectra.to_string(),
                row.harps_name.clone().unwrap_or_default(),
                row.comments.clone().unwrap_or_default(),
            ])
            .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
    store::write_bytes_atomic(&selected_path, &bytes)?;
    info!(path = %selected_path, "saved selected-columns summary");
    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
