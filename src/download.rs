//! Downloader: fetches resolved products, parses velocity time series, and
//! persists them with a provenance header.

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::CatalogRow;
use crate::client::ArchiveClient;
use crate::domain::{CandidateId, ProductKind, TicId};
use crate::error::DiggerError;
use crate::resolver::{self, DownloadTarget};
use crate::store::{self, DownloadMetadata};

/// One radial-velocity measurement epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RvPoint {
    pub bjd: f64,
    pub rv: f64,
    pub rv_err: f64,
}

/// Parsed contents of a `.vels` time-series file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RvSeries {
    points: Vec<RvPoint>,
}

impl RvSeries {
    pub fn points(&self) -> &[RvPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Parses the remote whitespace-delimited format: one epoch per line,
    /// at least three numeric fields (BJD, RV, RV error; extra diagnostic
    /// columns are ignored). Comment and blank lines are skipped.
    pub fn parse(body: &str, url: &str) -> Result<Self, DiggerError> {
        let mut points = Vec::new();
        for (lineno, line) in body.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields: Vec<f64> = trimmed
                .split([' ', '\t', ','])
                .filter(|field| !field.is_empty())
                .map(|field| field.parse::<f64>())
                .collect::<Result<_, _>>()
                .map_err(|err| DiggerError::VelsParse {
                    url: url.to_string(),
                    message: format!("line {}: {err}", lineno + 1),
                })?;
            if fields.len() < 3 {
                return Err(DiggerError::VelsParse {
                    url: url.to_string(),
                    message: format!("line {}: expected >= 3 columns, got {}", lineno + 1, fields.len()),
                });
            }
            points.push(RvPoint {
                bjd: fields[0],
                rv: fields[1],
                rv_err: fields[2],
            });
        }
        if points.is_empty() {
            return Err(DiggerError::VelsParse {
                url: url.to_string(),
                message: "no data rows".to_string(),
            });
        }
        Ok(Self { points })
    }

    /// Renders the persisted CSV form: one comment line listing every known
    /// identifier for the source object, then bare data rows with no column
    /// header. Float `Display` keeps the shortest round-trippable form.
    pub fn to_tagged_csv(&self, identifiers: &Identifiers) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&identifiers.header_line());
        out.push('\n');
        for point in &self.points {
            out.push_str(&format!("{},{},{}\n", point.bjd, point.rv, point.rv_err));
        }
        out.into_bytes()
    }
}

/// Reads back a file saved by [`RvSeries::to_tagged_csv`]: the identifier
/// names from the comment header, plus the re-parsed series.
pub fn read_saved(path: &Utf8Path) -> Result<(Vec<String>, RvSeries), DiggerError> {
    let content = std::fs::read_to_string(path.as_std_path())
        .map_err(|err| DiggerError::Filesystem(format!("read {path}: {err}")))?;
    let names = content
        .lines()
        .next()
        .and_then(|line| line.strip_prefix('#'))
        .map(|line| {
            line.split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let series = RvSeries::parse(&content, path.as_str())?;
    Ok((names, series))
}

/// Every identifier known for a downloaded object; drives both the saved-file
/// header comment and the per-object metadata record.
#[derive(Debug, Clone, Default)]
pub struct Identifiers {
    pub target: String,
    pub tic: Option<TicId>,
    pub toi: Option<CandidateId>,
}

impl Identifiers {
    pub fn for_row(row: &CatalogRow, toi: Option<CandidateId>) -> Self {
        Self {
            target: row.target.clone(),
            tic: row.tic,
            toi,
        }
    }

    fn header_line(&self) -> String {
        let mut names = vec![self.target.clone()];
        if let Some(tic) = self.tic {
            names.push(tic.to_string());
        }
        if let Some(toi) = self.toi {
            names.push(format!("toi{toi}"));
        }
        format!("# {}", names.join(", "))
    }
}

/// A completed single-product fetch.
#[derive(Debug)]
pub struct FetchedProduct {
    pub target: DownloadTarget,
    /// Parsed payload for time-series products; `None` for plots.
    pub series: Option<RvSeries>,
    /// Where the payload landed, when it was persisted.
    pub saved_path: Option<Utf8PathBuf>,
}

/// Fetches one resolved product. Time-series products are parsed in memory
/// and optionally persisted as tagged CSV; plot products are streamed to
/// disk unconditionally. Errors propagate: a single-product request has
/// nothing to return on failure.
pub fn fetch_product(
    client: &dyn ArchiveClient,
    target: &DownloadTarget,
    identifiers: &Identifiers,
    persist_csv: bool,
) -> Result<FetchedProduct, DiggerError> {
    if target.kind.is_plot() {
        let parent = target.local_path.parent().ok_or_else(|| {
            DiggerError::Filesystem(format!("no parent directory for {}", target.local_path))
        })?;
        store::ensure_dir(parent)?;
        let temp = tempfile::Builder::new()
            .prefix(".harps-digger")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
        client.download_file(&target.url, temp.path())?;
        temp.persist(target.local_path.as_std_path())
            .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
        info!(path = %target.local_path, "saved plot");
        return Ok(FetchedProduct {
            target: target.clone(),
            series: None,
            saved_path: Some(target.local_path.clone()),
        });
    }

    let body = client.fetch_text(&target.url)?;
    let series = RvSeries::parse(&body, &target.url)?;
    let saved_path = if persist_csv {
        store::write_bytes_atomic(&target.local_path, &series.to_tagged_csv(identifiers))?;
        info!(path = %target.local_path, rows = series.len(), "saved velocities");
        Some(target.local_path.clone())
    } else {
        None
    };
    Ok(FetchedProduct {
        target: target.clone(),
        series: Some(series),
        saved_path,
    })
}

/// Per-product result of a batch download.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProductOutcome {
    Saved {
        kind: ProductKind,
        path: String,
        rows: Option<usize>,
    },
    /// Fetched and parsed in memory, not persisted.
    Parsed { kind: ProductKind, rows: usize },
    /// The catalog row has no file for this kind.
    Skipped { kind: ProductKind },
    Failed {
        kind: ProductKind,
        url: Option<String>,
        message: String,
    },
}

/// Downloads every product the catalog row advertises, sequentially. One
/// item's failure is logged with its URL and recorded, never raised; the
/// batch always runs to completion. Writes the object's provenance metadata
/// next to whatever was saved.
pub fn download_all(
    client: &dyn ArchiveClient,
    row: &CatalogRow,
    identifiers: &Identifiers,
    base_url: &str,
    output_root: &Utf8Path,
) -> Result<Vec<ProductOutcome>, DiggerError> {
    let mut outcomes = Vec::with_capacity(ProductKind::ALL.len());
    let mut metadata = DownloadMetadata::new(
        &identifiers.target,
        identifiers.tic,
        identifiers.toi.map(|toi| toi.to_string()),
    );

    for kind in ProductKind::ALL {
        let target = match resolver::resolve(row, kind, base_url, output_root) {
            Ok(target) => target,
            Err(DiggerError::ProductNotAvailable { .. }) => {
                outcomes.push(ProductOutcome::Skipped { kind });
                continue;
            }
            Err(err) => {
                warn!(kind = %kind, %err, "resolution failed");
                outcomes.push(ProductOutcome::Failed {
                    kind,
                    url: None,
                    message: err.to_string(),
                });
                continue;
            }
        };

        match fetch_product(client, &target, identifiers, true) {
            Ok(fetched) => {
                metadata.source_urls.push(target.url.clone());
                outcomes.push(ProductOutcome::Saved {
                    kind,
                    path: target.local_path.to_string(),
                    rows: fetched.series.map(|series| series.len()),
                });
            }
            Err(err) => {
                warn!(url = %target.url, %err, "download failed, not saved");
                outcomes.push(ProductOutcome::Failed {
                    kind,
                    url: Some(target.url.clone()),
                    message: err.to_string(),
                });
            }
        }
    }

    if outcomes
        .iter()
        .any(|outcome| matches!(outcome, ProductOutcome::Saved { .. }))
    {
        let dir = store::object_dir(output_root, &row.object_id());
        store::write_metadata(&store::metadata_path(&dir), &metadata)?;
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const VELS: &str = "2453005.5 10.5 0.9\n2453006.5 -3.25 1.1\n\n2453007.5 0.125 0.8\n";

    #[test]
    fn parses_whitespace_delimited_vels() {
        let series = RvSeries::parse(VELS, "http://example/vels").unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.points()[1].rv, -3.25);
    }

    #[test]
    fn parse_rejects_short_and_non_numeric_rows() {
        let err = RvSeries::parse("2453005.5 10.5\n", "u").unwrap_err();
        assert_matches!(err, DiggerError::VelsParse { .. });

        let err = RvSeries::parse("2453005.5 ten 0.9\n", "u").unwrap_err();
        assert_matches!(err, DiggerError::VelsParse { .. });

        let err = RvSeries::parse("# only a comment\n", "u").unwrap_err();
        assert_matches!(err, DiggerError::VelsParse { .. });
    }

    #[test]
    fn tagged_csv_round_trip() {
        let series = RvSeries::parse(VELS, "u").unwrap();
        let identifiers = Identifiers {
            target: "HD10700".to_string(),
            tic: Some(TicId(261136679)),
            toi: Some(CandidateId::new(200, 1)),
        };

        let dir = tempfile::tempdir().unwrap();
        let path =
            camino::Utf8PathBuf::from_path_buf(dir.path().join("hd10700.vels")).unwrap();
        store::write_bytes_atomic(&path, &series.to_tagged_csv(&identifiers)).unwrap();

        let content = std::fs::read_to_string(path.as_std_path()).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("# HD10700, tic261136679, toi200.01"));
        // data rows carry no column header
        assert_eq!(lines.next(), Some("2453005.5,10.5,0.9"));

        let (names, reread) = read_saved(&path).unwrap();
        assert_eq!(names, vec!["HD10700", "tic261136679", "toi200.01"]);
        assert_eq!(reread, series);
    }
}
