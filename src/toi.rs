//! TOI Cache: the TESS planet-candidate alerts table, cached as flat CSV.

use camino::Utf8Path;
use tracing::{debug, info};

use crate::client::ArchiveClient;
use crate::config::Settings;
use crate::domain::{CandidateId, TicId};
use crate::error::DiggerError;
use crate::store;

/// One planet-candidate record. Ephemeris and stellar parameters are
/// optional; the alerts table leaves plenty of cells blank.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRow {
    pub toi: CandidateId,
    pub tic: Option<TicId>,
    pub period_days: Option<f64>,
    pub epoch_bjd: Option<f64>,
    pub duration_hours: Option<f64>,
    pub depth_ppm: Option<f64>,
    pub depth_mmag: Option<f64>,
    pub tess_mag: Option<f64>,
    pub planet_radius_re: Option<f64>,
    pub stellar_radius_rs: Option<f64>,
    pub stellar_teff_k: Option<f64>,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ToiTable {
    rows: Vec<CandidateRow>,
}

impl ToiTable {
    pub fn rows(&self) -> &[CandidateRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows matching a TIC id, in table order.
    pub fn by_tic(&self, tic: TicId) -> Vec<&CandidateRow> {
        self.rows.iter().filter(|row| row.tic == Some(tic)).collect()
    }

    /// Row matching an exact candidate id.
    pub fn by_toi(&self, toi: CandidateId) -> Option<&CandidateRow> {
        self.rows.iter().find(|row| row.toi == toi)
    }
}

/// Loads the alerts table from cache, fetching the CSV endpoint first when
/// the cache is absent or `clobber` is set. The remote payload is persisted
/// byte-for-byte, so cached loads parse the same content.
pub fn load_or_fetch(
    client: &dyn ArchiveClient,
    settings: &Settings,
    clobber: bool,
) -> Result<ToiTable, DiggerError> {
    let path = settings.toi_cache_path();
    if path.as_std_path().exists() && !clobber {
        debug!(%path, "loading TOI cache");
        let content = std::fs::read_to_string(path.as_std_path())
            .map_err(|err| DiggerError::Filesystem(format!("read {path}: {err}")))?;
        return parse_csv(&content, &path);
    }

    info!(url = settings.toi_url, "downloading TOI table");
    let content = client.fetch_text(&settings.toi_url)?;
    let table = parse_csv(&content, &path)?;
    store::write_bytes_atomic(&path, content.as_bytes())?;
    info!(%path, rows = table.len(), "saved TOI cache");
    Ok(table)
}

/// Looks up candidates by TOI or TIC. At least one key is required; an
/// integer-valued TOI already coerced to `.01` by [`CandidateId::from_str`].
/// Results come back sorted by candidate id.
pub fn query(
    table: &ToiTable,
    toi: Option<CandidateId>,
    tic: Option<TicId>,
) -> Result<Vec<CandidateRow>, DiggerError> {
    let mut matched: Vec<CandidateRow> = match (toi, tic) {
        (None, None) => return Err(DiggerError::MissingQuery),
        (_, Some(tic)) => table.by_tic(tic).into_iter().cloned().collect(),
        (Some(toi), None) => table.by_toi(toi).into_iter().cloned().collect(),
    };
    if matched.is_empty() {
        let key = tic
            .map(|tic| tic.to_string())
            .or_else(|| toi.map(|toi| format!("TOI {toi}")))
            .unwrap_or_default();
        return Err(DiggerError::CandidateNotFound(key));
    }
    matched.sort_by_key(|row| row.toi);
    Ok(matched)
}

fn parse_csv(content: &str, path: &Utf8Path) -> Result<ToiTable, DiggerError> {
    let parse_err = |message: String| DiggerError::CacheParse {
        path: path.to_owned(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = reader
        .headers()
        .map_err(|err| parse_err(err.to_string()))?
        .clone();
    let column = |label: &str| headers.iter().position(|header| header == label);
    let toi_col = column("TOI").ok_or_else(|| parse_err("missing column 'TOI'".to_string()))?;
    let tic_col = column("TIC ID");
    let period_col = column("Period (days)");
    let epoch_col = column("Epoch (BJD)");
    let duration_col = column("Duration (hours)");
    let depth_ppm_col = column("Depth (ppm)");
    let depth_mmag_col = column("Depth (mmag)");
    let mag_col = column("TESS Mag");
    let planet_radius_col = column("Planet Radius (R_Earth)");
    let stellar_radius_col = column("Stellar Radius (R_Sun)");
    let teff_col = column("Stellar Eff Temp (K)");
    let comments_col = column("Comments");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| parse_err(err.to_string()))?;
        let text = |col: Option<usize>| -> Option<String> {
            let value = col.and_then(|idx| record.get(idx))?.trim();
            if value.is_empty() || value.eq_ignore_ascii_case("nan") {
                None
            } else {
                Some(value.to_string())
            }
        };
        let number = |col: Option<usize>| text(col).and_then(|value| value.parse::<f64>().ok());

        let toi_text = text(Some(toi_col))
            .ok_or_else(|| parse_err(format!("blank TOI at row {}", rows.len() + 2)))?;
        let toi: CandidateId = toi_text.parse()?;
        let tic = match text(tic_col) {
            Some(value) => Some(value.parse::<TicId>()?),
            None => None,
        };

        rows.push(CandidateRow {
            toi,
            tic,
            period_days: number(period_col),
            epoch_bjd: number(epoch_col),
            duration_hours: number(duration_col),
            depth_ppm: number(depth_ppm_col),
            depth_mmag: number(depth_mmag_col),
            tess_mag: number(mag_col),
            planet_radius_re: number(planet_radius_col),
            stellar_radius_rs: number(stellar_radius_col),
            stellar_teff_k: number(teff_col),
            comments: text(comments_col),
        });
    }
    Ok(ToiTable { rows })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    use super::*;

    pub(crate) const TOI_CSV: &str = "\
TOI,TIC ID,Period (days),Epoch (BJD),Duration (hours),Depth (ppm),Depth (mmag),TESS Mag,Planet Radius (R_Earth),Stellar Radius (R_Sun),Stellar Eff Temp (K),Comments
200.01,410214986,8.13635,2458326.05,3.21,1639,1.78,8.65,2.23,0.87,5550,first alert
144.01,261136679,6.26834,2458331.47,3.00,268,0.29,5.11,2.05,1.1,5990,pi Men c
144.02,261136679,,,,,,5.11,,1.1,5990,
";

    fn table() -> ToiTable {
        parse_csv(TOI_CSV, Utf8Path::new("TOIs.csv")).unwrap()
    }

    #[test]
    fn parses_alert_rows() {
        let table = table();
        assert_eq!(table.len(), 3);
        let row = table.by_toi(CandidateId::new(200, 1)).unwrap();
        assert_eq!(row.tic, Some(TicId(410214986)));
        assert_eq!(row.period_days, Some(8.13635));
        assert_eq!(row.comments.as_deref(), Some("first alert"));

        let blank = table.by_toi(CandidateId::new(144, 2)).unwrap();
        assert_eq!(blank.period_days, None);
        assert_eq!(blank.comments, None);
    }

    #[test]
    fn query_requires_a_key() {
        let err = query(&table(), None, None).unwrap_err();
        assert_matches!(err, DiggerError::MissingQuery);
    }

    #[test]
    fn query_by_tic_sorts_by_candidate_id() {
        let matched = query(&table(), None, Some(TicId(261136679))).unwrap();
        let tois: Vec<String> = matched.iter().map(|row| row.toi.to_string()).collect();
        assert_eq!(tois, vec!["144.01", "144.02"]);
    }

    #[test]
    fn query_miss_is_not_found() {
        let err = query(&table(), None, Some(TicId(1))).unwrap_err();
        assert_matches!(err, DiggerError::CandidateNotFound(_));
    }

    #[test]
    fn malformed_csv_fails_loudly() {
        let err = parse_csv("nope\n1\n", Utf8Path::new("TOIs.csv")).unwrap_err();
        assert_matches!(err, DiggerError::CacheParse { .. });
    }

    #[test]
    fn cache_write_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("TOIs.csv")).unwrap();
        store::write_bytes_atomic(&path, TOI_CSV.as_bytes()).unwrap();
        let reread = std::fs::read_to_string(path.as_std_path()).unwrap();
        assert_eq!(reread, TOI_CSV);
    }
}
