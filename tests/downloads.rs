use std::path::Path;
use std::sync::Mutex;

use camino::Utf8PathBuf;

use harps_digger::catalog::{CatalogRow, PRODUCT_COUNT};
use harps_digger::client::ArchiveClient;
use harps_digger::coords::SkyPosition;
use harps_digger::domain::{ProductKind, TicId};
use harps_digger::download::{self, Identifiers, ProductOutcome};
use harps_digger::error::DiggerError;

const VELS: &str = "2453005.5 10.5 0.9\n2453006.5 -3.25 1.1\n";

/// Serves one velocity body, failing on a chosen URL substring.
struct VelsClient {
    fail_on: Option<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl VelsClient {
    fn new(fail_on: Option<&'static str>) -> Self {
        Self {
            fail_on,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ArchiveClient for VelsClient {
    fn fetch_text(&self, url: &str) -> Result<String, DiggerError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(pattern) = self.fail_on {
            if url.contains(pattern) {
                return Err(DiggerError::HttpStatus {
                    status: 500,
                    url: url.to_string(),
                });
            }
        }
        Ok(VELS.to_string())
    }

    fn download_file(&self, url: &str, destination: &Path) -> Result<(), DiggerError> {
        self.calls.lock().unwrap().push(url.to_string());
        std::fs::write(destination, b"%PDF-1.4 stub")
            .map_err(|err| DiggerError::Filesystem(err.to_string()))
    }
}

/// A row advertising all six velocity products (no plot). Filenames carry
/// the kind's slot index so a single one can be targeted for failure.
fn six_vels_row() -> CatalogRow {
    let mut products: [Option<String>; PRODUCT_COUNT] = Default::default();
    for kind in ProductKind::ALL {
        if kind.is_plot() {
            continue;
        }
        products[kind.slot()] = Some(format!("HD10700_k{}.vels", kind.slot()));
    }
    CatalogRow {
        target: "HD10700".to_string(),
        ra_hms: "01 44 04.08".to_string(),
        dec_dms: "-15 56 14.9".to_string(),
        position: SkyPosition::new(26.017, -15.9375).unwrap(),
        products,
        tic: Some(TicId(261136679)),
    }
}

fn output_root(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().join("harps_data")).unwrap()
}

#[test]
fn batch_with_one_failure_saves_the_other_five() {
    let temp = tempfile::tempdir().unwrap();
    let root = output_root(&temp);
    let row = six_vels_row();
    let identifiers = Identifiers::for_row(&row, None);
    // third available velocity kind
    let client = VelsClient::new(Some("_k3.vels"));

    let outcomes =
        download::download_all(&client, &row, &identifiers, "http://archive.test", &root)
            .unwrap();

    assert_eq!(outcomes.len(), ProductKind::ALL.len());
    let saved = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, ProductOutcome::Saved { .. }))
        .count();
    let failed = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, ProductOutcome::Failed { .. }))
        .count();
    let skipped = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, ProductOutcome::Skipped { .. }))
        .count();
    assert_eq!(saved, 5);
    assert_eq!(failed, 1);
    assert_eq!(skipped, 1); // the plot slot is empty

    // the failure names its URL
    let failure = outcomes
        .iter()
        .find_map(|outcome| match outcome {
            ProductOutcome::Failed { url, .. } => url.as_deref(),
            _ => None,
        })
        .unwrap();
    assert!(failure.ends_with("HD10700_k3.vels"));

    // five tagged files plus metadata landed on disk
    let dir = root.join("tic261136679");
    let vels_files = std::fs::read_dir(dir.as_std_path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "vels"))
        .count();
    assert_eq!(vels_files, 5);
    assert!(dir.join("metadata.json").as_std_path().exists());
}

#[test]
fn empty_row_skips_everything_without_network() {
    let temp = tempfile::tempdir().unwrap();
    let root = output_root(&temp);
    let mut row = six_vels_row();
    row.products = Default::default();
    let identifiers = Identifiers::for_row(&row, None);
    let client = VelsClient::new(None);

    let outcomes =
        download::download_all(&client, &row, &identifiers, "http://archive.test", &root)
            .unwrap();

    assert!(outcomes
        .iter()
        .all(|outcome| matches!(outcome, ProductOutcome::Skipped { .. })));
    assert_eq!(client.calls(), 0);
    assert!(!root.as_std_path().exists());
}

#[test]
fn persisted_series_round_trips() {
    let temp = tempfile::tempdir().unwrap();
    let root = output_root(&temp);
    let row = six_vels_row();
    let identifiers = Identifiers::for_row(&row, None);
    let client = VelsClient::new(None);

    download::download_all(&client, &row, &identifiers, "http://archive.test", &root).unwrap();

    let path = root.join("tic261136679/tic261136679_HD10700_k1.vels");
    let (names, series) = download::read_saved(&path).unwrap();
    assert_eq!(names, vec!["HD10700", "tic261136679"]);
    assert_eq!(series.len(), 2);
    assert_eq!(series.points()[0].bjd, 2453005.5);
    assert_eq!(series.points()[1].rv, -3.25);
}
