use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::Utf8PathBuf;

use harps_digger::catalog;
use harps_digger::client::ArchiveClient;
use harps_digger::config::Settings;
use harps_digger::domain::ProductKind;
use harps_digger::error::DiggerError;
use harps_digger::toi;

/// One fixed body for every URL, with a request counter.
struct CountingClient {
    body: String,
    calls: AtomicUsize,
}

impl CountingClient {
    fn new(body: String) -> Self {
        Self {
            body,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArchiveClient for CountingClient {
    fn fetch_text(&self, _url: &str) -> Result<String, DiggerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.clone())
    }

    fn download_file(&self, _url: &str, destination: &Path) -> Result<(), DiggerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::write(destination, self.body.as_bytes())
            .map_err(|err| DiggerError::Filesystem(err.to_string()))
    }
}

fn catalog_page() -> String {
    let product_headers: String = ProductKind::ALL
        .iter()
        .map(|kind| format!("<th>{}</th>", kind.column_label()))
        .collect();
    format!(
        "<table>\
         <tr><th>Target</th><th>RA</th><th>DEC</th>{product_headers}<th>ticid</th></tr>\
         <tr><td>HD10700</td><td>01 44 04.08</td><td>-15 56 14.9</td>\
         <td>HD10700.pdf</td><td>HD10700_drs.vels</td><td>nan</td>\
         <td>nan</td><td>nan</td><td>nan</td><td>nan</td>\
         <td>261136679</td></tr>\
         </table>"
    )
}

const TOI_CSV: &str = "\
TOI,TIC ID,Period (days),Epoch (BJD),Duration (hours),Depth (ppm),Depth (mmag),TESS Mag,Planet Radius (R_Earth),Stellar Radius (R_Sun),Stellar Eff Temp (K),Comments
144.01,261136679,6.26834,2458331.47,3.00,268,0.29,5.11,2.05,1.1,5990,
";

fn test_settings(temp: &tempfile::TempDir) -> Settings {
    let mut settings = Settings::new().unwrap();
    settings.cache_dir = Utf8PathBuf::from_path_buf(temp.path().join("cache")).unwrap();
    settings.output_dir = Utf8PathBuf::from_path_buf(temp.path().join("harps_data")).unwrap();
    settings
}

#[test]
fn catalog_is_fetched_once_then_served_from_cache() {
    let temp = tempfile::tempdir().unwrap();
    let settings = test_settings(&temp);
    let client = CountingClient::new(catalog_page());

    let first = catalog::load_or_fetch(&client, &settings, false).unwrap();
    assert_eq!(client.calls(), 1);
    assert!(settings.catalog_cache_path().as_std_path().exists());

    let second = catalog::load_or_fetch(&client, &settings, false).unwrap();
    assert_eq!(client.calls(), 1);
    assert_eq!(second.rows(), first.rows());
}

#[test]
fn clobber_forces_a_catalog_refetch() {
    let temp = tempfile::tempdir().unwrap();
    let settings = test_settings(&temp);
    let client = CountingClient::new(catalog_page());

    catalog::load_or_fetch(&client, &settings, false).unwrap();
    catalog::load_or_fetch(&client, &settings, true).unwrap();
    assert_eq!(client.calls(), 2);
}

#[test]
fn toi_table_is_fetched_once_then_served_from_cache() {
    let temp = tempfile::tempdir().unwrap();
    let settings = test_settings(&temp);
    let client = CountingClient::new(TOI_CSV.to_string());

    let first = toi::load_or_fetch(&client, &settings, false).unwrap();
    assert_eq!(client.calls(), 1);

    // the remote payload is persisted byte-for-byte
    let cached = std::fs::read_to_string(settings.toi_cache_path().as_std_path()).unwrap();
    assert_eq!(cached, TOI_CSV);

    let second = toi::load_or_fetch(&client, &settings, false).unwrap();
    assert_eq!(client.calls(), 1);
    assert_eq!(second.rows(), first.rows());
}

#[test]
fn clobber_forces_a_toi_refetch() {
    let temp = tempfile::tempdir().unwrap();
    let settings = test_settings(&temp);
    let client = CountingClient::new(TOI_CSV.to_string());

    toi::load_or_fetch(&client, &settings, false).unwrap();
    toi::load_or_fetch(&client, &settings, true).unwrap();
    assert_eq!(client.calls(), 2);
}
