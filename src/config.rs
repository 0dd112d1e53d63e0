//! Explicit run configuration. Every entry point takes a [`Settings`] value;
//! nothing is read from process-wide state after startup.

use std::fs;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::Deserialize;

use crate::error::DiggerError;

pub const DEFAULT_BASE_URL: &str = "http://www.mpia.de/homes/trifonov";
pub const DEFAULT_CATALOG_PAGE: &str = "HARPS_RVBank.html";
pub const DEFAULT_TOI_URL: &str =
    "https://exofop.ipac.caltech.edu/tess/download_toi.php?sort=toi&output=csv";
pub const DEFAULT_RADIUS_ARCSEC: f64 = 60.0;
pub const DEFAULT_FOV_ARCSEC: f64 = 120.0;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the remote archive; product URLs hang off `<base>/<Target>_RVs/`.
    pub base_url: String,
    /// Catalog page filename under `base_url`.
    pub catalog_page: String,
    /// CSV-exporting endpoint for the TESS candidate-alerts table.
    pub toi_url: String,
    /// Directory holding the flat CSV caches (`harps_db.csv`, `TOIs.csv`).
    pub cache_dir: Utf8PathBuf,
    /// Root directory for downloaded products, namespaced per object.
    pub output_dir: Utf8PathBuf,
    /// Query radius for coordinate matching, in arcseconds.
    pub radius_arcsec: f64,
    /// Field-of-view radius for finder charts, in arcseconds.
    pub fov_arcsec: f64,
}

impl Settings {
    pub fn new() -> Result<Self, DiggerError> {
        let cache_dir = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("harps-digger")).ok()
            })
            .ok_or_else(|| {
                DiggerError::Filesystem("unable to resolve cache directory".to_string())
            })?;

        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            catalog_page: DEFAULT_CATALOG_PAGE.to_string(),
            toi_url: DEFAULT_TOI_URL.to_string(),
            cache_dir,
            output_dir: Utf8PathBuf::from("harps_data"),
            radius_arcsec: DEFAULT_RADIUS_ARCSEC,
            fov_arcsec: DEFAULT_FOV_ARCSEC,
        })
    }

    /// Loads overrides from a JSON settings file; missing fields keep the
    /// defaults from [`Settings::new`].
    pub fn from_file(path: &Utf8PathBuf) -> Result<Self, DiggerError> {
        let content = fs::read_to_string(path.as_std_path()).map_err(|err| {
            DiggerError::Filesystem(format!("read settings {path}: {err}"))
        })?;
        let overrides: SettingsOverrides = serde_json::from_str(&content).map_err(|err| {
            DiggerError::CacheParse {
                path: path.clone(),
                message: err.to_string(),
            }
        })?;
        let mut settings = Self::new()?;
        settings.apply(overrides);
        Ok(settings)
    }

    fn apply(&mut self, overrides: SettingsOverrides) {
        if let Some(base_url) = overrides.base_url {
            self.base_url = base_url;
        }
        if let Some(catalog_page) = overrides.catalog_page {
            self.catalog_page = catalog_page;
        }
        if let Some(toi_url) = overrides.toi_url {
            self.toi_url = toi_url;
        }
        if let Some(cache_dir) = overrides.cache_dir {
            self.cache_dir = Utf8PathBuf::from(cache_dir);
        }
        if let Some(output_dir) = overrides.output_dir {
            self.output_dir = Utf8PathBuf::from(output_dir);
        }
        if let Some(radius_arcsec) = overrides.radius_arcsec {
            self.radius_arcsec = radius_arcsec;
        }
        if let Some(fov_arcsec) = overrides.fov_arcsec {
            self.fov_arcsec = fov_arcsec;
        }
    }

    pub fn catalog_url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.catalog_page)
    }

    pub fn catalog_cache_path(&self) -> Utf8PathBuf {
        self.cache_dir.join("harps_db.csv")
    }

    pub fn toi_cache_path(&self) -> Utf8PathBuf {
        self.cache_dir.join("TOIs.csv")
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsOverrides {
    base_url: Option<String>,
    catalog_page: Option<String>,
    toi_url: Option<String>,
    cache_dir: Option<String>,
    output_dir: Option<String>,
    radius_arcsec: Option<f64>,
    fov_arcsec: Option<f64>,
}
