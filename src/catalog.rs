//! Catalog Cache: the local CSV snapshot of the remote HARPS RVBank table.
//!
//! `load_or_fetch` is the only entry point: scrape-and-persist when the cache
//! file is absent (or clobbered), plain CSV read otherwise. Decimal-degree
//! coordinates are derived once, at scrape time, and stored as two extra
//! columns not present in the remote source.

use std::fs;

use camino::Utf8Path;
use tracing::{debug, info};

use crate::client::ArchiveClient;
use crate::config::Settings;
use crate::coords::{self, SkyPosition};
use crate::domain::{ObjectId, ProductKind, TicId};
use crate::error::DiggerError;
use crate::html;
use crate::store;

pub const PRODUCT_COUNT: usize = ProductKind::ALL.len();

/// One observed stellar target. Immutable after parse; a re-fetch builds a
/// whole new snapshot rather than mutating rows.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    /// Archive display name, unique within a snapshot.
    pub target: String,
    /// Raw sexagesimal strings as published, kept for cache fidelity.
    pub ra_hms: String,
    pub dec_dms: String,
    /// Derived decimal-degree position.
    pub position: SkyPosition,
    /// Declared filename per product kind, indexed by [`ProductKind::slot`].
    pub products: [Option<String>; PRODUCT_COUNT],
    /// Secondary cross-catalog identifier, when the snapshot carries one.
    pub tic: Option<TicId>,
}

impl CatalogRow {
    pub fn product(&self, kind: ProductKind) -> Option<&str> {
        self.products[kind.slot()].as_deref()
    }

    pub fn object_id(&self) -> ObjectId {
        match self.tic {
            Some(tic) => ObjectId::Tic(tic),
            None => ObjectId::Name(self.target.clone()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    rows: Vec<CatalogRow>,
}

impl Catalog {
    pub fn new(rows: Vec<CatalogRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[CatalogRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Loads the catalog from the CSV cache, scraping the remote page first if
/// the cache is absent or `clobber` is set. Creates the cache directory as a
/// side effect.
pub fn load_or_fetch(
    client: &dyn ArchiveClient,
    settings: &Settings,
    clobber: bool,
) -> Result<Catalog, DiggerError> {
    let path = settings.catalog_cache_path();
    if path.as_std_path().exists() && !clobber {
        debug!(%path, "loading catalog cache");
        return load_cache(&path);
    }

    let url = settings.catalog_url();
    info!(url, "downloading catalog");
    let page = client.fetch_text(&url)?;
    let catalog = parse_page(&page)?;

    fs::create_dir_all(settings.cache_dir.as_std_path())
        .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
    save_cache(&catalog, &path)?;
    info!(%path, rows = catalog.len(), "saved catalog cache");
    Ok(catalog)
}

/// Parses the archive's HTML page into a catalog snapshot.
pub fn parse_page(page: &str) -> Result<Catalog, DiggerError> {
    let table = html::extract_first_table(page)?;

    let column = |label: &str| -> Result<usize, DiggerError> {
        table
            .headers
            .iter()
            .position(|header| header == label)
            .ok_or_else(|| DiggerError::HtmlParse(format!("missing column '{label}'")))
    };

    let target_col = column("Target")?;
    let ra_col = column("RA")?;
    let dec_col = column("DEC")?;
    let mut product_cols = [0usize; PRODUCT_COUNT];
    for kind in ProductKind::ALL {
        product_cols[kind.slot()] = column(kind.column_label())?;
    }
    // secondary id column is optional in the remote snapshot
    let tic_col = table.headers.iter().position(|header| header == "ticid");

    let mut rows = Vec::with_capacity(table.rows.len());
    for cells in &table.rows {
        let target = cells[target_col].clone();
        let ra_hms = cells[ra_col].clone();
        let dec_dms = cells[dec_col].clone();
        let ra_deg = coords::hourangle_to_deg(&ra_hms)?;
        let dec_deg = coords::dms_to_deg(&dec_dms)?;
        let position = SkyPosition::new(ra_deg.rem_euclid(360.0), dec_deg)?;

        let mut products: [Option<String>; PRODUCT_COUNT] = Default::default();
        for kind in ProductKind::ALL {
            products[kind.slot()] = present(&cells[product_cols[kind.slot()]]);
        }
        let tic = match tic_col.and_then(|col| present(&cells[col])) {
            Some(value) => Some(value.parse::<TicId>()?),
            None => None,
        };

        rows.push(CatalogRow {
            target,
            ra_hms,
            dec_dms,
            position,
            products,
            tic,
        });
    }
    Ok(Catalog::new(rows))
}

/// Textual missing-value sentinels in the source become typed `None` here;
/// everything downstream runs on plain null-checks.
fn present(cell: &str) -> Option<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") || trimmed == "-" {
        None
    } else {
        Some(trimmed.to_string())
    }
}

const FIXED_HEADERS: [&str; 3] = ["Target", "RA", "DEC"];
const DERIVED_HEADERS: [&str; 3] = ["ticid", "RA_deg", "DEC_deg"];

/// Persists the snapshot atomically: header row, one row per target, product
/// columns in catalog order, then the ticid and the two derived degree
/// columns appended after the source columns.
pub fn save_cache(catalog: &Catalog, path: &Utf8Path) -> Result<(), DiggerError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut headers: Vec<&str> = FIXED_HEADERS.to_vec();
    headers.extend(ProductKind::ALL.iter().map(|kind| kind.column_label()));
    headers.extend(DERIVED_HEADERS);
    writer
        .write_record(&headers)
        .map_err(|err| DiggerError::Filesystem(err.to_string()))?;

    for row in catalog.rows() {
        let mut record: Vec<String> = vec![
            row.target.clone(),
            row.ra_hms.clone(),
            row.dec_dms.clone(),
        ];
        for kind in ProductKind::ALL {
            record.push(row.product(kind).unwrap_or_default().to_string());
        }
        record.push(
            row.tic
                .map(|tic| tic.value().to_string())
                .unwrap_or_default(),
        );
        // shortest round-trippable float form; a truncated precision would
        // make the reloaded table differ from the one just fetched
        record.push(row.position.ra_deg.to_string());
        record.push(row.position.dec_deg.to_string());
        writer
            .write_record(&record)
            .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| DiggerError::Filesystem(err.to_string()))?;
    store::write_bytes_atomic(path, &bytes)
}

/// Reads a previously saved cache file. Any malformed row fails loudly; a
/// partial catalog is never returned.
pub fn load_cache(path: &Utf8Path) -> Result<Catalog, DiggerError> {
    let parse_err = |message: String| DiggerError::CacheParse {
        path: path.to_owned(),
        message,
    };

    let mut reader = csv::Reader::from_path(path.as_std_path())
        .map_err(|err| parse_err(err.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|err| parse_err(err.to_string()))?
        .clone();
    let column = |label: &str| -> Result<usize, DiggerError> {
        headers
            .iter()
            .position(|header| header == label)
            .ok_or_else(|| parse_err(format!("missing column '{label}'")))
    };

    let target_col = column("Target")?;
    let ra_col = column("RA")?;
    let dec_col = column("DEC")?;
    let tic_col = column("ticid")?;
    let ra_deg_col = column("RA_deg")?;
    let dec_deg_col = column("DEC_deg")?;
    let mut product_cols = [0usize; PRODUCT_COUNT];
    for kind in ProductKind::ALL {
        product_cols[kind.slot()] = column(kind.column_label())?;
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|err| parse_err(err.to_string()))?;
        let field = |idx: usize| -> Result<&str, DiggerError> {
            record
                .get(idx)
                .ok_or_else(|| parse_err(format!("short record at line {}", line + 2)))
        };

        let ra_deg = field(ra_deg_col)?
            .parse::<f64>()
            .map_err(|err| parse_err(format!("RA_deg: {err}")))?;
        let dec_deg = field(dec_deg_col)?
            .parse::<f64>()
            .map_err(|err| parse_err(format!("DEC_deg: {err}")))?;
        let position = SkyPosition::new(ra_deg, dec_deg)?;

        let mut products: [Option<String>; PRODUCT_COUNT] = Default::default();
        for kind in ProductKind::ALL {
            products[kind.slot()] = present(field(product_cols[kind.slot()])?);
        }
        let tic = match present(field(tic_col)?) {
            Some(value) => Some(value.parse::<TicId>()?),
            None => None,
        };

        rows.push(CatalogRow {
            target: field(target_col)?.to_string(),
            ra_hms: field(ra_col)?.to_string(),
            dec_dms: field(dec_col)?.to_string(),
            position,
            products,
            tic,
        });
    }
    Ok(Catalog::new(rows))
}
