//! End-to-end pipelines: catalog acquisition, coordinate matching with
//! nearest-neighbor fallback, product retrieval, finder charts, and the
//! downloaded-data summary.

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{self, CatalogRow};
use crate::client::ArchiveClient;
use crate::config::Settings;
use crate::coords::SkyPosition;
use crate::domain::{CandidateId, ProductKind};
use crate::download::{self, Identifiers, ProductOutcome};
use crate::error::DiggerError;
use crate::fov;
use crate::gaia::SourceCatalog;
use crate::matcher::{self, MatchOutcome};
use crate::resolver;
use crate::store::{self, DownloadMetadata};
use crate::summary::{self, Summary};
use crate::toi;

#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub position: SkyPosition,
    /// Single product to retrieve; `None` with `save_all` unset means
    /// match-and-report only.
    pub product: Option<ProductKind>,
    pub clobber: bool,
    /// Persist time-series payloads as tagged CSV.
    pub save_csv: bool,
    /// Retrieve every product the matched row advertises.
    pub save_all: bool,
    /// Render a finder chart next to the downloads.
    pub save_fov: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearestReport {
    pub target: String,
    pub separation_arcsec: f64,
}

#[derive(Debug, Serialize)]
pub struct QueryReport {
    pub query: SkyPosition,
    pub radius_arcsec: f64,
    /// Display names within the query radius, catalog order.
    pub matched: Vec<String>,
    /// Closest-miss fallback when `matched` is empty.
    pub nearest: Option<NearestReport>,
    pub toi: Option<String>,
    pub outcomes: Vec<ProductOutcome>,
    pub chart_path: Option<String>,
}

pub struct App<C: ArchiveClient, S: SourceCatalog> {
    client: C,
    sources: S,
    settings: Settings,
}

impl<C: ArchiveClient, S: SourceCatalog> App<C, S> {
    pub fn new(client: C, sources: S, settings: Settings) -> Self {
        Self {
            client,
            sources,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The query pipeline: catalog -> match -> resolve -> download, with the
    /// finder chart as an optional side branch.
    pub fn query(&self, options: &QueryOptions) -> Result<QueryReport, DiggerError> {
        let catalog = catalog::load_or_fetch(&self.client, &self.settings, options.clobber)?;
        info!(
            query = %options.position,
            radius_arcsec = self.settings.radius_arcsec,
            "matching against {} catalog rows", catalog.len()
        );

        let outcome = matcher::match_position(
            &options.position,
            &catalog,
            self.settings.radius_arcsec,
        )?;

        let mut report = QueryReport {
            query: options.position,
            radius_arcsec: self.settings.radius_arcsec,
            matched: Vec::new(),
            nearest: None,
            toi: None,
            outcomes: Vec::new(),
            chart_path: None,
        };

        let chart_rows: Vec<CatalogRow>;
        match outcome {
            MatchOutcome::Within(rows) => {
                report.matched = rows.iter().map(|row| row.target.clone()).collect();
                if rows.len() > 1 {
                    info!(matches = rows.len(), "multiple objects in radius, using the first");
                }
                let row = rows[0].clone();
                let toi = self.candidate_for(&row, options.clobber)?;
                report.toi = toi.map(|toi| toi.to_string());
                report.outcomes = self.retrieve(&row, toi, options)?;
                chart_rows = rows;
            }
            MatchOutcome::Nearest {
                row,
                separation_arcsec,
            } => {
                info!(
                    target = %row.target,
                    separation_arcsec,
                    "nearest object outside query radius; try a larger radius"
                );
                report.nearest = Some(NearestReport {
                    target: row.target.clone(),
                    separation_arcsec,
                });
                chart_rows = vec![row];
            }
        }

        if options.save_fov {
            report.chart_path = Some(self.render_chart(&options.position, &chart_rows)?);
        }
        Ok(report)
    }

    /// Retrieves the requested product(s) for one matched row.
    fn retrieve(
        &self,
        row: &CatalogRow,
        toi: Option<CandidateId>,
        options: &QueryOptions,
    ) -> Result<Vec<ProductOutcome>, DiggerError> {
        let identifiers = Identifiers::for_row(row, toi);

        if options.save_all {
            return download::download_all(
                &self.client,
                row,
                &identifiers,
                &self.settings.base_url,
                &self.settings.output_dir,
            );
        }

        let Some(kind) = options.product else {
            return Ok(Vec::new());
        };
        let target = resolver::resolve(row, kind, &self.settings.base_url, &self.settings.output_dir)?;
        let persist = options.save_csv || kind.is_plot();
        let fetched = download::fetch_product(&self.client, &target, &identifiers, persist)?;

        if let Some(path) = &fetched.saved_path {
            let mut metadata = DownloadMetadata::new(
                &identifiers.target,
                identifiers.tic,
                identifiers.toi.map(|toi| toi.to_string()),
            );
            metadata.source_urls.push(target.url.clone());
            let dir = store::object_dir(&self.settings.output_dir, &row.object_id());
            store::write_metadata(&store::metadata_path(&dir), &metadata)?;
            Ok(vec![ProductOutcome::Saved {
                kind,
                path: path.to_string(),
                rows: fetched.series.map(|series| series.len()),
            }])
        } else {
            Ok(vec![ProductOutcome::Parsed {
                kind,
                rows: fetched.series.map(|series| series.len()).unwrap_or_default(),
            }])
        }
    }

    /// TOI lookup for a matched row; absence is informational, not fatal.
    /// `clobber` refreshes the alerts cache along with the catalog.
    fn candidate_for(
        &self,
        row: &CatalogRow,
        clobber: bool,
    ) -> Result<Option<CandidateId>, DiggerError> {
        let Some(tic) = row.tic else {
            return Ok(None);
        };
        let table = toi::load_or_fetch(&self.client, &self.settings, clobber)?;
        match toi::query(&table, None, Some(tic)) {
            Ok(alerts) => Ok(alerts.first().map(|alert| alert.toi)),
            Err(DiggerError::CandidateNotFound(_)) => {
                warn!(%tic, "no TOI entry for matched object");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn render_chart(
        &self,
        query: &SkyPosition,
        rows: &[CatalogRow],
    ) -> Result<String, DiggerError> {
        let sources = match self.sources.query_region(query, self.settings.fov_arcsec) {
            Ok(sources) => sources,
            Err(err) => {
                // the overlay is decoration; the chart still renders
                warn!(%err, "cross-match query failed, rendering without sources");
                Vec::new()
            }
        };

        let anchor = &rows[0];
        let dir = store::object_dir(&self.settings.output_dir, &anchor.object_id());
        store::ensure_dir(&dir)?;
        let path: Utf8PathBuf = dir.join(fov::chart_filename(&anchor.target, anchor.tic));
        fov::render(
            &path,
            query,
            rows,
            self.settings.fov_arcsec,
            self.settings.radius_arcsec,
            &sources,
            &anchor.target,
        )?;
        Ok(path.to_string())
    }

    /// The summary pipeline: directory listing -> TOI join -> two saved views.
    pub fn summarize(&self, clobber: bool) -> Result<Summary, DiggerError> {
        let table = toi::load_or_fetch(&self.client, &self.settings, clobber)?;
        let summary = summary::summarize(None, &table, &self.settings.output_dir)?;
        summary::save(&summary, &self.settings.output_dir)?;
        Ok(summary)
    }
}
