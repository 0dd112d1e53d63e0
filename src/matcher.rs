//! Coordinate Matcher: cross-match a query position against the catalog.

use tracing::debug;

use crate::catalog::{Catalog, CatalogRow};
use crate::coords::SkyPosition;
use crate::error::DiggerError;

/// Outcome of a coordinate query. Exactly one of the two cases holds: a
/// non-empty within-radius set, or the closest miss with its separation.
/// Callers can never confuse an exact match with a near miss.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// All rows within the query radius, in catalog native row order.
    Within(Vec<CatalogRow>),
    /// No row fell within the radius; the single nearest row and its
    /// separation, ties broken by first occurrence.
    Nearest {
        row: CatalogRow,
        separation_arcsec: f64,
    },
}

impl MatchOutcome {
    pub fn is_within(&self) -> bool {
        matches!(self, MatchOutcome::Within(_))
    }
}

/// Finds all catalog rows within `radius_arcsec` of `query` (boundary
/// inclusive), falling back to the single nearest row when none qualify.
/// An empty catalog is a distinct, explicit error.
pub fn match_position(
    query: &SkyPosition,
    catalog: &Catalog,
    radius_arcsec: f64,
) -> Result<MatchOutcome, DiggerError> {
    if catalog.is_empty() {
        return Err(DiggerError::EmptyCatalog);
    }

    let mut within = Vec::new();
    let mut nearest: Option<(usize, f64)> = None;

    for (idx, row) in catalog.rows().iter().enumerate() {
        let separation = query.separation_arcsec(&row.position);
        if separation <= radius_arcsec {
            within.push(row.clone());
        }
        // strict less-than keeps the first occurrence on ties
        if nearest.map(|(_, best)| separation < best).unwrap_or(true) {
            nearest = Some((idx, separation));
        }
    }

    if !within.is_empty() {
        debug!(
            matches = within.len(),
            radius_arcsec, "objects within query radius"
        );
        return Ok(MatchOutcome::Within(within));
    }

    let (idx, separation_arcsec) = nearest.unwrap_or_default();
    let row = catalog.rows()[idx].clone();
    debug!(
        target = %row.target,
        separation_arcsec,
        "no object within radius, returning nearest"
    );
    Ok(MatchOutcome::Nearest {
        row,
        separation_arcsec,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::catalog::CatalogRow;

    fn row(target: &str, ra: f64, dec: f64) -> CatalogRow {
        CatalogRow {
            target: target.to_string(),
            ra_hms: String::new(),
            dec_dms: String::new(),
            position: SkyPosition::new(ra, dec).unwrap(),
            products: Default::default(),
            tic: None,
        }
    }

    #[test]
    fn empty_catalog_is_an_explicit_error() {
        let query = SkyPosition::new(10.0, 10.0).unwrap();
        let err = match_position(&query, &Catalog::default(), 60.0).unwrap_err();
        assert_matches!(err, DiggerError::EmptyCatalog);
    }

    #[test]
    fn close_query_matches_within_radius() {
        let catalog = Catalog::new(vec![row("HD10700", 26.0170, -15.9375)]);
        let query = SkyPosition::new(26.017, -15.9375).unwrap();

        let outcome = match_position(&query, &catalog, 1.0).unwrap();
        let MatchOutcome::Within(rows) = outcome else {
            panic!("expected within-radius match");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].target, "HD10700");
    }

    #[test]
    fn distant_query_falls_back_to_nearest() {
        let catalog = Catalog::new(vec![row("HD10700", 26.0170, -15.9375)]);
        let query = SkyPosition::new(27.0, -15.9375).unwrap();

        let outcome = match_position(&query, &catalog, 1.0).unwrap();
        let MatchOutcome::Nearest {
            row,
            separation_arcsec,
        } = outcome
        else {
            panic!("expected nearest fallback");
        };
        assert_eq!(row.target, "HD10700");
        // 0.983 deg of RA compressed by cos(dec): ~0.9454 deg on the sky
        assert!((separation_arcsec - 3403.0).abs() < 2.0);
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let catalog = Catalog::new(vec![row("A", 10.0, 0.0)]);
        let query = SkyPosition::new(10.0, 0.001).unwrap();
        let separation = query
            .separation_arcsec(&catalog.rows()[0].position);

        let outcome = match_position(&query, &catalog, separation).unwrap();
        assert!(outcome.is_within());
    }

    #[test]
    fn within_preserves_catalog_order_and_nearest_breaks_ties_first() {
        let catalog = Catalog::new(vec![
            row("B", 10.001, 0.0),
            row("A", 10.0, 0.0),
            row("A2", 10.0, 0.0),
        ]);
        let query = SkyPosition::new(10.0, 0.0).unwrap();

        let outcome = match_position(&query, &catalog, 30.0).unwrap();
        let MatchOutcome::Within(rows) = outcome else {
            panic!("expected within-radius match");
        };
        let names: Vec<&str> = rows.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "A2"]);

        let outcome = match_position(&query, &catalog, 0.0).unwrap();
        match outcome {
            // zero radius still admits exact coincidence
            MatchOutcome::Within(rows) => {
                assert_eq!(rows[0].target, "A");
            }
            MatchOutcome::Nearest { row, .. } => {
                assert_eq!(row.target, "A");
            }
        }
    }
}
