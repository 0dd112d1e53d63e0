//! Cross-matched source overlay for finder charts, served by the Gaia TAP
//! endpoint. The service itself is a black box; all this module knows is
//! "cone -> list of positions".

use tracing::debug;

use crate::client::ArchiveClient;
use crate::coords::{ARCSEC_PER_DEG, SkyPosition};
use crate::error::DiggerError;

pub const GAIA_TAP_URL: &str = "https://gea.esac.esa.int/tap-server/tap/sync";

pub trait SourceCatalog {
    /// All catalog sources within `radius_arcsec` of `center`.
    fn query_region(
        &self,
        center: &SkyPosition,
        radius_arcsec: f64,
    ) -> Result<Vec<SkyPosition>, DiggerError>;
}

/// Disables the overlay; finder charts render without external sources.
pub struct NoSources;

impl SourceCatalog for NoSources {
    fn query_region(
        &self,
        _center: &SkyPosition,
        _radius_arcsec: f64,
    ) -> Result<Vec<SkyPosition>, DiggerError> {
        Ok(Vec::new())
    }
}

pub struct GaiaCatalog<'a> {
    client: &'a dyn ArchiveClient,
    tap_url: String,
}

impl<'a> GaiaCatalog<'a> {
    pub fn new(client: &'a dyn ArchiveClient) -> Self {
        Self {
            client,
            tap_url: GAIA_TAP_URL.to_string(),
        }
    }

    fn cone_url(&self, center: &SkyPosition, radius_deg: f64) -> String {
        let query = format!(
            "SELECT ra,dec FROM gaiadr2.gaia_source WHERE \
             1=CONTAINS(POINT('ICRS',ra,dec),CIRCLE('ICRS',{:.6},{:.6},{:.6}))",
            center.ra_deg, center.dec_deg, radius_deg
        );
        format!(
            "{}?REQUEST=doQuery&LANG=ADQL&FORMAT=csv&QUERY={}",
            self.tap_url,
            urlencode(&query)
        )
    }
}

impl SourceCatalog for GaiaCatalog<'_> {
    fn query_region(
        &self,
        center: &SkyPosition,
        radius_arcsec: f64,
    ) -> Result<Vec<SkyPosition>, DiggerError> {
        let url = self.cone_url(center, radius_arcsec / ARCSEC_PER_DEG);
        let body = self.client.fetch_text(&url)?;

        let mut reader = csv::Reader::from_reader(body.as_bytes());
        let headers = reader
            .headers()
            .map_err(|err| DiggerError::Http(format!("gaia response: {err}")))?
            .clone();
        let column = |label: &str| {
            headers
                .iter()
                .position(|header| header.eq_ignore_ascii_case(label))
                .ok_or_else(|| DiggerError::Http(format!("gaia response missing '{label}'")))
        };
        let ra_col = column("ra")?;
        let dec_col = column("dec")?;

        let mut sources = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| DiggerError::Http(format!("gaia response: {err}")))?;
            let value = |idx: usize| {
                record
                    .get(idx)
                    .and_then(|field| field.trim().parse::<f64>().ok())
            };
            if let (Some(ra), Some(dec)) = (value(ra_col), value(dec_col)) {
                sources.push(SkyPosition::new(ra.rem_euclid(360.0), dec)?);
            }
        }
        debug!(sources = sources.len(), "gaia cone search");
        Ok(sources)
    }
}

/// Percent-encodes the ADQL query string; only what a TAP query needs.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}
