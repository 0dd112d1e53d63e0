//! Sky positions, sexagesimal parsing, and great-circle separation.
//!
//! The catalog page publishes RA as sexagesimal hour angle ("01 44 04.08")
//! and Dec as sexagesimal degrees ("-15 56 14.9"); both are converted to
//! decimal degrees once, at cache-population time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DiggerError;

pub const ARCSEC_PER_DEG: f64 = 3600.0;

/// An ICRS sky position in decimal degrees.
///
/// Invariant: `ra_deg` in [0, 360), `dec_deg` in [-90, 90]. Enforced by
/// [`SkyPosition::new`]; construct through it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyPosition {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

impl SkyPosition {
    pub fn new(ra_deg: f64, dec_deg: f64) -> Result<Self, DiggerError> {
        if !(0.0..360.0).contains(&ra_deg)
            || !(-90.0..=90.0).contains(&dec_deg)
            || !ra_deg.is_finite()
            || !dec_deg.is_finite()
        {
            return Err(DiggerError::InvalidCoordinate {
                ra: ra_deg,
                dec: dec_deg,
            });
        }
        Ok(Self { ra_deg, dec_deg })
    }

    /// Great-circle separation to `other`, in degrees.
    ///
    /// Vincenty (atan2) form: numerically stable at the sub-arcsecond
    /// separations the matcher works with, where the plain spherical cosine
    /// law loses precision.
    pub fn separation_deg(&self, other: &SkyPosition) -> f64 {
        let ra1 = self.ra_deg.to_radians();
        let dec1 = self.dec_deg.to_radians();
        let ra2 = other.ra_deg.to_radians();
        let dec2 = other.dec_deg.to_radians();
        let dra = ra2 - ra1;

        let num1 = dec2.cos() * dra.sin();
        let num2 = dec1.cos() * dec2.sin() - dec1.sin() * dec2.cos() * dra.cos();
        let den = dec1.sin() * dec2.sin() + dec1.cos() * dec2.cos() * dra.cos();

        num1.hypot(num2).atan2(den).to_degrees()
    }

    pub fn separation_arcsec(&self, other: &SkyPosition) -> f64 {
        self.separation_deg(other) * ARCSEC_PER_DEG
    }
}

impl fmt::Display for SkyPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.ra_deg, self.dec_deg)
    }
}

/// Parses sexagesimal hour angle ("HH MM SS.s" or "HH:MM:SS.s") into degrees.
pub fn hourangle_to_deg(value: &str) -> Result<f64, DiggerError> {
    let (h, m, s) = split_sexagesimal(value)?;
    if !(0.0..24.0).contains(&h) {
        return Err(DiggerError::InvalidSexagesimal(value.to_string()));
    }
    Ok((h + m / 60.0 + s / 3600.0) * 15.0)
}

/// Parses sexagesimal declination ("+DD MM SS.s" / "-DD MM SS.s") into
/// degrees. The sign on
/// the degree field applies to the whole value, so "-00 30 00" is -0.5.
pub fn dms_to_deg(value: &str) -> Result<f64, DiggerError> {
    let trimmed = value.trim();
    let negative = trimmed.starts_with('-');
    let unsigned = trimmed.trim_start_matches(['-', '+']);
    let (d, m, s) = split_sexagesimal(unsigned)?;
    let magnitude = d + m / 60.0 + s / 3600.0;
    if magnitude > 90.0 {
        return Err(DiggerError::InvalidSexagesimal(value.to_string()));
    }
    Ok(if negative { -magnitude } else { magnitude })
}

fn split_sexagesimal(value: &str) -> Result<(f64, f64, f64), DiggerError> {
    let fields: Vec<&str> = value
        .split([' ', ':'])
        .filter(|field| !field.is_empty())
        .collect();
    if fields.len() != 3 {
        return Err(DiggerError::InvalidSexagesimal(value.to_string()));
    }
    let parse = |field: &str| {
        field
            .parse::<f64>()
            .map_err(|_| DiggerError::InvalidSexagesimal(value.to_string()))
    };
    let (a, b, c) = (parse(fields[0])?, parse(fields[1])?, parse(fields[2])?);
    if !(0.0..60.0).contains(&b) || !(0.0..60.0).contains(&c) {
        return Err(DiggerError::InvalidSexagesimal(value.to_string()));
    }
    Ok((a, b, c))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn position_bounds() {
        assert!(SkyPosition::new(0.0, -90.0).is_ok());
        assert!(SkyPosition::new(359.999, 90.0).is_ok());
        assert_matches!(
            SkyPosition::new(360.0, 0.0),
            Err(DiggerError::InvalidCoordinate { .. })
        );
        assert_matches!(
            SkyPosition::new(10.0, 91.0),
            Err(DiggerError::InvalidCoordinate { .. })
        );
    }

    #[test]
    fn separation_same_point_is_zero() {
        let p = SkyPosition::new(26.017, -15.9375).unwrap();
        assert!(p.separation_deg(&p).abs() < 1e-12);
    }

    #[test]
    fn separation_quarter_circle() {
        let a = SkyPosition::new(0.0, 0.0).unwrap();
        let b = SkyPosition::new(90.0, 0.0).unwrap();
        assert_relative_eq!(a.separation_deg(&b), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn separation_shrinks_with_declination() {
        // one degree of RA at dec -15.9375 spans ~cos(dec) degrees on the sky
        let a = SkyPosition::new(26.0, -15.9375).unwrap();
        let b = SkyPosition::new(27.0, -15.9375).unwrap();
        let expected = 0.96156f64;
        assert_relative_eq!(a.separation_deg(&b), expected, epsilon = 1e-4);
    }

    #[test]
    fn hourangle_parsing() {
        // tau Ceti: 01 44 04.08 -> 26.017 deg
        let ra = hourangle_to_deg("01 44 04.08").unwrap();
        assert_relative_eq!(ra, 26.017, epsilon = 1e-3);

        let colons = hourangle_to_deg("01:44:04.08").unwrap();
        assert_relative_eq!(ra, colons, epsilon = 1e-12);
    }

    #[test]
    fn dms_parsing_keeps_sign() {
        let dec = dms_to_deg("-15 56 14.9").unwrap();
        assert_relative_eq!(dec, -15.9375, epsilon = 1e-3);

        let south_of_zero = dms_to_deg("-00 30 00").unwrap();
        assert_relative_eq!(south_of_zero, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn sexagesimal_rejects_garbage() {
        assert_matches!(
            hourangle_to_deg("25 00 00"),
            Err(DiggerError::InvalidSexagesimal(_))
        );
        assert_matches!(
            dms_to_deg("12 61 00"),
            Err(DiggerError::InvalidSexagesimal(_))
        );
        assert_matches!(
            hourangle_to_deg("not a coordinate"),
            Err(DiggerError::InvalidSexagesimal(_))
        );
    }
}
