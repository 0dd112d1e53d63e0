use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DiggerError;

/// The seven downloadable artifact categories the archive exposes per target.
///
/// `column_label` strings are case- and text-exact copies of the catalog's
/// HTML column headers, quirks included (note the missing space before the
/// parenthesis in the post-upgrade mlc label).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductKind {
    DataProductPlots,
    PreUpgradeDrs,
    PostUpgradeDrs,
    PreUpgradeStandardServal,
    PostUpgradeStandardServal,
    PreUpgradeMlcServal,
    PostUpgradeMlcServal,
}

impl ProductKind {
    /// All kinds in the catalog's native column order.
    pub const ALL: [ProductKind; 7] = [
        ProductKind::DataProductPlots,
        ProductKind::PreUpgradeDrs,
        ProductKind::PostUpgradeDrs,
        ProductKind::PreUpgradeStandardServal,
        ProductKind::PostUpgradeStandardServal,
        ProductKind::PreUpgradeMlcServal,
        ProductKind::PostUpgradeMlcServal,
    ];

    pub fn column_label(&self) -> &'static str {
        match self {
            ProductKind::DataProductPlots => "Data product plots",
            ProductKind::PreUpgradeDrs => "Pre-upgrade DRS",
            ProductKind::PostUpgradeDrs => "Post-upgrade DRS",
            ProductKind::PreUpgradeStandardServal => "Pre-upgrade standard SERVAL",
            ProductKind::PostUpgradeStandardServal => "Post-upgrade standard SERVAL",
            ProductKind::PreUpgradeMlcServal => "Pre-upgrade mlc SERVAL (use these)",
            ProductKind::PostUpgradeMlcServal => "Post-upgrade mlc SERVAL(use these)",
        }
    }

    /// Extension the catalog's declared filename must carry for this kind.
    pub fn expected_extension(&self) -> &'static str {
        match self {
            ProductKind::DataProductPlots => "pdf",
            _ => "vels",
        }
    }

    /// Index of this kind's availability slot in [`crate::catalog::CatalogRow`].
    pub fn slot(&self) -> usize {
        Self::ALL
            .iter()
            .position(|kind| kind == self)
            .unwrap_or_default()
    }

    pub fn is_plot(&self) -> bool {
        matches!(self, ProductKind::DataProductPlots)
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column_label())
    }
}

impl FromStr for ProductKind {
    type Err = DiggerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.column_label() == trimmed)
            .ok_or_else(|| DiggerError::UnknownProduct(value.to_string()))
    }
}

/// Numeric TESS Input Catalog identifier, used to namespace downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TicId(pub u64);

impl TicId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tic{}", self.0)
    }
}

impl FromStr for TicId {
    type Err = DiggerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let digits = value.trim().trim_start_matches("tic").trim();
        digits
            .parse::<u64>()
            .map(TicId)
            .map_err(|_| DiggerError::InvalidTicId(value.to_string()))
    }
}

/// "host.planet" candidate code from the TESS alerts table, e.g. `1234.01`.
/// The two-digit fractional part names a specific planet around the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId {
    pub host: u32,
    pub planet: u8,
}

impl CandidateId {
    pub fn new(host: u32, planet: u8) -> Self {
        Self { host, planet }
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.host, self.planet)
    }
}

impl FromStr for CandidateId {
    type Err = DiggerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed.split_once('.') {
            None => {
                // bare host number means the first planet
                let host = trimmed
                    .parse::<u32>()
                    .map_err(|_| DiggerError::InvalidCandidateId(value.to_string()))?;
                Ok(Self { host, planet: 1 })
            }
            Some((host, planet)) => {
                if planet.len() != 2 {
                    return Err(DiggerError::InvalidCandidateId(value.to_string()));
                }
                let host = host
                    .parse::<u32>()
                    .map_err(|_| DiggerError::InvalidCandidateId(value.to_string()))?;
                let planet = planet
                    .parse::<u8>()
                    .map_err(|_| DiggerError::InvalidCandidateId(value.to_string()))?;
                Ok(Self { host, planet })
            }
        }
    }
}

/// How a downloaded object is namespaced on disk: by TIC id when the catalog
/// row carries one, by archive display name otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectId {
    Tic(TicId),
    Name(String),
}

impl ObjectId {
    pub fn dir_name(&self) -> String {
        match self {
            ObjectId::Tic(tic) => tic.to_string(),
            ObjectId::Name(name) => name.clone(),
        }
    }

    /// Filename prefix: TIC-namespaced files carry `tic{n}_`, name-namespaced
    /// files keep the archive filename untouched.
    pub fn file_prefix(&self) -> String {
        match self {
            ObjectId::Tic(tic) => format!("{tic}_"),
            ObjectId::Name(_) => String::new(),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}
