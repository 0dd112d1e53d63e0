//! Product Resolver: turns a matched catalog row plus a product kind into a
//! concrete remote URL and local destination, validating the catalog's own
//! claims on the way.

use camino::{Utf8Path, Utf8PathBuf};

use crate::catalog::CatalogRow;
use crate::domain::ProductKind;
use crate::error::DiggerError;
use crate::store;

/// Derived download coordinates; computed per request, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTarget {
    pub kind: ProductKind,
    pub url: String,
    pub local_path: Utf8PathBuf,
    pub filename: String,
}

/// Resolves `kind` for a matched row.
///
/// Fails with `ProductNotAvailable` when the row's availability field is
/// empty, and with `CorruptCatalogEntry` when the declared filename's
/// extension contradicts the product category it sits under.
pub fn resolve(
    row: &CatalogRow,
    kind: ProductKind,
    base_url: &str,
    output_root: &Utf8Path,
) -> Result<DownloadTarget, DiggerError> {
    let filename = row
        .product(kind)
        .ok_or_else(|| DiggerError::ProductNotAvailable {
            target: row.target.clone(),
            kind: kind.column_label().to_string(),
        })?;

    let expected = kind.expected_extension();
    let actual = filename.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    if actual != expected {
        return Err(DiggerError::CorruptCatalogEntry {
            target: row.target.clone(),
            filename: filename.to_string(),
            expected,
        });
    }

    // per-target folder convention on the remote side: <Target>_RVs/
    let url = format!(
        "{}/{}_RVs/{}",
        base_url.trim_end_matches('/'),
        row.target,
        filename
    );

    let object = row.object_id();
    let local_path = store::object_dir(output_root, &object)
        .join(format!("{}{}", object.file_prefix(), filename));

    Ok(DownloadTarget {
        kind,
        url,
        local_path,
        filename: filename.to_string(),
    })
}
