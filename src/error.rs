use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DiggerError {
    #[error("invalid coordinate ra={ra}, dec={dec}: need ra in [0,360) and dec in [-90,90]")]
    InvalidCoordinate { ra: f64, dec: f64 },

    #[error("invalid sexagesimal value: {0}")]
    InvalidSexagesimal(String),

    #[error("invalid TIC id: {0}")]
    InvalidTicId(String),

    #[error("invalid candidate id: {0} (use pattern host.planet, e.g. 1234.01)")]
    InvalidCandidateId(String),

    #[error("unknown data product: {0}")]
    UnknownProduct(String),

    #[error("product '{kind}' not available for {target}")]
    ProductNotAvailable { target: String, kind: String },

    #[error("corrupt catalog entry for {target}: '{filename}' does not end in .{expected}")]
    CorruptCatalogEntry {
        target: String,
        filename: String,
        expected: &'static str,
    },

    #[error("no catalog data: the loaded catalog is empty")]
    EmptyCatalog,

    #[error("supply a TOI or TIC id to query the alerts table")]
    MissingQuery,

    #[error("no TOI entry found for {0}")]
    CandidateNotFound(String),

    #[error("archive request failed: {0}")]
    Http(String),

    #[error("archive returned status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("failed to extract table from catalog page: {0}")]
    HtmlParse(String),

    #[error("malformed cache file {path}: {message}")]
    CacheParse { path: Utf8PathBuf, message: String },

    #[error("malformed velocity file from {url}: {message}")]
    VelsParse { url: String, message: String },

    #[error("no downloaded object directories found under {0}")]
    NoDownloads(Utf8PathBuf),

    #[error("failed to render finder chart: {0}")]
    Render(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
