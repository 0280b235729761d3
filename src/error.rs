use crate::models::Year;

/// Everything that can go wrong while loading, storing or importing attendance data.
///
/// The aggregation itself never fails; these errors come from the store, the configuration and
/// from parsing user input.
#[derive(Debug, thiserror::Error)]
pub enum AcadexError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("could not connect to the database: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("could not read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("unknown year '{0}', expected one of FE, SE, TE, BE")]
    UnknownYear(String),

    #[error("invalid division '{0}', expected a single letter")]
    InvalidDivision(String),

    #[error("unknown session kind '{0}', expected theory or practical")]
    UnknownSessionKind(String),

    #[error("invalid roll range '{0}', expected START-END with START <= END")]
    InvalidRollRange(String),

    #[error("threshold {0} is out of range, expected 0 to 100")]
    InvalidThreshold(u32),

    #[error("{0} students are grouped by year, division cohorts exist only for FE")]
    DivisionCohort(Year),

    #[error("student '{0}' is not on the roster")]
    UnknownStudent(String),

    #[error("session '{0}' does not exist")]
    UnknownSession(String),

    #[error("roster CSV has no {0} column")]
    MissingColumn(&'static str),
}

pub type Result<T, E = AcadexError> = std::result::Result<T, E>;
