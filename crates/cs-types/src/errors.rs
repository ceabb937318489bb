use thiserror::Error;

/// Main error type for the ConvSweep system
#[derive(Error, Debug)]
pub enum CsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Sweep configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Axis {axis} has no values")]
    EmptyAxis { axis: String },

    #[error("Axis {axis} is defined more than once")]
    DuplicateAxis { axis: String },

    #[error("Axis {axis} would override the generation cap flag")]
    GenerationFlagSwept { axis: String },

    #[error("Invalid range for axis {axis}: {message}")]
    InvalidRange { axis: String, message: String },

    #[error("Grid has more than {limit} combinations")]
    GridOverflow { limit: usize },
}

/// Errors raised while running the external solver.
///
/// A non-zero exit status is not an error; it becomes the sentinel.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Failed to spawn solver {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Solver exited successfully but printed {stdout:?} instead of a generation count (argv: {argv})")]
    MalformedOutput { argv: String, stdout: String },

    #[error("Solver reported {generation} generations, above the cap of {generation_max} (argv: {argv})")]
    CountAboveCap {
        argv: String,
        generation: u64,
        generation_max: u64,
    },
}

/// Output table errors
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Cannot open output {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot encode row: {0}")]
    Encode(#[from] csv::Error),

    #[error("Cannot write row: {0}")]
    Write(#[from] std::io::Error),
}

/// Result type alias for ConvSweep operations
pub type CsResult<T> = Result<T, CsError>;

/// Macro for creating invalid-value configuration errors
#[macro_export]
macro_rules! invalid_value {
    ($field:expr, $($arg:tt)*) => {
        $crate::ConfigError::InvalidValue {
            field: $field.to_string(),
            message: format!($($arg)*),
        }
    };
}
