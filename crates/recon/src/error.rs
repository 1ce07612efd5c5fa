use std::fmt;

/// Whole-call failures. Per-row problems never surface here; they become
/// [`RowError`]s attached to a rejected row.
#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty milestone list, zero window, etc.).
    ConfigValidation(String),
    /// The items payload is not a JSON array of objects.
    InputShape(String),
    /// IO error (config file read).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::InputShape(msg) => write!(f, "input shape error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

/// Why a single reconciliation row was rejected at the input boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowError {
    /// The record is not a JSON object.
    NotAnObject,
    /// A required field is absent or null.
    MissingField { field: &'static str },
    /// A field is present but holds an unusable value.
    InvalidValue { field: &'static str, value: String },
    /// Date parse error.
    DateParse { field: &'static str, value: String },
    /// Amount parse error.
    AmountParse { field: &'static str, value: String },
    /// The row parsed but violates a row invariant.
    Invariant(String),
}

impl RowError {
    /// Stable category used by the data-quality banner.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotAnObject | Self::MissingField { .. } | Self::InvalidValue { .. } => {
                "data_shape"
            }
            Self::DateParse { .. } => "date_parse",
            Self::AmountParse { .. } => "amount_parse",
            Self::Invariant(_) => "invariant",
        }
    }

    /// The offending field, when one can be named.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { field }
            | Self::InvalidValue { field, .. }
            | Self::DateParse { field, .. }
            | Self::AmountParse { field, .. } => Some(*field),
            Self::NotAnObject | Self::Invariant(_) => None,
        }
    }

    /// The raw value that failed to parse, if any.
    pub fn raw_value(&self) -> Option<&str> {
        match self {
            Self::InvalidValue { value, .. }
            | Self::DateParse { value, .. }
            | Self::AmountParse { value, .. } => Some(value.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "record is not an object"),
            Self::MissingField { field } => write!(f, "missing required field '{field}'"),
            Self::InvalidValue { field, value } => {
                write!(f, "field '{field}': invalid value '{value}'")
            }
            Self::DateParse { field, value } => {
                write!(f, "field '{field}': cannot parse date '{value}'")
            }
            Self::AmountParse { field, value } => {
                write!(f, "field '{field}': cannot parse amount '{value}'")
            }
            Self::Invariant(msg) => write!(f, "invariant violated: {msg}"),
        }
    }
}

impl std::error::Error for RowError {}
