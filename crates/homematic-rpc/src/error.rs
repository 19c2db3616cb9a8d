use thiserror::Error;

/// Top-level error type for the `homematic-rpc` crate.
///
/// Covers every failure mode of the wire protocol engine: transport,
/// XML decoding, value/envelope shape violations, and faults returned by
/// the remote side. `homematic-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Socket-level error (binding the callback server, probing the local address).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The endpoint answered with a non-success HTTP status.
    #[error("HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    // ── Wire format ─────────────────────────────────────────────────
    /// The payload is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(String),

    /// The payload could not be decoded into text.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The document root is not the expected envelope element.
    #[error("unexpected root element {found}, expected {expected}")]
    UnexpectedRoot {
        expected: &'static str,
        found: String,
    },

    /// A `<value>` holds a type tag outside the supported set.
    #[error("invalid value type {0}")]
    InvalidValueType(String),

    /// A struct `<member>` has no `<name>` child.
    #[error("missing struct name element")]
    MissingStructName,

    /// A struct `<member>` has no `<value>` child.
    #[error("missing struct value element")]
    MissingStructValue,

    /// Numeric or boolean text that does not parse.
    #[error("invalid {kind} value {text:?}")]
    InvalidNumber { kind: &'static str, text: String },

    /// A request envelope without `<methodName>`.
    #[error("method name is missing")]
    MissingMethodName,

    /// A response `<fault>` whose value is not a struct.
    #[error("invalid fault value")]
    InvalidFault,

    /// A native value that has no wire representation.
    #[error("unsupported value type: {0}")]
    UnsupportedValue(String),

    // ── Remote ──────────────────────────────────────────────────────
    /// The remote side answered with a fault.
    #[error("{message} (fault {code})")]
    Fault { code: i32, message: String },

    // ── Server ──────────────────────────────────────────────────────
    /// The callback server could not be started or stopped.
    #[error("callback server error: {0}")]
    Server(String),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Io(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if the remote side answered with a fault.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault { .. })
    }

    /// Returns `true` for decode failures of a received payload.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::Xml(_)
                | Self::Encoding(_)
                | Self::UnexpectedRoot { .. }
                | Self::InvalidValueType(_)
                | Self::MissingStructName
                | Self::MissingStructValue
                | Self::InvalidNumber { .. }
                | Self::MissingMethodName
                | Self::InvalidFault
        )
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Self::Xml(err.to_string())
    }
}
