#[derive(Debug, snafu::Snafu)]
#[snafu(visibility = "pub")]
pub enum Error {
    #[snafu(display("failed to connect to {}: {}", url, source))]
    Connect {
        url: String,
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[snafu(display("couldn't parse config file: {}", source))]
    CouldntParseConfig { source: config::ConfigError },

    #[snafu(display("config file {} doesn't exist", name))]
    ConfigFileDoesntExist { name: String },

    #[snafu(display("failed to flush terminal: {}", source))]
    FlushTerminal { source: std::io::Error },

    #[snafu(display("failed to get terminal size: {}", source))]
    GetTerminalSize { source: crossterm::ErrorKind },

    #[snafu(display("invalid terminal geometry {}x{}", cols, rows))]
    InvalidGeometry { cols: u16, rows: u16 },

    #[snafu(display("invalid message type field: {}", ty))]
    InvalidMessageType { ty: String },

    #[snafu(display("couldn't find name in argv"))]
    MissingArgv,

    #[snafu(display("message has neither a type nor a command"))]
    MissingMessageType,

    #[snafu(display(
        "detected argv path was not a valid filename: {}",
        path
    ))]
    NotAFileName { path: String },

    #[snafu(display("{}", source))]
    ParseArgs { source: clap::Error },

    #[snafu(display("failed to parse config file: {}", source))]
    ParseConfigFile { source: config::ConfigError },

    #[snafu(display(
        "unknown framing '{}' (expected structured or raw)",
        ty
    ))]
    ParseFraming { ty: String },

    #[snafu(display("failed to parse message: {}", source))]
    ParseMessage { source: serde_json::Error },

    #[snafu(display(
        "failed to parse resize debounce '{}': {}",
        input,
        source
    ))]
    ParseResizeDebounce {
        input: String,
        source: std::num::ParseIntError,
    },

    #[snafu(display("failed to parse url '{}': {}", input, source))]
    ParseUrl {
        input: String,
        source: url::ParseError,
    },

    #[snafu(display("failed to read from terminal: {}", source))]
    ReadTerminal { source: std::io::Error },

    #[snafu(display("failed to serialize message: {}", source))]
    SerializeMessage { source: serde_json::Error },

    #[snafu(display("failed to poll for terminal resizing: {}", source))]
    SigWinchHandler { source: std::io::Error },

    #[snafu(display("timer failed: {}", source))]
    Timer { source: tokio::timer::Error },

    #[snafu(display(
        "failed to put the terminal into raw mode: {}",
        source
    ))]
    ToRawMode { source: crossterm::ErrorKind },

    #[snafu(display("can't derive a websocket url from scheme '{}'", scheme))]
    UnsupportedScheme { scheme: String },

    #[snafu(display("websocket connection failed: {}", source))]
    WebSocket {
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[snafu(display("failed to write to terminal: {}", source))]
    WriteTerminal { source: std::io::Error },
}

impl Error {
    // malformed payloads only cost the message they arrived in, never the
    // connection
    pub fn is_decode_error(&self) -> bool {
        match self {
            Self::ParseMessage { .. }
            | Self::MissingMessageType
            | Self::InvalidMessageType { .. }
            | Self::InvalidGeometry { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
