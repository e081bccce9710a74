use std::fmt;
use std::io;

use duolink_frame::FrameError;
use duolink_monitor::MonitorError;
use duolink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(io_code(&err), format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_code(source),
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    let code = match &err {
        FrameError::Io(source) => io_code(source),
        FrameError::PayloadTooLarge { .. }
        | FrameError::IncompleteHeader { .. }
        | FrameError::IncompleteBody { .. } => DATA_INVALID,
        FrameError::ConnectionClosed => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn monitor_error(context: &str, err: MonitorError) -> CliError {
    match err {
        MonitorError::Transport(err) => transport_error(context, err),
        MonitorError::Frame(err) => frame_error(context, err),
        MonitorError::Io(err) => io_error(context, err),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}
