//! Command-line interface for lv-capture.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
///
/// Every setting is optional so that unset flags fall through to the
/// environment and the config file.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Persistent log file path.
    pub log_file: Option<PathBuf>,
    /// Control channel path.
    pub control: Option<PathBuf>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Bytes read per data-stream event.
    pub chunk_size: Option<usize>,
    /// Terminal preview width in characters.
    pub preview_width: Option<usize>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('f') | Long("log-file") => {
                result.log_file = Some(parser.value()?.parse()?);
            }
            Short('C') | Long("control") => {
                result.control = Some(parser.value()?.parse()?);
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Long("chunk-size") => {
                let value: String = parser.value()?.parse()?;
                result.chunk_size = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("chunk-size", value))?,
                );
            }
            Long("preview-width") => {
                let value: String = parser.value()?.parse()?;
                result.preview_width = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("preview-width", value))?,
                );
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"lv-capture {version}
Capture a process's output into timestamped per-command records

USAGE:
    <command> | lv-capture [OPTIONS]

Reads raw output on stdin. Command boundaries arrive as lines on the
control channel:
    __CMD_START__:<name>    open a record for <name>
    __CMD_END__             close and emit the current record

OPTIONS:
    -f, --log-file <PATH>       Log file receiving full records
    -C, --control <PATH>        Control channel path [default: /tmp/cmd_control]
    -c, --config <FILE>         Path to configuration file (JSON)
    -l, --log-level <LVL>       Diagnostic log level (error, warn, info, debug, trace)
        --chunk-size <N>        Bytes read per data event [default: 1024]
        --preview-width <N>     Terminal preview width [default: 200]
    -h, --help                  Print help
    -V, --version               Print version

ENVIRONMENT VARIABLES:
    LV_LOG_FILE             Log file path (overrides config)
    LV_CONTROL_PATH         Control channel path (overrides config)
    LV_CHUNK_SIZE           Bytes read per data event
    LV_POLL_TIMEOUT_MS      Multiplexer wait bound [default: 100]
    LV_PREVIEW_WIDTH        Terminal preview width
    LV_LOG_LEVEL            Diagnostic log level (overrides config)
    RUST_LOG                Alternative log level setting

EXAMPLES:
    # Capture a shell session's output
    mkfifo /tmp/cmd_control
    LV_LOG_FILE=~/commands.log script -qfc bash /dev/null | lv-capture

    # In the captured shell, hold one writer open for the session
    exec 3>/tmp/cmd_control
    trap 'echo "__CMD_START__:$BASH_COMMAND" >&3' DEBUG
    PROMPT_COMMAND='echo "__CMD_END__" >&3'

    # Explicit paths
    lv-capture -f /var/log/session.log -C /run/user/1000/lv_control
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("lv-capture {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("lv-capture")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_default_args() {
        let result = parse_args_from(args(&[])).unwrap();
        assert!(result.log_file.is_none());
        assert!(result.control.is_none());
        assert!(result.chunk_size.is_none());
        assert!(!result.help);
    }

    #[test]
    fn test_short_paths() {
        let result =
            parse_args_from(args(&["-f", "/tmp/out.log", "-C", "/tmp/ctl"])).unwrap();
        assert_eq!(result.log_file, Some(PathBuf::from("/tmp/out.log")));
        assert_eq!(result.control, Some(PathBuf::from("/tmp/ctl")));
    }

    #[test]
    fn test_long_options() {
        let result = parse_args_from(args(&[
            "--log-file",
            "/var/log/a.log",
            "--control",
            "/run/ctl",
            "--chunk-size",
            "2048",
            "--preview-width",
            "80",
        ]))
        .unwrap();
        assert_eq!(result.log_file, Some(PathBuf::from("/var/log/a.log")));
        assert_eq!(result.control, Some(PathBuf::from("/run/ctl")));
        assert_eq!(result.chunk_size, Some(2048));
        assert_eq!(result.preview_width, Some(80));
    }

    #[test]
    fn test_config_file() {
        let result = parse_args_from(args(&["-c", "/etc/lv-capture.json"])).unwrap();
        assert_eq!(result.config, Some(PathBuf::from("/etc/lv-capture.json")));
    }

    #[test]
    fn test_help_flag() {
        let result = parse_args_from(args(&["-h"])).unwrap();
        assert!(result.help);

        let result = parse_args_from(args(&["--help"])).unwrap();
        assert!(result.help);
    }

    #[test]
    fn test_version_flag() {
        let result = parse_args_from(args(&["-V"])).unwrap();
        assert!(result.version);
    }

    #[test]
    fn test_log_level() {
        let result = parse_args_from(args(&["-l", "debug"])).unwrap();
        assert_eq!(result.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_invalid_chunk_size() {
        let result = parse_args_from(args(&["--chunk-size", "big"]));
        assert!(matches!(
            result,
            Err(ArgsError::InvalidValue("chunk-size", _))
        ));
    }

    #[test]
    fn test_positional_rejected() {
        let result = parse_args_from(args(&["stray"]));
        assert!(matches!(result, Err(ArgsError::UnexpectedArgument(_))));
    }

    #[test]
    fn test_unknown_flag() {
        let result = parse_args_from(args(&["--bogus"]));
        assert!(matches!(result, Err(ArgsError::Lexopt(_))));
    }
}
