use std::path::PathBuf;

use clap::Parser;
use clap::error::ErrorKind;

/// Static file server over a single-threaded readiness loop.
#[derive(Debug, Clone, Parser)]
#[command(name = "lantern", version)]
pub struct Config {
    /// Port number or service name to listen on
    pub port: String,

    /// Directory that requested paths are resolved against
    #[arg(long, default_value = "public_html")]
    pub root: PathBuf,

    /// Readiness events fetched per wait
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..))]
    pub max_events: u16,
}

impl Config {
    /// Parses the process arguments.
    ///
    /// A missing or extra argument prints usage to stdout and exits with
    /// status 1.
    pub fn load() -> Self {
        match Self::try_parse() {
            Ok(cfg) => cfg,
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                e.exit()
            }
            Err(e) => {
                println!("{}", e.render());
                std::process::exit(1);
            }
        }
    }

    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(args)
    }
}
