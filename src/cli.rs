use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::core::Layout;

/// Window layout as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    /// Original, Test and Difference next to each other
    SideBySide,
    /// Alpha window alone
    Alpha,
}

impl From<LayoutArg> for Layout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::SideBySide => Layout::SideBySide,
            LayoutArg::Alpha => Layout::AlphaOnly,
        }
    }
}

/// Frame-by-frame render comparison viewer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Event descriptor (JSON with frame range, variant base paths and scores)
    #[arg(value_name = "EVENT")]
    pub event: Option<PathBuf>,

    /// Start at this frame (clamped to the event range)
    #[arg(long = "frame", value_name = "N")]
    pub start_frame: Option<i32>,

    /// Window layout
    #[arg(long = "layout", value_enum)]
    pub layout: Option<LayoutArg>,

    /// Auto-play on startup
    #[arg(short = 'a', long = "autoplay")]
    pub autoplay: bool,

    /// Playback speed preset (0 = 0.25x, 1 = 0.5x, 2 = 1x, 3 = 2x, 4 = 4x)
    #[arg(long = "speed", value_name = "IDX", value_parser = clap::value_parser!(u8).range(0..=4))]
    pub speed: Option<u8>,

    /// Enable logging to file (default: rendercmp.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Print effective settings as JSON and exit
    #[arg(long = "dump-config")]
    pub dump_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let args = Args::try_parse_from([
            "rendercmp",
            "event.json",
            "--frame",
            "12",
            "--layout",
            "alpha",
            "--speed",
            "3",
            "-vv",
            "--log",
        ])
        .unwrap();
        assert_eq!(args.event, Some(PathBuf::from("event.json")));
        assert_eq!(args.start_frame, Some(12));
        assert_eq!(args.layout.map(Layout::from), Some(Layout::AlphaOnly));
        assert_eq!(args.speed, Some(3));
        assert_eq!(args.verbosity, 2);
        assert_eq!(args.log_file, Some(None));
    }

    #[test]
    fn test_speed_out_of_range_rejected() {
        assert!(Args::try_parse_from(["rendercmp", "--speed", "7"]).is_err());
    }

    #[test]
    fn test_layout_names() {
        let args = Args::try_parse_from(["rendercmp", "--layout", "side-by-side"]).unwrap();
        assert_eq!(args.layout, Some(LayoutArg::SideBySide));
    }
}
