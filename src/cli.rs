use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the extraction gateway as a service.
    Daemon {},

    /// Request a download through the gateway and save it locally.
    Download {
        /// a video url
        url: String,

        /// Output format
        #[clap(short, long, value_enum, default_value_t = Format::Video)]
        format: Format,

        /// Requested quality tier
        #[clap(short, long, value_enum, default_value_t = Quality::Highest)]
        quality: Quality,

        /// Destination directory
        #[clap(short, long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Print the provider's direct stream url for a video.
    Link {
        /// a video url
        url: String,
    },

    /// Print the canonical 11-character video id for a url.
    Resolve {
        /// a video url
        url: String,
    },

    /// Preview videos in an external player. Reads urls from stdin until EOF.
    Preview {
        /// a video url to cue first
        url: Option<String>,
    },
}

#[derive(ValueEnum, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Video,
    Audio,
}

impl Format {
    /// Extension of the saved file.
    pub fn ext(self) -> &'static str {
        match self {
            Format::Video => "mp4",
            Format::Audio => "mp3",
        }
    }
}

#[derive(ValueEnum, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Highest,
    Lowest,
}
