//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use mangapdf_core::ConversionFormat;
use url::Url;

/// Download one manga volume and bind it into a PDF.
///
/// Every chapter of the volume gets a title page followed by its pages.
/// Images are fetched through the site's mirror hosts, validated and
/// converted with ImageMagick before rendering.
#[derive(Parser, Debug)]
#[command(name = "mangapdf")]
#[command(author, version, about)]
pub struct Args {
    /// Work page URL (e.g. https://mangalib.me/berserk)
    #[arg(short = 'u', long)]
    pub url: Url,

    /// Volume to download (required when the work has more than one)
    #[arg(long = "volume", visible_alias = "vol")]
    pub volume: Option<String>,

    /// Print the work's volumes and exit
    #[arg(long)]
    pub list_volumes: bool,

    /// Log in with a browser and paste the session before downloading
    #[arg(long)]
    pub auth: bool,

    /// Session token sent as the site's session cookie
    #[arg(long, value_name = "TOKEN")]
    pub session: Option<String>,

    /// Config file (default: $XDG_CONFIG_HOME/mangapdf/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory for the finished PDF
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum concurrent page downloads (1-64)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=64))]
    pub concurrency: Option<u8>,

    /// Image conversion target: original, jpeg or png
    #[arg(long)]
    pub format: Option<ConversionFormat>,

    /// Conversion quality (1-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// Exclude pages with this extension (repeatable)
    #[arg(long = "deny-ext", value_name = "EXT")]
    pub deny_ext: Vec<String>,

    /// Only include pages with this extension (repeatable)
    #[arg(long = "allow-ext", value_name = "EXT")]
    pub allow_ext: Vec<String>,

    /// TrueType font for title pages (needed for non-Latin titles)
    #[arg(long, value_name = "PATH")]
    pub font: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://mangalib.me/berserk";

    #[test]
    fn test_cli_minimal_args_parses_successfully() {
        let args = Args::try_parse_from(["mangapdf", "--url", URL]).unwrap();
        assert_eq!(args.url.as_str(), URL);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(!args.auth);
        assert!(!args.list_volumes);
        assert!(args.volume.is_none());
        assert!(args.concurrency.is_none());
        assert!(args.format.is_none());
        assert!(args.deny_ext.is_empty());
        assert!(args.font.is_none());
    }

    #[test]
    fn test_cli_missing_url_rejected() {
        let err = Args::try_parse_from(["mangapdf"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_invalid_url_rejected() {
        let err = Args::try_parse_from(["mangapdf", "--url", "not a url"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["mangapdf", "-u", URL, "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["mangapdf", "-u", URL, "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["mangapdf", "-u", URL, "--quiet"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["mangapdf", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["mangapdf", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_volume_and_alias() {
        let args = Args::try_parse_from(["mangapdf", "-u", URL, "--volume", "3"]).unwrap();
        assert_eq!(args.volume.as_deref(), Some("3"));

        let args = Args::try_parse_from(["mangapdf", "-u", URL, "--vol", "2"]).unwrap();
        assert_eq!(args.volume.as_deref(), Some("2"));
    }

    #[test]
    fn test_cli_concurrency_range() {
        let args = Args::try_parse_from(["mangapdf", "-u", URL, "-c", "64"]).unwrap();
        assert_eq!(args.concurrency, Some(64));

        let err = Args::try_parse_from(["mangapdf", "-u", URL, "-c", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let err = Args::try_parse_from(["mangapdf", "-u", URL, "-c", "65"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_quality_range() {
        let args = Args::try_parse_from(["mangapdf", "-u", URL, "--quality", "90"]).unwrap();
        assert_eq!(args.quality, Some(90));

        let err = Args::try_parse_from(["mangapdf", "-u", URL, "--quality", "101"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_format_parses() {
        let args = Args::try_parse_from(["mangapdf", "-u", URL, "--format", "png"]).unwrap();
        assert_eq!(args.format, Some(ConversionFormat::Png));

        let err = Args::try_parse_from(["mangapdf", "-u", URL, "--format", "tiff"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_extension_flags_repeat() {
        let args = Args::try_parse_from([
            "mangapdf",
            "-u",
            URL,
            "--deny-ext",
            "gif",
            "--deny-ext",
            "bmp",
            "--allow-ext",
            "jpg",
        ])
        .unwrap();
        assert_eq!(args.deny_ext, vec!["gif", "bmp"]);
        assert_eq!(args.allow_ext, vec!["jpg"]);
    }

    #[test]
    fn test_cli_auth_and_session() {
        let args =
            Args::try_parse_from(["mangapdf", "-u", URL, "--auth", "--session", "abc"]).unwrap();
        assert!(args.auth);
        assert_eq!(args.session.as_deref(), Some("abc"));
    }

    #[test]
    fn test_cli_font_path() {
        let args = Args::try_parse_from([
            "mangapdf",
            "-u",
            URL,
            "--font",
            "/usr/share/fonts/DejaVuSans.ttf",
        ])
        .unwrap();
        assert_eq!(args.font, Some(PathBuf::from("/usr/share/fonts/DejaVuSans.ttf")));
    }
}
