//! Application configuration loading and layering for the CLI.
//!
//! Settings resolve as defaults < config file < CLI flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use mangapdf_core::config::{APP_DIR_NAME, env_var_non_empty_os};
use mangapdf_core::{ConversionFormat, ExtensionPolicy, RunConfig};

use crate::cli::Args;

/// TOML-style file configuration for run defaults.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Session token sent as the site's session cookie.
    pub session: Option<String>,
    /// Metadata cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Directory holding per-chapter downloads.
    pub work_dir: Option<PathBuf>,
    /// Directory for finished documents.
    pub output_dir: Option<PathBuf>,
    /// Page download concurrency (same range as CLI).
    pub concurrency: Option<u8>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Total request deadline in milliseconds.
    pub request_timeout_ms: Option<u64>,
    /// ImageMagick executable.
    pub magick: Option<PathBuf>,
    /// Conversion target.
    pub convert_format: Option<ConversionFormat>,
    /// Conversion quality.
    pub quality: Option<u8>,
    /// Extensions excluded from the document.
    pub deny_extensions: Option<Vec<String>>,
    /// Extensions admitted to the document, when set.
    pub allow_extensions: Option<Vec<String>>,
    /// TrueType font for title pages.
    pub font: Option<PathBuf>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=64).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=64");
        }
        if let Some(quality) = self.quality
            && !(1..=100).contains(&quality)
        {
            bail!("Invalid config value for `quality`: {quality}. Expected range: 1..=100");
        }
        validate_timeout_ms("connect_timeout_ms", self.connect_timeout_ms, 60_000)?;
        validate_timeout_ms("request_timeout_ms", self.request_timeout_ms, 600_000)?;
        Ok(())
    }
}

fn validate_timeout_ms(field: &str, value: Option<u64>, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..={max}");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/mangapdf/config.toml`
/// 2. `$HOME/.config/mangapdf/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(APP_DIR_NAME)
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR_NAME)
            .join("config.toml"),
    )
}

/// Loads config from `explicit` (must exist) or from the default path if present.
pub fn load_file_config_from(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Layers the file config and CLI flags over [`RunConfig`] defaults.
///
/// The session is left anonymous; the caller establishes it.
pub fn build_run_config(args: &Args, file: Option<&FileConfig>) -> RunConfig {
    let file = file.cloned().unwrap_or_default();
    let mut config = RunConfig::new(args.url.clone());
    config.volume = args.volume.clone();

    if let Some(dir) = file.cache_dir {
        config.cache_dir = dir;
    }
    if let Some(dir) = file.work_dir {
        config.work_dir = dir;
    }
    if let Some(dir) = args.output_dir.clone().or(file.output_dir) {
        config.output_dir = dir;
    }
    if let Some(concurrency) = args.concurrency.or(file.concurrency) {
        config.concurrency = usize::from(concurrency);
    }
    if let Some(ms) = file.connect_timeout_ms {
        config.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = file.request_timeout_ms {
        config.request_timeout = Duration::from_millis(ms);
    }
    if let Some(magick) = file.magick {
        config.magick = magick;
    }
    if let Some(format) = args.format.or(file.convert_format) {
        config.conversion.format = format;
    }
    if let Some(quality) = args.quality.or(file.quality) {
        config.conversion.quality = quality;
    }
    config.font = args.font.clone().or(file.font);

    let deny = if args.deny_ext.is_empty() {
        file.deny_extensions
    } else {
        Some(args.deny_ext.clone())
    };
    let allow = if args.allow_ext.is_empty() {
        file.allow_extensions
    } else {
        Some(args.allow_ext.clone())
    };
    if deny.is_some() || allow.is_some() {
        let deny = deny.unwrap_or_else(|| {
            config
                .extensions
                .denied()
                .iter()
                .map(ToString::to_string)
                .collect()
        });
        config.extensions = ExtensionPolicy::new(deny, allow);
    }

    config
}

/// Session token: `--session` wins over the file's `session`.
#[must_use]
pub fn session_token<'a>(args: &'a Args, file: Option<&'a FileConfig>) -> Option<&'a str> {
    args.session
        .as_deref()
        .or_else(|| file.and_then(|f| f.session.as_deref()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_no = line_index + 1;

        match key {
            "session" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `session` value on line {line_no}"))?;
                cfg.session = Some(parsed);
            }
            "cache_dir" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `cache_dir` value on line {line_no}"))?;
                cfg.cache_dir = Some(PathBuf::from(parsed));
            }
            "work_dir" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `work_dir` value on line {line_no}"))?;
                cfg.work_dir = Some(PathBuf::from(parsed));
            }
            "output_dir" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `output_dir` value on line {line_no}"))?;
                cfg.output_dir = Some(PathBuf::from(parsed));
            }
            "concurrency" => {
                let parsed = parse_integer_u8(value)
                    .with_context(|| format!("Invalid `concurrency` value on line {line_no}"))?;
                cfg.concurrency = Some(parsed);
            }
            "connect_timeout_ms" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `connect_timeout_ms` value on line {line_no}")
                })?;
                cfg.connect_timeout_ms = Some(parsed);
            }
            "request_timeout_ms" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `request_timeout_ms` value on line {line_no}")
                })?;
                cfg.request_timeout_ms = Some(parsed);
            }
            "magick" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `magick` value on line {line_no}"))?;
                cfg.magick = Some(PathBuf::from(parsed));
            }
            "convert_format" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `convert_format` value on line {line_no}"))?;
                let format = parsed.parse::<ConversionFormat>().map_err(|e| {
                    anyhow::anyhow!("Invalid `convert_format` value on line {line_no}: {e}")
                })?;
                cfg.convert_format = Some(format);
            }
            "quality" => {
                let parsed = parse_integer_u8(value)
                    .with_context(|| format!("Invalid `quality` value on line {line_no}"))?;
                cfg.quality = Some(parsed);
            }
            "deny_extensions" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `deny_extensions` value on line {line_no}")
                })?;
                cfg.deny_extensions = Some(split_list(&parsed));
            }
            "allow_extensions" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `allow_extensions` value on line {line_no}")
                })?;
                cfg.allow_extensions = Some(split_list(&parsed));
            }
            "font" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `font` value on line {line_no}"))?;
                cfg.font = Some(PathBuf::from(parsed));
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<u16>()?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["mangapdf", "--url", "https://mangalib.me/berserk"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).expect("args should parse")
    }

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
concurrency = 8
convert_format = "png"
"#,
        )
        .expect("partial config should parse");
        assert_eq!(cfg.concurrency, Some(8));
        assert_eq!(cfg.convert_format, Some(ConversionFormat::Png));
        assert!(cfg.output_dir.is_none());
        assert!(cfg.session.is_none());
    }

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
session = "tok"
cache_dir = "/var/cache/m"
work_dir = "/tmp/m"
output_dir = "out"
concurrency = 4
connect_timeout_ms = 2500
request_timeout_ms = 30000
magick = "/usr/bin/magick"
convert_format = "original"
quality = 90
deny_extensions = "gif, bmp"
allow_extensions = "jpg,png,webp"
font = "/usr/share/fonts/DejaVuSans.ttf"
"#,
        )
        .expect("full config should parse");
        assert_eq!(cfg.session.as_deref(), Some("tok"));
        assert_eq!(cfg.cache_dir, Some(PathBuf::from("/var/cache/m")));
        assert_eq!(cfg.work_dir, Some(PathBuf::from("/tmp/m")));
        assert_eq!(cfg.output_dir, Some(PathBuf::from("out")));
        assert_eq!(cfg.connect_timeout_ms, Some(2500));
        assert_eq!(cfg.request_timeout_ms, Some(30_000));
        assert_eq!(cfg.magick, Some(PathBuf::from("/usr/bin/magick")));
        assert_eq!(cfg.convert_format, Some(ConversionFormat::Original));
        assert_eq!(cfg.quality, Some(90));
        assert_eq!(
            cfg.deny_extensions,
            Some(vec!["gif".to_string(), "bmp".to_string()])
        );
        assert_eq!(
            cfg.allow_extensions,
            Some(vec!["jpg".to_string(), "png".to_string(), "webp".to_string()])
        );
        assert_eq!(cfg.font, Some(PathBuf::from("/usr/share/fonts/DejaVuSans.ttf")));
    }

    #[test]
    fn test_parse_config_rejects_invalid_concurrency() {
        let err = parse_config_str("concurrency = 65").expect_err("invalid concurrency expected");
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_quality() {
        let err = parse_config_str("quality = 0").expect_err("invalid quality expected");
        assert!(err.to_string().contains("quality"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_timeout_value() {
        let err = parse_config_str("connect_timeout_ms = 0").expect_err("invalid timeout expected");
        assert!(err.to_string().contains("connect_timeout_ms"));

        let err = parse_config_str("request_timeout_ms = 600001")
            .expect_err("timeout above range expected");
        assert!(err.to_string().contains("request_timeout_ms"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_format() {
        let err = parse_config_str(r#"convert_format = "tiff""#).expect_err("unknown format");
        assert!(err.to_string().contains("convert_format"));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_config_rejects_numeric_values_with_trailing_tokens() {
        let err = parse_config_str("concurrency = 4 trailing")
            .expect_err("expected trailing token error");
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_path() {
        let err = parse_config_str("output_dir = out").expect_err("unquoted string");
        assert!(err.to_string().contains("output_dir"));
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
concurrency = 4 # workers
session = "a#b" # hash inside quotes is kept
"#,
        )
        .expect("config with comments should parse");
        assert_eq!(cfg.concurrency, Some(4));
        assert_eq!(cfg.session.as_deref(), Some("a#b"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("\nunknown_key = 123").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("unknown_key"));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("concurrency 4").expect_err("syntax error expected");
        assert!(err.to_string().contains("expected key = value"));
    }

    #[test]
    fn test_load_explicit_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "quality = 60\n").expect("write config");

        let loaded = load_file_config_from(Some(&path)).expect("explicit config should load");
        assert!(loaded.loaded_from_file);
        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.and_then(|c| c.quality), Some(60));
    }

    #[test]
    fn test_load_missing_explicit_config_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_file_config_from(Some(&dir.path().join("nope.toml")))
            .expect_err("missing explicit config should fail");
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_build_run_config_defaults_without_file() {
        let config = build_run_config(&args(&[]), None);
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(config.conversion.quality, 75);
        assert_eq!(config.extensions, ExtensionPolicy::default());
        assert!(config.font.is_none());
    }

    #[test]
    fn test_build_run_config_font_cli_overrides_file() {
        let file = FileConfig {
            font: Some(PathBuf::from("file.ttf")),
            ..FileConfig::default()
        };
        let config = build_run_config(&args(&[]), Some(&file));
        assert_eq!(config.font, Some(PathBuf::from("file.ttf")));

        let config = build_run_config(&args(&["--font", "cli.ttf"]), Some(&file));
        assert_eq!(config.font, Some(PathBuf::from("cli.ttf")));
    }

    #[test]
    fn test_build_run_config_cli_overrides_file() {
        let file = FileConfig {
            output_dir: Some(PathBuf::from("from-file")),
            concurrency: Some(2),
            quality: Some(50),
            connect_timeout_ms: Some(300),
            deny_extensions: Some(vec!["bmp".to_string()]),
            ..FileConfig::default()
        };
        let config = build_run_config(
            &args(&["-o", "from-cli", "-c", "8", "--deny-ext", "png", "--volume", "2"]),
            Some(&file),
        );
        assert_eq!(config.output_dir, PathBuf::from("from-cli"));
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.conversion.quality, 50);
        assert_eq!(config.connect_timeout, Duration::from_millis(300));
        assert_eq!(config.volume.as_deref(), Some("2"));
        assert_eq!(config.extensions.denied(), ["png".to_string()]);
    }

    #[test]
    fn test_build_run_config_allow_list_keeps_default_deny() {
        let config = build_run_config(&args(&["--allow-ext", "jpg"]), None);
        assert_eq!(config.extensions.denied(), ["gif".to_string()]);
        assert_eq!(config.extensions.allowed(), Some(&["jpg".to_string()][..]));
    }

    #[test]
    fn test_session_token_prefers_cli() {
        let file = FileConfig {
            session: Some("file-token".to_string()),
            ..FileConfig::default()
        };
        assert_eq!(session_token(&args(&[]), Some(&file)), Some("file-token"));
        assert_eq!(
            session_token(&args(&["--session", "cli-token"]), Some(&file)),
            Some("cli-token")
        );
        assert_eq!(session_token(&args(&[]), None), None);
    }
}
