//! Mapping command-line options onto the configuration

use clap::ArgMatches;
use log::debug;
use std::path::PathBuf;
use std::str::FromStr;

use crate::chip::{ChipParams, OutputFormat, ScaleMode};
use crate::config::ChipConfig;
use crate::error::{ChipError, ChipResult};

/// Value of a string option, `None` when absent or not defined for this command
pub(crate) fn string_arg<'m>(args: &'m ArgMatches, id: &str) -> Option<&'m str> {
    args.try_get_one::<String>(id).ok().flatten().map(String::as_str)
}

pub(crate) fn flag_arg(args: &ArgMatches, id: &str) -> bool {
    matches!(args.try_get_one::<bool>(id), Ok(Some(true)))
}

/// Parse an option value, naming the option on failure
pub(crate) fn parse_arg<T: FromStr>(args: &ArgMatches, id: &str) -> ChipResult<Option<T>> {
    string_arg(args, id)
        .map(|value| {
            value.trim().parse::<T>()
                .map_err(|_| ChipError::Config(format!("Invalid value '{}' for --{}", value, id)))
        })
        .transpose()
}

/// Parse `N` or `WxH`
pub(crate) fn parse_size(value: &str) -> ChipResult<(u32, u32)> {
    let parse = |s: &str| {
        s.trim().parse::<u32>()
            .map_err(|_| ChipError::Config(format!("Invalid chip size '{}'", value)))
    };
    match value.split_once(['x', 'X']) {
        Some((width, height)) => Ok((parse(width)?, parse(height)?)),
        None => {
            let size = parse(value)?;
            Ok((size, size))
        }
    }
}

/// Configuration from `--config` (or defaults)
pub fn load_config(args: &ArgMatches) -> ChipResult<ChipConfig> {
    match string_arg(args, "config") {
        Some(path) => ChipConfig::from_file(path),
        None => Ok(ChipConfig::default()),
    }
}

/// Apply chip options to `params`
pub fn apply_chip_overrides(params: &mut ChipParams, args: &ArgMatches) -> ChipResult<()> {
    if let Some(format) = string_arg(args, "format") {
        params.format = OutputFormat::from_str(format)?;
    }
    if let Some(buffer) = parse_arg::<f64>(args, "buffer")? {
        params.buffer_meters = buffer;
    }
    if let Some(size) = string_arg(args, "size") {
        let (width, height) = parse_size(size)?;
        params.width_px = width;
        params.height_px = height;
    }
    if let Some(gamma) = parse_arg::<f64>(args, "gamma")? {
        params.gamma = gamma;
    }
    if let Some(quality) = parse_arg::<u8>(args, "quality")? {
        params.jpeg_quality = quality;
    }
    if let Some(mode) = string_arg(args, "scale-mode") {
        params.scale_mode = ScaleMode::from_str(mode)?;
    }
    Ok(())
}

/// Apply `run` options to `config`
pub fn apply_run_overrides(config: &mut ChipConfig, args: &ArgMatches) -> ChipResult<()> {
    if let Some(input) = string_arg(args, "input") {
        config.input = Some(PathBuf::from(input));
    }
    if let Some(dir) = string_arg(args, "output-dir") {
        config.output_dir = PathBuf::from(dir);
    }
    if let Some(years) = string_arg(args, "years") {
        config.set_years(years)?;
    }
    if let Some(limit) = parse_arg::<usize>(args, "limit")? {
        config.limit = Some(limit);
    }
    if let Some(workers) = parse_arg::<usize>(args, "workers")? {
        config.workers = workers;
    }
    if let Some(url) = string_arg(args, "catalog-url") {
        config.catalog_url = url.to_string();
    }
    if let Some(collection) = string_arg(args, "collection") {
        config.collection = collection.to_string();
    }
    if let Some(limit) = parse_arg::<f64>(args, "cloud-limit")? {
        config.cloud_cover_limit = limit;
    }
    if let Some(bands) = string_arg(args, "bands") {
        config.bands = bands.split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(property) = string_arg(args, "id-property") {
        config.id_property = property.to_string();
    }
    if flag_arg(args, "exit-zero-on-error") {
        config.exit_zero_on_error = true;
    }
    if flag_arg(args, "no-progress") {
        config.progress = false;
    }
    apply_chip_overrides(&mut config.chip, args)?;
    debug!("Effective configuration: {:?}", config);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::cli::build_cli;

    fn run_args(extra: &[&str]) -> ArgMatches {
        let mut argv = vec!["chipkit", "run"];
        argv.extend_from_slice(extra);
        let matches = build_cli().try_get_matches_from(argv).unwrap();
        matches.subcommand_matches("run").unwrap().clone()
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("256").unwrap(), (256, 256));
        assert_eq!(parse_size("512x128").unwrap(), (512, 128));
        assert!(parse_size("big").is_err());
    }

    #[test]
    fn test_run_overrides() {
        let args = run_args(&[
            "points.geojson", "--years", "2020-2021", "--limit", "2", "--bands", "red, nir08 ,swir16",
            "--format", "png", "--size", "128", "--scale-mode", "percentile", "--no-progress",
        ]);
        let mut config = ChipConfig::default();
        apply_run_overrides(&mut config, &args).unwrap();

        assert_eq!(config.input, Some(PathBuf::from("points.geojson")));
        assert_eq!(config.years(), 2020..=2021);
        assert_eq!(config.limit, Some(2));
        assert_eq!(config.bands, vec!["red", "nir08", "swir16"]);
        assert_eq!(config.chip.format, OutputFormat::Png);
        assert_eq!((config.chip.width_px, config.chip.height_px), (128, 128));
        assert_eq!(config.chip.scale_mode, ScaleMode::Percentile);
        assert!(!config.progress);
        // Not given on the command line
        assert_eq!(config.cloud_cover_limit, 5.0);
        assert!(!config.exit_zero_on_error);
    }

    #[test]
    fn test_invalid_values_name_the_option() {
        let args = run_args(&["--workers", "many"]);
        match apply_run_overrides(&mut ChipConfig::default(), &args) {
            Err(ChipError::Config(msg)) => assert!(msg.contains("--workers")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_undefined_options_are_absent() {
        let matches = build_cli().try_get_matches_from(["chipkit", "info", "x.tif"]).unwrap();
        let info = matches.subcommand_matches("info").unwrap();
        assert_eq!(string_arg(info, "format"), None);
        assert!(!flag_arg(info, "strict"));
    }
}
