//! Command-line definition

use clap::{Arg, ArgAction, Command as ClapCommand};

/// Options shared by every command that writes chips
fn chip_args() -> Vec<Arg> {
    vec![
        Arg::new("format")
            .long("format")
            .help("Output format (jpeg, png, gtiff)")
            .value_name("FORMAT"),
        Arg::new("buffer")
            .long("buffer")
            .help("Half-extent of the chip in map units")
            .value_name("METERS"),
        Arg::new("size")
            .long("size")
            .help("Chip size in pixels, 'N' or 'WxH'")
            .value_name("SIZE"),
        Arg::new("gamma")
            .long("gamma")
            .help("Gamma exponent applied while rescaling")
            .value_name("GAMMA"),
        Arg::new("quality")
            .long("quality")
            .help("JPEG quality (1-100)")
            .value_name("QUALITY"),
        Arg::new("scale-mode")
            .long("scale-mode")
            .help("Rescale ranges: fixed or percentile")
            .value_name("MODE"),
    ]
}

/// Build the `chipkit` command line
pub fn build_cli() -> ClapCommand {
    ClapCommand::new("chipkit")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Monthly least-cloudy satellite image chips around points of interest")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .help("TOML configuration file")
                .value_name("FILE")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .help("Also write the log to this file")
                .value_name("FILE")
                .global(true),
        )
        .subcommand(
            ClapCommand::new("run")
                .about("Extract chips for every point, year and month")
                .arg(
                    Arg::new("input")
                        .help("GeoJSON FeatureCollection of points")
                        .value_name("GEOJSON")
                        .index(1),
                )
                .arg(Arg::new("output-dir").short('o').long("output-dir").help("Directory for chips").value_name("DIR"))
                .arg(Arg::new("years").long("years").help("Year or inclusive range, e.g. 2019-2022").value_name("YEARS"))
                .arg(Arg::new("limit").long("limit").help("Only process the first N features").value_name("N"))
                .arg(Arg::new("workers").long("workers").help("Worker threads (0 = one per core)").value_name("N"))
                .arg(Arg::new("catalog-url").long("catalog-url").help("STAC API root").value_name("URL"))
                .arg(Arg::new("collection").long("collection").help("Scene collection").value_name("NAME"))
                .arg(Arg::new("cloud-limit").long("cloud-limit").help("Maximum cloud cover (exclusive, percent)").value_name("PCT"))
                .arg(Arg::new("bands").long("bands").help("Comma-separated asset keys in output order").value_name("LIST"))
                .arg(Arg::new("id-property").long("id-property").help("Feature property with the point ID").value_name("NAME"))
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .help("Exit with status 2 when any month or unit failed")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("exit-zero-on-error")
                        .long("exit-zero-on-error")
                        .help("Log run errors but exit with status 0")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("no-progress")
                        .long("no-progress")
                        .help("Hide the progress bar")
                        .action(ArgAction::SetTrue),
                )
                .args(chip_args()),
        )
        .subcommand(
            ClapCommand::new("chip")
                .about("Extract one chip from explicit band assets")
                .arg(
                    Arg::new("band")
                        .long("band")
                        .help("Band asset URL or path; repeat in output band order")
                        .value_name("URL")
                        .action(ArgAction::Append)
                        .required(true),
                )
                .arg(
                    Arg::new("lon")
                        .long("lon")
                        .help("Longitude of the chip centre")
                        .value_name("DEG")
                        .allow_negative_numbers(true)
                        .required(true),
                )
                .arg(
                    Arg::new("lat")
                        .long("lat")
                        .help("Latitude of the chip centre")
                        .value_name("DEG")
                        .allow_negative_numbers(true)
                        .required(true),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Output image file")
                        .value_name("FILE")
                        .required(true),
                )
                .args(chip_args()),
        )
        .subcommand(
            ClapCommand::new("info")
                .about("Print the georeferencing of a GeoTIFF or VRT")
                .arg(
                    Arg::new("source")
                        .help("Path or URL of the raster")
                        .value_name("SOURCE")
                        .required(true)
                        .index(1),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_parse_chip_subcommand() {
        let matches = build_cli().try_get_matches_from([
            "chipkit", "-v", "chip", "--band", "a.tif", "--band", "b.tif", "--band", "c.tif",
            "--lon", "-47.9", "--lat", "-15.8", "-o", "out.jpg",
        ]).unwrap();

        assert!(matches.get_flag("verbose"));
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "chip");
        let bands: Vec<&String> = sub.get_many::<String>("band").unwrap().collect();
        assert_eq!(bands.len(), 3);
        assert_eq!(sub.get_one::<String>("lon").map(String::as_str), Some("-47.9"));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(build_cli().try_get_matches_from(["chipkit"]).is_err());
        assert!(build_cli().try_get_matches_from(["chipkit", "chip", "--lon", "1"]).is_err());
    }
}
