use log::{error, LevelFilter};
use std::process;

use chipkit::commands::{build_cli, exit_code, ChipkitCommandFactory, CommandFactory};
use chipkit::utils::logger::Logger;

fn main() {
    let matches = build_cli().get_matches();

    let level = if matches.get_flag("verbose") { LevelFilter::Debug } else { LevelFilter::Info };
    let log_file = matches.get_one::<String>("log-file").map(String::as_str);

    // Command reports go to chipkit.log, the log records to --log-file
    let logger = match Logger::new("chipkit.log", level) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Warning: cannot write chipkit.log ({}), reports go to the console only", e);
            Logger::console(level)
        }
    };

    if let Err(e) = Logger::init_global_logger(log_file, level) {
        eprintln!("Error setting up global logger: {}", e);
        process::exit(1);
    }

    let factory = ChipkitCommandFactory::new();

    let result = match factory.create_command(&matches, &logger) {
        Ok(command) => command.execute().map_err(|e| {
            error!("Command execution error: {}", e);
            e
        }),
        Err(e) => {
            error!("Failed to create command: {}", e);
            Err(e)
        }
    };

    if let Err(e) = result {
        let code = exit_code(&matches, &e);
        if code != 0 {
            eprintln!("Error: {}", e);
            process::exit(code);
        }
    }
}
