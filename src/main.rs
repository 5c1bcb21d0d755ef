use ltsmover::{
    install_signal_handlers, log, parse_args, run_config, set_log_file, set_verbose, PROGRAM_NAME, PROGRAM_VERSION,
};
use std::process;

/// Exit status when any failure was reported
const EXIT_FAILURES: i32 = 1;
/// Exit status when the configuration file itself is unusable
const EXIT_FATAL: i32 = 2;

fn main() {
    let args = parse_args();
    if let Some(log_file) = &args.log_file {
        set_log_file(log_file);
    }
    set_verbose(args.verbose);

    if let Err(e) = install_signal_handlers() {
        eprintln!("Failed to install signal handlers: {}", e);
    }

    let _ = log(&format!("{} {} started with {}", PROGRAM_NAME, PROGRAM_VERSION, args.conf_file.display()));

    let report = match run_config(&args.conf_file, args.run_options(), args.timeouts()) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}", e);
            let _ = log(&e.to_string());
            process::exit(EXIT_FATAL);
        }
    };

    print!("{}", report);
    let _ = log(&format!(
        "{} finished: {} passed, {} warnings, {} failures",
        PROGRAM_NAME,
        report.pass.len(),
        report.warn.len(),
        report.fail.len()
    ));

    if report.has_failures() {
        process::exit(EXIT_FAILURES);
    }
}
