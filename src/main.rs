use std::env;
use std::path::{Path, PathBuf};
use std::process::exit;

use anyhow::Context;
use clap::{App, Arg, ArgMatches};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::project::definition::ProjectDefinition;
use crate::testrunner::{Testrunner, TestrunnerError};

mod project {
    pub mod definition;
    pub mod paths;
    pub mod setup;
}
mod test {
    pub mod checker;
    pub mod diff;
    pub mod judge;
    pub mod process;
    pub mod runner;
    pub mod testcase;
}
mod testresult {
    pub mod score;
    pub mod testresult;
}
mod testrunner;


const EXIT_SUCCESS: i32 = 0;
const EXIT_TESTS_FAILED: i32 = 1;
const EXIT_SETUP_FAILED: i32 = 2;
const EXIT_CRASH: i32 = 3;

fn main() {
    let cli_args = App::new("grader")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runs the test cases of a project directory and reports scores")
        .arg(
            Arg::with_name("json")
                .long("json")
                .help("Prints the results as JSON instead of a table"),
        )
        .arg(
            Arg::with_name("root")
                .long("root")
                .value_name("DIR")
                .takes_value(true)
                .help("Project root directory (defaults to the current directory)"),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("CONFIG_FILE")
                .takes_value(true)
                .help("Session config file (defaults to <root>/grader_config.toml)"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .conflicts_with("quiet")
                .help("Logs every launched command"),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .help("Only logs warnings and errors"),
        )
        .arg(
            Arg::with_name("TEST")
                .index(1)
                .help("Runs only the test case with this directory name"),
        )
        .get_matches();

    init_logging(&cli_args);

    let code = match run(&cli_args) {
        Ok(code) => code,
        Err(err) => {
            error!("{:#}", err);
            EXIT_CRASH
        }
    };
    exit(code);
}

fn init_logging(cli_args: &ArgMatches) {
    let default_level = if cli_args.is_present("verbose") {
        "debug"
    } else if cli_args.is_present("quiet") || cli_args.is_present("json") {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn run(cli_args: &ArgMatches) -> anyhow::Result<i32> {
    let root_dir = match cli_args.value_of("root") {
        Some(root) => Path::new(root).canonicalize().with_context(|| format!("project root {} not found", root))?,
        None => env::current_dir().context("could not determine the current directory")?,
    };
    let config_path = cli_args.value_of("config").map(PathBuf::from);

    let project_definition = ProjectDefinition::from_root(&root_dir, config_path.as_deref())?;
    let mut testrunner = Testrunner::new(project_definition);

    match testrunner.run_setup() {
        Ok(()) => {}
        Err(err @ TestrunnerError::Setup(_)) => {
            error!("{}", err);
            return Ok(EXIT_SETUP_FAILED);
        }
        Err(err) => return Err(err.into()),
    }

    testrunner.load_testcases(cli_args.value_of("TEST"))?;
    testrunner.run_tests();

    if cli_args.is_present("json") {
        println!("{}", testrunner.generate_json_report()?);
    } else {
        print!("{}", testrunner.generate_table_report());
    }

    if testrunner.state().all_passed() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_TESTS_FAILED)
    }
}
