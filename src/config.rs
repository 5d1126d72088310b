use std::path::PathBuf;

use clap::{crate_version, App, Arg, ArgMatches};
use tracing::Level;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// source file, stdin when absent
    pub input: Option<PathBuf>,
    pub module_name: String,
    /// printed before each top-level unit is read
    pub prompt: Option<String>,
    /// run the function pass pipeline on every definition
    pub optimize: bool,
    /// JIT-evaluate top-level expressions
    pub evaluate: bool,
    /// print the IR of each generated function
    pub emit_ir: bool,
    /// print the whole module once input is exhausted
    pub dump_module: bool,
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: None,
            module_name: "kaleidoscope".to_string(),
            prompt: Some("ready> ".to_string()),
            optimize: false,
            evaluate: true,
            emit_ir: true,
            dump_module: false,
            log_level: Level::WARN,
        }
    }
}

pub fn app() -> App<'static, 'static> {
    App::new("kaleidoscope")
        .version(crate_version!())
        .about("the kaleidoscope language jit compiler")
        .arg(
            Arg::with_name("input")
                .value_name("INPUT")
                .help("source file to read, stdin when omitted")
                .index(1),
        )
        .arg(
            Arg::with_name("optimize")
                .short("O")
                .long("optimize")
                .help("run instcombine, reassociate, gvn and simplifycfg on each function"),
        )
        .arg(
            Arg::with_name("no-eval")
                .long("no-eval")
                .help("generate top-level expressions without evaluating them"),
        )
        .arg(
            Arg::with_name("no-ir")
                .long("no-ir")
                .help("do not print the IR of generated functions"),
        )
        .arg(
            Arg::with_name("dump-module")
                .long("dump-module")
                .help("print the whole module at end of input"),
        )
        .arg(
            Arg::with_name("module-name")
                .long("module-name")
                .takes_value(true)
                .value_name("NAME")
                .help("name of the generated module"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("log more, repeat for more detail"),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .conflicts_with("verbose")
                .help("only log errors"),
        )
}

impl Config {
    pub fn from_matches(matches: &ArgMatches<'_>) -> Self {
        let defaults = Config::default();

        let log_level = if matches.is_present("quiet") {
            Level::ERROR
        } else {
            match matches.occurrences_of("verbose") {
                0 => defaults.log_level,
                1 => Level::INFO,
                2 => Level::DEBUG,
                _ => Level::TRACE,
            }
        };

        Config {
            input: matches.value_of("input").map(PathBuf::from),
            module_name: matches
                .value_of("module-name")
                .map_or(defaults.module_name, str::to_string),
            prompt: defaults.prompt,
            optimize: matches.is_present("optimize"),
            evaluate: !matches.is_present("no-eval"),
            emit_ir: !matches.is_present("no-ir"),
            dump_module: matches.is_present("dump-module"),
            log_level,
        }
    }
}
