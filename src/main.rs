use std::{
    fs::File,
    io::{self, BufRead, BufReader, IsTerminal},
};

use anyhow::Context as _;
use inkwell::context::Context;
use kaleidoscope::{config, Config, Driver};

fn run_session<R: BufRead>(context: &Context, input: R, config: Config) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let summary = Driver::new(context, input, config).run(&mut out)?;
    if summary.errors > 0 {
        tracing::warn!("{} of {} units failed", summary.errors, summary.units);
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let matches = config::app().get_matches();
    let mut config = Config::from_matches(&matches);

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_writer(io::stderr)
        .without_time()
        .with_target(false)
        .init();

    let context = Context::create();

    match config.input.clone() {
        Some(path) => {
            let file = File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            config.prompt = None;
            run_session(&context, BufReader::new(file), config)
        }
        None => {
            let stdin = io::stdin();
            if !stdin.is_terminal() {
                config.prompt = None;
            }
            run_session(&context, stdin.lock(), config)
        }
    }
}
