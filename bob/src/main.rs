use std::error::Error;

use tui::Styled;

mod cli;
mod env;
mod logging;
mod ownership;
mod phases;
mod resolver;

fn main() {
    if let Err(error) = cli::process() {
        report_error(&error);
        std::process::exit(1);
    }
}

fn report_error(error: &cli::Error) {
    eprintln!("{}: {}", "error".red(), sources(error).join(": "));
}

fn sources(error: &cli::Error) -> Vec<String> {
    let mut sources = vec![error.to_string()];
    let mut source = error.source();
    while let Some(error) = source.take() {
        sources.push(error.to_string());
        source = error.source();
    }
    sources
}
