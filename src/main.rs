mod actions;
mod cli;
mod config;
mod input;
mod library;
mod logging;
mod matcher;
mod normalize;
mod pipeline;
mod recognizer;
mod session;
mod stroke;
mod tracker;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
