use std::sync::OnceLock;

use chip8vm::{
    cli::Args,
    host,
};
use clap::Parser;
use macroquad::window::Conf;

static ARGS: OnceLock<Args> = OnceLock::new();

fn args() -> &'static Args {
    ARGS.get_or_init(Args::parse)
}

fn window_conf() -> Conf {
    host::window_conf(args())
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if let Err(err) = chip8vm::run(args().clone()).await {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}
