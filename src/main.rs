fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("winit", log::LevelFilter::Error)
        .init();

    if let Err(e) = synth_probe_lib::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
