use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_tracing();

    let demo_mode = std::env::args().any(|arg| arg == "--demo");
    #[cfg(feature = "tauri-app")]
    if !demo_mode {
        autospot_app::run_tauri();
        return;
    }

    let result = if demo_mode {
        autospot_app::run_demo()
    } else {
        autospot_app::run()
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "autospot failed");
        eprintln!("failed to start autospot: {err}");
        std::process::exit(1);
    }
}
