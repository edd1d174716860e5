use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "ortho_predict_lib=info";

pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(DEFAULT_FILTER))
        .with_target(false)
        .try_init();
}
