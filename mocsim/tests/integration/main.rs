// Integration tests follow the organization suggested by Matklad:
// https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod absence_propagation;
mod export_folding;
mod introspection;
mod pipeline_execution;
mod scenario_dataflow;
mod timed_delay;

use std::sync::{Arc, Mutex};

/// Installs a log subscriber configured by `RUST_LOG`, if none is installed
/// yet.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Returns a shared vector and a callback pushing to it.
fn collector<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl FnMut(&T) + Send + 'static)
{
    let collected = Arc::new(Mutex::new(Vec::new()));
    let sink_collected = collected.clone();

    (collected, move |x: &T| sink_collected.lock().unwrap().push(x.clone()))
}
