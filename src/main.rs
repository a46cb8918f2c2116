/*
 * Bubbles
 *
 * Opens a window onto a glass full of bubbles. Bubbles are born in the bottom
 * band, float up as they grow, eat smaller neighbours they overlap, and rise
 * away when they die, only to be reborn.
 *
 * Set RUST_LOG to see the lifecycle (e.g. RUST_LOG=bubbles=debug) and
 * BUBBLES_CONFIG to a JSON file to override the defaults.
 */

use bubbles::viewer;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bubbles=info")))
        .init();

    nannou::app(viewer::model).update(viewer::update).run();
}
