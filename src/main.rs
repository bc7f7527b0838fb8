//! # Voxel Streamer Entry Point
//!
//! Runs the streaming demo from the library's `run()` function.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release
//! ```

fn main() {
    if let Err(err) = voxel_streamer::run() {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
