//! dropview - single-session glTF viewer.
//!
//! Loads a model named on the command line (a `?file=...` location href) or
//! dropped onto the window, tracks the transient references each load needs,
//! and reports failures as user-facing messages.

mod app;
mod assets;
mod classify;
mod defaults;
mod error;
mod options;
mod render;
mod scene;
mod scope;
mod session;
mod validate;

#[cfg(test)]
mod test_support;

fn main() {
    if let Err(err) = app::run() {
        log::error!("Event loop error: {}", err);
        std::process::exit(1);
    }
}
