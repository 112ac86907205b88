use {
    console::Emoji,
    indicatif::{ProgressBar, ProgressStyle},
    std::time::Duration,
};

pub mod cli;
pub mod cluster_finder;
pub mod fault_injector;
pub mod playlist;
pub mod process;

#[macro_export]
macro_rules! boxed_error {
    ($message:expr) => {
        Box::<dyn std::error::Error>::from($message)
    };
}

pub static LOOKING_GLASS: Emoji = Emoji("🔍 ", "");
pub static BOMB: Emoji = Emoji("💣 ", "");

/// Creates a new process bar for processing that will take an unknown amount of time
pub fn new_spinner_progress_bar() -> ProgressBar {
    let progress_bar = ProgressBar::new(42);
    progress_bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {wide_msg}")
            .expect("ProgresStyle::template direct input to be correct"),
    );
    progress_bar.enable_steady_tick(Duration::from_millis(100));
    progress_bar
}
