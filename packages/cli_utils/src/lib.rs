#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the mangrove map tools.
//!
//! [`init_logger`] routes `log` output through `indicatif-log-bridge` so
//! log lines are suspended while progress bars redraw. Also provides the
//! per-category [`CategoryProgress`] bar shown while live views load, and
//! `dialoguer` credential prompts.

use std::collections::BTreeSet;
use std::time::Duration;

use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use mangrove_record_models::Category;
use pretty_env_logger::env_logger::Logger;

pub use indicatif::MultiProgress;

/// A bar that ticks once per category as each delivers its first
/// snapshot or error.
pub struct CategoryProgress {
    bar: ProgressBar,
    reported: BTreeSet<Category>,
}

impl CategoryProgress {
    /// Creates a bar over `categories`, starting as a spinner message.
    #[must_use]
    pub fn new(multi: &MultiProgress, message: &str, categories: &[Category]) -> Self {
        let bar = multi.add(ProgressBar::new(categories.len() as u64));
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} {wide_bar:.green/dim} {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        bar.set_message(message.to_string());

        Self {
            bar,
            reported: BTreeSet::new(),
        }
    }

    /// Marks `category` as reported. Repeat reports are ignored.
    pub fn report(&mut self, category: Category) {
        if self.reported.insert(category) {
            self.bar.inc(1);
            self.bar.set_message(format!("Loaded {}", category.title()));
        }
    }

    /// Removes the bar from the terminal.
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Prompts for an email (unless given) and a hidden password. With
/// `confirm` the password is asked for twice.
///
/// # Errors
///
/// Returns [`dialoguer::Error`] if the terminal cannot be read.
pub fn prompt_credentials(
    email: Option<String>,
    confirm: bool,
) -> Result<(String, String), dialoguer::Error> {
    let email = match email {
        Some(email) => email,
        None => Input::<String>::new().with_prompt("Email").interact_text()?,
    };

    let mut password = Password::new().with_prompt("Password");
    if confirm {
        password = password.with_confirmation("Repeat password", "Passwords do not match");
    }
    Ok((email, password.interact()?))
}

/// Log filter used when neither `MANGROVE_LOG` nor `RUST_LOG` is set:
/// warnings from dependencies, info from the mangrove crates.
pub const DEFAULT_LOG_FILTER: &str = "warn,mangrove=info";

/// Builds the timestamped logger for `filters` in `env_logger` directive
/// syntax. Missing or blank filters fall back to [`DEFAULT_LOG_FILTER`].
#[must_use]
pub fn build_logger(filters: Option<&str>) -> Logger {
    let filters = filters
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_LOG_FILTER);
    pretty_env_logger::formatted_timed_builder()
        .parse_filters(filters)
        .build()
}

/// Installs [`build_logger`] behind `indicatif-log-bridge`, reading
/// filters from `MANGROVE_LOG`, then `RUST_LOG`.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
/// When a logger is already installed it is left in place.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let filters = std::env::var("MANGROVE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok();
    let logger = build_logger(filters.as_deref());
    let max_level = logger.filter();

    let multi = MultiProgress::new();
    match indicatif_log_bridge::LogWrapper::new(multi.clone(), logger).try_init() {
        // try_init checks levels with an empty target, missing module directives.
        Ok(()) => log::set_max_level(max_level),
        Err(e) => log::debug!("Keeping existing logger: {e}"),
    }
    multi
}

#[cfg(test)]
mod tests {
    use log::Level;

    use super::*;

    fn enabled(logger: &Logger, target: &str, level: Level) -> bool {
        logger.matches(&log::Record::builder().target(target).level(level).build())
    }

    #[test]
    fn default_filter_quiets_dependencies() {
        let logger = build_logger(None);
        assert!(enabled(&logger, "mangrove_store::firebase::database", Level::Info));
        assert!(!enabled(&logger, "mangrove_store::firebase::database", Level::Debug));
        assert!(!enabled(&logger, "reqwest::connect", Level::Info));
        assert!(enabled(&logger, "hyper_util::client", Level::Warn));
    }

    #[test]
    fn explicit_filters_replace_default() {
        let logger = build_logger(Some("mangrove_map=debug"));
        assert!(enabled(&logger, "mangrove_map::live", Level::Debug));
        assert!(!enabled(&logger, "mangrove_store", Level::Info));

        let blank = build_logger(Some("  "));
        assert!(enabled(&blank, "mangrove_record::forms", Level::Info));
    }

    #[test]
    fn category_progress_ignores_repeat_reports() {
        let multi = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        let mut progress = CategoryProgress::new(&multi, "Loading", Category::all());
        progress.report(Category::Pollution);
        progress.report(Category::Pollution);
        progress.report(Category::Sightings);
        assert_eq!(progress.bar.position(), 2);
        progress.finish_and_clear();
    }
}
