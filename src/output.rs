//! # Output Configuration
//!
//! Terminal rendering for the `changeport` command: whether to use colors
//! and emojis, and how effects and run results are printed.
//!
//! ## Respecting User Preferences
//!
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals

use std::env;

use console::Style;

use crate::effects::{DestinationEffect, EffectCounts, EffectKind};
use crate::migration::ExitStatus;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - Value of `--color`: `always`, `never` or `auto`
    ///
    /// # Behavior
    /// - `always` turns colors on, even when `NO_COLOR` is set
    /// - `never` turns colors off
    /// - anything else detects support from the environment
    ///
    /// Detection turns colors off for `NO_COLOR` (any value), `CLICOLOR=0`,
    /// `TERM=dumb` and a non-TTY stdout. `CLICOLOR_FORCE=1` wins over the
    /// TTY check.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // Presence alone disables colors, even if empty
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Colors and emojis regardless of the environment.
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Plain text regardless of the environment, for logs and tests.
    pub fn without_color() -> Self {
        Self { use_color: false }
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.use_color {
            style.force_styling(true).apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Pick an emoji or its plain-text stand-in.
///
/// # Arguments
/// * `config` - The output configuration
/// * `emoji_str` - Returned when colors are enabled
/// * `plain` - Returned when colors are disabled, e.g. `[SCAN]`
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

fn kind_style(kind: EffectKind) -> Style {
    match kind {
        EffectKind::Created => Style::new().green(),
        EffectKind::Updated => Style::new().cyan(),
        EffectKind::Noop => Style::new().dim(),
        EffectKind::Error => Style::new().red().bold(),
    }
}

/// One line describing an effect, e.g.
/// `CREATED  1a2b3c4d5e6f  Add parser (refs/heads/main)`.
///
/// # Arguments
/// * `config` - Decides whether the effect kind is colored
/// * `effect` - The effect to describe
///
/// # Behavior
/// The kind is padded to eight columns and followed by the short origin
/// revision and summary. A failed step is appended as `[step: name]` and the
/// destination reference in parentheses.
pub fn render_effect(config: &OutputConfig, effect: &DestinationEffect) -> String {
    let kind = format!("{:<8}", effect.kind.to_string());
    let mut line = format!(
        "{} {}  {}",
        config.paint(kind_style(effect.kind), &kind),
        effect.origin_revision.short(),
        effect.summary
    );
    if let Some(step) = &effect.failed_step {
        line.push_str(&format!(" [step: {}]", step));
    }
    if let Some(dest) = &effect.destination_ref {
        line.push_str(&format!(" ({})", dest));
    }
    line
}

/// The final status line of a run.
///
/// # Arguments
/// * `config` - Decides between emoji and bracketed text markers
/// * `status` - Aggregated run status
/// * `effects` - All effects of the run, counted per kind
pub fn render_status(config: &OutputConfig, status: ExitStatus, effects: &[DestinationEffect]) -> String {
    let counts = EffectCounts::of(effects);
    let (icon, plain, style) = match status {
        ExitStatus::Success => ("✅", "[OK]", Style::new().green().bold()),
        ExitStatus::NoOp => ("💤", "[NOOP]", Style::new().dim()),
        ExitStatus::PartialSuccess => ("⚠️", "[WARN]", Style::new().yellow().bold()),
        ExitStatus::Error => ("❌", "[ERR]", Style::new().red().bold()),
    };
    format!(
        "{} {}: {} created, {} updated, {} no-op, {} failed",
        emoji(config, icon, plain),
        config.paint(style, &status.to_string()),
        counts.created,
        counts.updated,
        counts.noop,
        counts.error
    )
}
