//! `kasa.toml`: where the inputs live, how they are named, and the engine
//! configuration.
//!
//! ```toml
//! [paths]
//! ekj_dir = "EKJ"
//! old_dir = "OLD"
//! output_dir = "reports"
//!
//! [discovery]
//! encoding = "windows-1257"
//!
//! [recon.tolerance]
//! amount_cents = 1
//!
//! [email]
//! from = "kasa@example.com"
//! to = ["buhalterija@example.com"]
//! smtp_host = "smtp.example.com"
//! ```
//!
//! Relative paths are resolved against the settings file's directory.

use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use kasa_recon::{ConfigError, ReconConfig};
use lettre::message::Mailbox;
use serde::Deserialize;

use crate::exit_codes::{EXIT_INVALID_CONFIG, EXIT_USAGE};
use crate::CliError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub paths: PathSettings,
    pub discovery: DiscoverySettings,
    pub report: ReportSettings,
    pub recon: ReconConfig,
    /// Report mail; absent means no mail.
    pub email: Option<EmailSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathSettings {
    /// Searched recursively; registers keep journals in per-shop folders.
    pub ekj_dir: PathBuf,
    pub old_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            ekj_dir: PathBuf::from("EKJ"),
            old_dir: PathBuf::from("OLD"),
            output_dir: PathBuf::from("reports"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoverySettings {
    /// EKJ journal file extension, without the dot.
    pub ekj_extension: String,
    /// File name glob of OLD sales exports (case-insensitive).
    pub old_pattern: String,
    /// File name glob never treated as a sales export.
    pub old_exclude_pattern: String,
    /// Legacy encoding for input files that are not valid UTF-8.
    pub encoding: String,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            ekj_extension: "txt".into(),
            old_pattern: "riv_sales_*".into(),
            old_exclude_pattern: "riv_invoices_*".into(),
            encoding: "windows-1257".into(),
        }
    }
}

impl DiscoverySettings {
    pub fn fallback_encoding(&self) -> &'static Encoding {
        Encoding::for_label(self.encoding.as_bytes()).unwrap_or(encoding_rs::WINDOWS_1257)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportSettings {
    pub file_prefix: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            file_prefix: "analize".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmailSettings {
    pub enabled: bool,
    /// Also mail days that reconciled cleanly.
    pub on_ok: bool,
    pub from: String,
    pub to: Vec<String>,
    pub subject_prefix: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_starttls: bool,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            on_ok: false,
            from: String::new(),
            to: Vec::new(),
            subject_prefix: "EKJ vs OLD patikra".into(),
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_starttls: true,
            smtp_user: None,
            smtp_pass: None,
        }
    }
}

impl EmailSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Validation(msg));
        if self.smtp_host.trim().is_empty() {
            return invalid("email.smtp_host is required".into());
        }
        if self.smtp_port == 0 {
            return invalid("email.smtp_port must be 1-65535".into());
        }
        if self.to.is_empty() {
            return invalid("email.to needs at least one recipient".into());
        }
        let addresses = std::iter::once(("from", &self.from)).chain(self.to.iter().map(|a| ("to", a)));
        for (field, address) in addresses {
            if let Err(e) = address.parse::<Mailbox>() {
                return invalid(format!("email.{field} '{address}': {e}"));
            }
        }
        if self.smtp_user.is_some() && self.smtp_pass.is_none() {
            return invalid("email.smtp_user is set but email.smtp_pass is not".into());
        }
        Ok(())
    }
}

impl Settings {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let settings: Settings =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.recon.validate()?;

        let d = &self.discovery;
        if d.ekj_extension.trim().is_empty() || d.ekj_extension.contains(['/', '\\', '*']) {
            return Err(ConfigError::Validation(format!(
                "discovery.ekj_extension must be a plain extension, got '{}'",
                d.ekj_extension
            )));
        }
        for (name, pattern) in [
            ("old_pattern", &d.old_pattern),
            ("old_exclude_pattern", &d.old_exclude_pattern),
        ] {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("discovery.{name} '{pattern}': {e}"))
            })?;
        }
        if Encoding::for_label(d.encoding.as_bytes()).is_none() {
            return Err(ConfigError::Validation(format!(
                "discovery.encoding: unknown encoding '{}'",
                d.encoding
            )));
        }

        if let Some(ref email) = self.email {
            if email.enabled {
                email.validate()?;
            }
        }

        let prefix = &self.report.file_prefix;
        if prefix.trim().is_empty() || prefix.contains(['/', '\\']) {
            return Err(ConfigError::Validation(format!(
                "report.file_prefix must be a non-empty file name part, got '{prefix}'"
            )));
        }
        Ok(())
    }

    /// Read, validate and resolve paths against the file's directory.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let text = std::fs::read_to_string(path).map_err(|e| CliError {
            code: EXIT_USAGE,
            message: format!("cannot read settings {}: {e}", path.display()),
            hint: None,
        })?;
        let mut settings = Self::from_toml(&text).map_err(|e| CliError {
            code: EXIT_INVALID_CONFIG,
            message: format!("{}: {e}", path.display()),
            hint: None,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        settings.resolve_paths(base_dir);
        Ok(settings)
    }

    fn resolve_paths(&mut self, base_dir: &Path) {
        let p = &mut self.paths;
        p.ekj_dir = base_dir.join(&p.ekj_dir);
        p.old_dir = base_dir.join(&p.old_dir);
        p.output_dir = base_dir.join(&p.output_dir);
    }
}
