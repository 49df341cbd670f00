//! Report mail over SMTP.

use std::time::Duration;

use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::settings::EmailSettings;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Mismatching days are always mailed, clean days only with `on_ok`.
/// Nothing is mailed on a dry run.
pub fn should_mail(email: Option<&EmailSettings>, dry_run: bool, day_ok: bool) -> bool {
    match email {
        Some(email) => email.enabled && !dry_run && (!day_ok || email.on_ok),
        None => false,
    }
}

/// `<prefix>: Z <z> <date>`
pub fn subject(prefix: &str, z_number: u32, report_date: NaiveDate) -> String {
    format!("{prefix}: Z {z_number} {report_date}")
}

pub fn build_message(email: &EmailSettings, subject: &str, body: &str) -> Result<Message, String> {
    let from: Mailbox = email
        .from
        .parse()
        .map_err(|e| format!("email.from '{}': {e}", email.from))?;
    let mut builder = Message::builder().from(from).subject(subject);
    for to in &email.to {
        let mailbox: Mailbox = to.parse().map_err(|e| format!("email.to '{to}': {e}"))?;
        builder = builder.to(mailbox);
    }
    builder
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| format!("cannot build mail: {e}"))
}

/// Send one report mail. Blocks until the server accepts or refuses it.
pub fn send(email: &EmailSettings, subject: &str, body: &str) -> Result<(), String> {
    let message = build_message(email, subject, body)?;

    let builder = if email.smtp_starttls {
        SmtpTransport::starttls_relay(&email.smtp_host)
            .map_err(|e| format!("SMTP {}: {e}", email.smtp_host))?
    } else {
        SmtpTransport::builder_dangerous(&email.smtp_host)
    };
    let mut builder = builder.port(email.smtp_port).timeout(Some(SMTP_TIMEOUT));
    if let Some(ref user) = email.smtp_user {
        let pass = email.smtp_pass.clone().unwrap_or_default();
        builder = builder.credentials(Credentials::new(user.clone(), pass));
    }

    builder
        .build()
        .send(&message)
        .map_err(|e| format!("SMTP {}:{}: {e}", email.smtp_host, email.smtp_port))?;
    log::info!("mailed '{subject}' to {}", email.to.join(", "));
    Ok(())
}
