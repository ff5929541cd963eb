use async_trait::async_trait;

use crate::CoreResult;

const BRAND: &str = "Avocado Air";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> CoreResult<()>;
}

pub fn password_reset_email(to: &str, reset_url: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Reset your {} password", BRAND),
        text_body: format!(
            "We received a request to reset your {} password.\n\n\
             Open this link to choose a new one:\n{}\n\n\
             The link expires in one hour. If you did not ask for a reset you can ignore this email.",
            BRAND, reset_url
        ),
        html_body: format!(
            "<h2>{brand}</h2>\
             <p>We received a request to reset your password.</p>\
             <p><a href=\"{url}\">Reset password</a></p>\
             <p>The link expires in one hour. If you did not ask for a reset you can ignore this email.</p>",
            brand = BRAND,
            url = reset_url
        ),
    }
}

pub fn two_factor_enabled_email(to: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("Two-factor authentication enabled on your {} account", BRAND),
        text_body: format!(
            "Two-factor authentication is now enabled on your {} account.\n\n\
             Keep your backup codes somewhere safe. Each one works once.\n\
             If you did not make this change, reset your password immediately.",
            BRAND
        ),
        html_body: format!(
            "<h2>{}</h2>\
             <p>Two-factor authentication is now enabled on your account.</p>\
             <p>Keep your backup codes somewhere safe. Each one works once.</p>\
             <p>If you did not make this change, reset your password immediately.</p>",
            BRAND
        ),
    }
}

/// Link placed in reset emails.
pub fn reset_link(frontend_url: &str, token: &str) -> String {
    format!(
        "{}/reset-password?token={}",
        frontend_url.trim_end_matches('/'),
        urlencoding::encode(token)
    )
}
