//! Email Service
//!
//! The outbound-mail port, its SMTP implementation, and the template
//! rendering for verification and password-reset messages.

use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use tera::{Context, Tera};

use crate::config::EmailConfig;
use crate::utils::error::{AppError, AppResult};

/// A rendered outbound email
#[derive(Debug, Clone)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Outbound-mail transport port
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver one message, failing with `EmailDelivery` on transport
    /// errors
    async fn send(&self, to: &str, content: &EmailContent) -> AppResult<()>;
}

/// SMTP transport backed by lettre
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSender {
    pub fn new(config: &EmailConfig) -> AppResult<Self> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| AppError::Internal(format!("Failed to configure SMTP relay: {}", e)))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid FROM address: {}", e)))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl EmailSender for SmtpSender {
    async fn send(&self, to: &str, content: &EmailContent) -> AppResult<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to
                .parse()
                .map_err(|e| AppError::EmailDelivery(format!("Invalid recipient: {}", e)))?)
            .subject(&content.subject)
            .multipart(MultiPart::alternative_plain_html(
                content.text.clone(),
                content.html.clone(),
            ))
            .map_err(|e| AppError::EmailDelivery(format!("Failed to build message: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::EmailDelivery(e.to_string()))?;

        log::debug!("Sent email to {}", to);
        Ok(())
    }
}

const VERIFICATION_HTML: &str = r#"
<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h1>Verify your email address</h1>
    <p>Hello {{ name }},</p>
    <p>Please confirm this email address for your {{ app_name }} account by
    following the link below:</p>
    <p><a href="{{ link }}">Verify email address</a></p>
    <p>The link expires in {{ expires_in }}.</p>
    <p>If you didn't request this, you can safely ignore this email.</p>
</body>
</html>
"#;

const VERIFICATION_TEXT: &str = r#"
Verify your email address

Hello {{ name }},

Please confirm this email address for your {{ app_name }} account:

{{ link }}

The link expires in {{ expires_in }}.

If you didn't request this, you can safely ignore this email.
"#;

const RESET_HTML: &str = r#"
<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h1>Reset your password</h1>
    <p>Hello {{ name }},</p>
    <p>A password reset was requested for your {{ app_name }} account.
    Follow the link below to choose a new password:</p>
    <p><a href="{{ link }}">Reset password</a></p>
    <p>The link expires in {{ expires_in }}.</p>
    <p>If you didn't request this, you can safely ignore this email.</p>
</body>
</html>
"#;

const RESET_TEXT: &str = r#"
Reset your password

Hello {{ name }},

A password reset was requested for your {{ app_name }} account.
Choose a new password here:

{{ link }}

The link expires in {{ expires_in }}.

If you didn't request this, you can safely ignore this email.
"#;

/// Renders and dispatches the service's transactional emails
pub struct Mailer {
    sender: Arc<dyn EmailSender>,
    templates: Tera,
    app_name: String,
}

impl Mailer {
    pub fn new(sender: Arc<dyn EmailSender>, app_name: String) -> AppResult<Self> {
        let mut templates = Tera::default();
        templates
            .add_raw_templates([
                ("verification.html", VERIFICATION_HTML),
                ("verification.txt", VERIFICATION_TEXT),
                ("reset.html", RESET_HTML),
                ("reset.txt", RESET_TEXT),
            ])
            .map_err(|e| AppError::Internal(format!("Failed to load email templates: {}", e)))?;

        Ok(Self {
            sender,
            templates,
            app_name,
        })
    }

    /// Send a verification email carrying the plaintext token
    pub async fn send_verification_email(
        &self,
        to: &str,
        name: &str,
        token: &str,
        redirect_url: Option<&str>,
        expires_in: &str,
    ) -> AppResult<()> {
        let content = self.render(
            "verification",
            "Verify your email address",
            name,
            token,
            redirect_url,
            expires_in,
        )?;
        self.sender.send(to, &content).await
    }

    /// Send a password-reset email carrying the plaintext token
    pub async fn send_password_reset_email(
        &self,
        to: &str,
        name: &str,
        token: &str,
        redirect_url: Option<&str>,
        expires_in: &str,
    ) -> AppResult<()> {
        let content = self.render(
            "reset",
            "Reset your password",
            name,
            token,
            redirect_url,
            expires_in,
        )?;
        self.sender.send(to, &content).await
    }

    fn render(
        &self,
        template: &str,
        subject: &str,
        name: &str,
        token: &str,
        redirect_url: Option<&str>,
        expires_in: &str,
    ) -> AppResult<EmailContent> {
        let link = match redirect_url {
            Some(url) if url.contains('?') => format!("{}&token={}", url, token),
            Some(url) => format!("{}?token={}", url, token),
            None => token.to_string(),
        };

        let mut context = Context::new();
        context.insert("name", name);
        context.insert("app_name", &self.app_name);
        context.insert("link", &link);
        context.insert("expires_in", expires_in);

        let html = self
            .templates
            .render(&format!("{}.html", template), &context)
            .map_err(|e| AppError::Internal(format!("Template render failed: {}", e)))?;
        let text = self
            .templates
            .render(&format!("{}.txt", template), &context)
            .map_err(|e| AppError::Internal(format!("Template render failed: {}", e)))?;

        Ok(EmailContent {
            subject: subject.to_string(),
            html,
            text,
        })
    }
}

/// Development sender that logs messages instead of delivering them
///
/// Used when no SMTP configuration is present so the flows that send
/// mail still work end to end locally.
pub struct LogSender;

#[async_trait]
impl EmailSender for LogSender {
    async fn send(&self, to: &str, content: &EmailContent) -> AppResult<()> {
        log::info!("Email to {}: {}\n{}", to, content.subject, content.text);
        Ok(())
    }
}

/// Recording sender for tests: captures messages and can be told to fail
#[cfg(test)]
pub struct RecordingSender {
    pub sent: std::sync::Mutex<Vec<(String, EmailContent)>>,
    fail: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RecordingSender {
    pub fn new() -> Self {
        Self {
            sent: std::sync::Mutex::new(Vec::new()),
            fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_recipient(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(to, _)| to.clone())
    }

    /// Extract the token query parameter from the last sent message body
    pub fn last_token(&self) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        let (_, content) = sent.last()?;
        let start = content.text.find("token=")? + "token=".len();
        let rest = &content.text[start..];
        let end = rest
            .find(|c: char| !c.is_ascii_hexdigit())
            .unwrap_or(rest.len());
        Some(rest[..end].to_string())
    }
}

#[cfg(test)]
#[async_trait]
impl EmailSender for RecordingSender {
    async fn send(&self, to: &str, content: &EmailContent) -> AppResult<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AppError::EmailDelivery("SMTP transport refused".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), content.clone()));
        Ok(())
    }
}
