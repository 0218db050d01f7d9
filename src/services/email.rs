//! Email service for collaborator invitations

use crate::config::EmailConfig;
use anyhow::{anyhow, Result};
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

/// How a message left the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the SMTP relay
    Sent,
    /// Email is disabled; the message was written to the log
    Logged,
}

/// Email service for sending emails
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Send an invitation link for a course
    pub async fn send_invitation(
        &self,
        to_email: &str,
        course_title: &str,
        inviter: &str,
        link: &str,
    ) -> Result<Delivery> {
        let subject = format!("You're invited to collaborate on \"{}\"", course_title);
        let body = format!(
            "Hello,\n\n{} has invited you to collaborate on the course \"{}\".\n\n\
             Accept the invitation by signing in and opening this link:\n{}\n\n\
             If you were not expecting this, you can ignore this email.\n",
            inviter, course_title, link
        );

        if !self.config.enabled {
            tracing::info!(to = %to_email, %link, "Email disabled, invitation not sent");
            return Ok(Delivery::Logged);
        }

        self.send(to_email, subject, body).await?;
        tracing::info!(to = %to_email, "Invitation email sent");
        Ok(Delivery::Sent)
    }

    async fn send(&self, to_email: &str, subject: String, body: String) -> Result<()> {
        let config = &self.config;
        if config.smtp_host.is_empty() {
            return Err(anyhow!("SMTP host not configured"));
        }

        let from = format!("{} <{}>", config.from_name, config.from_address);
        let email = Message::builder()
            .from(from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(to_email.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }
        let mailer: AsyncSmtpTransport<Tokio1Executor> = builder.build();

        mailer
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}
