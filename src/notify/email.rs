// src/notify/email.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{Channel, NotificationEvent};
use crate::config::EmailConfig;

pub struct EmailChannel {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailChannel {
    pub fn from_config(cfg: &EmailConfig) -> Result<Self> {
        let creds = Credentials::new(cfg.username.clone(), cfg.password.clone());

        let builder = if cfg.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_server)
                .context("invalid smtp server")?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.smtp_server)
        };
        let mailer = builder.port(cfg.smtp_port).credentials(creds).build();

        let from = cfg
            .from_address
            .parse()
            .context("invalid from address")?;
        let to = cfg
            .to_addresses
            .iter()
            .map(|a| a.parse().with_context(|| format!("invalid recipient {a}")))
            .collect::<Result<Vec<Mailbox>>>()?;

        Ok(Self { mailer, from, to })
    }
}

#[async_trait]
impl Channel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, ev: &NotificationEvent) -> Result<()> {
        let subject = format!("[Monitor] {}", ev.title);
        let mut body = format!("{}\n", ev.body);
        if let Some(link) = &ev.link {
            body.push_str(&format!("\nLink: {link}"));
        }

        let mut builder = Message::builder().from(self.from.clone());
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        let msg = builder
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body)
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}
