use anyhow::Context;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lettre::message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::bookings::repo_types::{fmt_date, fmt_time, Ticket};
use crate::config::SmtpConfig;

const QR_CONTENT_ID: &str = "ticket-qr";

/// Everything the confirmation email needs.
#[derive(Debug, Clone, Copy)]
pub struct TicketEmail<'a> {
    pub to: &'a str,
    pub name: &'a str,
    pub ticket: &'a Ticket,
    pub qr_base64: Option<&'a str>,
}

impl TicketEmail<'_> {
    pub fn subject(&self) -> String {
        format!("Your CineVibe ticket for {}", self.ticket.movie)
    }

    pub fn html_body(&self) -> String {
        let t = self.ticket;
        let qr = if self.qr_base64.is_some() {
            format!(
                r#"<p><img src="cid:{QR_CONTENT_ID}" alt="Ticket QR code" width="200" height="200"></p>
        <p style="color: #666; font-size: 13px;">Show this code at the entrance.</p>"#
            )
        } else {
            String::new()
        };
        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>Your ticket</title></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
        <h2 style="color: #ca8a04;">Booking confirmed</h2>
        <p>Hi {name}, here is your ticket.</p>
        <table>
            <tr><td><strong>Movie</strong></td><td>{movie}</td></tr>
            <tr><td><strong>Theater</strong></td><td>{theater}</td></tr>
            <tr><td><strong>Seats</strong></td><td>{seats}</td></tr>
            <tr><td><strong>Date</strong></td><td>{date}</td></tr>
            <tr><td><strong>Time</strong></td><td>{time}</td></tr>
            <tr><td><strong>Price</strong></td><td>&#8377;{price}</td></tr>
            <tr><td><strong>Ticket ID</strong></td><td>{id}</td></tr>
        </table>
        {qr}
    </div>
</body>
</html>"#,
            name = escape_html(self.name),
            movie = escape_html(&t.movie),
            theater = escape_html(&t.theater),
            seats = escape_html(&t.seats.join(", ")),
            date = fmt_date(t.show_date),
            time = fmt_time(t.show_time),
            price = t.price,
            id = t.id,
        )
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// False when no mail transport is configured.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn send_ticket(&self, email: &TicketEmail<'_>) -> anyhow::Result<()>;
}

/// Used when SMTP is not configured: records the intent in the log only.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn send_ticket(&self, email: &TicketEmail<'_>) -> anyhow::Result<()> {
        info!(to = %email.to, ticket_id = %email.ticket.id, "smtp not configured; confirmation email not sent");
        Ok(())
    }
}

#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .with_context(|| format!("smtp relay {}", cfg.host))?
            .port(cfg.port);
        if !cfg.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                cfg.username.clone(),
                cfg.password.clone(),
            ));
        }
        let from = cfg
            .from
            .parse::<Mailbox>()
            .with_context(|| format!("invalid MAIL_FROM {:?}", cfg.from))?;
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

fn build_message(from: &Mailbox, email: &TicketEmail<'_>) -> anyhow::Result<Message> {
    let to = email
        .to
        .parse::<Mailbox>()
        .with_context(|| format!("invalid recipient {:?}", email.to))?;
    let builder = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject());
    let html = SinglePart::html(email.html_body());

    let message = match email.qr_base64 {
        Some(b64) => {
            let png = STANDARD.decode(b64).context("decode qr image")?;
            let png_type = ContentType::parse("image/png")
                .map_err(|e| anyhow::anyhow!("content type: {e}"))?;
            let image = Attachment::new_inline(QR_CONTENT_ID.to_string()).body(png, png_type);
            builder.multipart(MultiPart::related().singlepart(html).singlepart(image))
        }
        None => builder.singlepart(html),
    }
    .context("build email")?;
    Ok(message)
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_ticket(&self, email: &TicketEmail<'_>) -> anyhow::Result<()> {
        let message = build_message(&self.from, email)?;
        self.transport.send(message).await.context("smtp send")?;
        info!(to = %email.to, ticket_id = %email.ticket.id, "confirmation email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime, time};
    use uuid::Uuid;

    fn ticket() -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            movie: "Tom & Jerry <3D>".into(),
            theater: "PVR".into(),
            seats: vec!["A1".into(), "A2".into()],
            show_date: date!(2025 - 03 - 01),
            show_time: time!(18:00),
            price: 400,
            user_id: Uuid::new_v4(),
            qr_code: None,
            qr_uuid: None,
            created_at: datetime!(2025-02-20 10:00 UTC),
        }
    }

    #[test]
    fn body_escapes_and_embeds_qr_only_when_present() {
        let t = ticket();
        let without = TicketEmail { to: "a@b.co", name: "Asha", ticket: &t, qr_base64: None };
        let body = without.html_body();
        assert!(body.contains("Tom &amp; Jerry &lt;3D&gt;"));
        assert!(body.contains("A1, A2"));
        assert!(body.contains("2025-03-01"));
        assert!(!body.contains("cid:ticket-qr"));

        let with = TicketEmail { qr_base64: Some("iVBORw0KGgo="), ..without };
        assert!(with.html_body().contains("cid:ticket-qr"));
        assert_eq!(with.subject(), "Your CineVibe ticket for Tom & Jerry <3D>");
    }

    #[test]
    fn smtp_message_builds_with_inline_qr() {
        let from: Mailbox = "CineVibe <no-reply@cinevibe.local>".parse().unwrap();
        let t = ticket();
        let email = TicketEmail { to: "asha@example.com", name: "Asha", ticket: &t, qr_base64: Some("iVBORw0KGgo=") };
        let raw = String::from_utf8(build_message(&from, &email).unwrap().formatted()).unwrap();
        assert!(raw.contains("multipart/related"));
        assert!(raw.contains("ticket-qr"));
        assert!(raw.contains("asha@example.com"));

        let bad = TicketEmail { to: "not-an-address", ..email };
        assert!(build_message(&from, &bad).is_err());
    }
}
