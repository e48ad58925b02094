//! Guest-facing booking emails.
//!
//! Notifications are strictly fire-and-forget: a reservation's state
//! transition must never wait on, or fail because of, SMTP.

use anyhow::Result;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::EmailConfig;
use crate::db::Reservation;

/// The details the booking emails are rendered from, collapsed from a
/// reservation group.
#[derive(Debug, Clone)]
pub struct BookingSummary {
    pub booking_number: String,
    pub guest_name: String,
    pub guest_email: String,
    pub check_in: String,
    pub check_out: String,
    pub rooms: usize,
    pub total_amount: f64,
}

impl BookingSummary {
    pub fn from_reservations(reservations: &[Reservation]) -> Option<Self> {
        let first = reservations.first()?;
        Some(Self {
            booking_number: first.booking_number.clone(),
            guest_name: first.guest_name.clone(),
            guest_email: first.guest_email.clone(),
            check_in: first.check_in.clone(),
            check_out: first.check_out.clone(),
            rooms: reservations.len(),
            total_amount: reservations.iter().map(|r| r.total_amount).sum(),
        })
    }
}

/// Service for sending booking emails
pub struct BookingMailer {
    config: EmailConfig,
}

impl BookingMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Check if email sending is configured and enabled
    pub fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }

    /// Send a booking confirmation email
    pub async fn send_booking_confirmation(&self, summary: &BookingSummary) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!(
                "Email not configured, skipping confirmation email to {}",
                summary.guest_email
            );
            return Ok(());
        }

        let subject = format!("Booking {} confirmed", summary.booking_number);
        let html_body = render_confirmation_html(summary);
        let text_body = render_confirmation_text(summary);

        self.send_email(&summary.guest_email, &subject, &html_body, &text_body)
            .await
    }

    /// Send a booking rejection email after a failed or refused payment
    pub async fn send_booking_rejection(&self, summary: &BookingSummary) -> Result<()> {
        if !self.is_enabled() {
            tracing::warn!(
                "Email not configured, skipping rejection email to {}",
                summary.guest_email
            );
            return Ok(());
        }

        let subject = format!("Booking {} could not be completed", summary.booking_number);
        let html_body = render_rejection_html(summary);
        let text_body = render_rejection_text(summary);

        self.send_email(&summary.guest_email, &subject, &html_body, &text_body)
            .await
    }

    /// Send an email with HTML and plain text versions
    async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<()> {
        let smtp_host = self
            .config
            .smtp_host
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("SMTP host not configured"))?;
        let from_address = self
            .config
            .from_address
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("From address not configured"))?;

        let from_mailbox = format!("{} <{}>", self.config.from_name, from_address);
        let from: Mailbox = from_mailbox.parse()?;
        let to: Mailbox = to_email.parse()?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        let mailer = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer
        };

        mailer.build().send(email).await?;

        tracing::info!("Sent '{}' to {}", subject, to_email);
        Ok(())
    }
}

/// Queue a confirmation email without blocking the caller.
pub fn spawn_confirmation(mailer: Arc<BookingMailer>, reservations: Vec<Reservation>) {
    let Some(summary) = BookingSummary::from_reservations(&reservations) else {
        return;
    };
    tokio::spawn(async move {
        if let Err(e) = mailer.send_booking_confirmation(&summary).await {
            tracing::error!(
                booking_number = %summary.booking_number,
                "Failed to send confirmation email: {e}"
            );
        }
    });
}

/// Queue a rejection email without blocking the caller.
pub fn spawn_rejection(mailer: Arc<BookingMailer>, reservations: Vec<Reservation>) {
    let Some(summary) = BookingSummary::from_reservations(&reservations) else {
        return;
    };
    tokio::spawn(async move {
        if let Err(e) = mailer.send_booking_rejection(&summary).await {
            tracing::error!(
                booking_number = %summary.booking_number,
                "Failed to send rejection email: {e}"
            );
        }
    });
}

fn render_confirmation_text(s: &BookingSummary) -> String {
    format!(
        "Hi {},\n\n\
         Your booking {} is confirmed.\n\n\
         Check-in:  {}\n\
         Check-out: {}\n\
         Rooms:     {}\n\
         Total:     {:.2}\n\n\
         We look forward to hosting you.\n",
        s.guest_name, s.booking_number, s.check_in, s.check_out, s.rooms, s.total_amount
    )
}

fn render_confirmation_html(s: &BookingSummary) -> String {
    format!(
        r#"<div style="font-family: sans-serif; max-width: 560px;">
  <h2>Booking confirmed</h2>
  <p>Hi {},</p>
  <p>Your booking <strong>{}</strong> is confirmed.</p>
  <table cellpadding="6">
    <tr><td>Check-in</td><td><strong>{}</strong></td></tr>
    <tr><td>Check-out</td><td><strong>{}</strong></td></tr>
    <tr><td>Rooms</td><td>{}</td></tr>
    <tr><td>Total</td><td>{:.2}</td></tr>
  </table>
  <p>We look forward to hosting you.</p>
</div>"#,
        s.guest_name, s.booking_number, s.check_in, s.check_out, s.rooms, s.total_amount
    )
}

fn render_rejection_text(s: &BookingSummary) -> String {
    format!(
        "Hi {},\n\n\
         Unfortunately your booking {} could not be completed because the \
         payment did not go through.\n\n\
         No amount has been captured for this booking. You are welcome to \
         try again; availability for {} to {} is not held.\n",
        s.guest_name, s.booking_number, s.check_in, s.check_out
    )
}

fn render_rejection_html(s: &BookingSummary) -> String {
    format!(
        r#"<div style="font-family: sans-serif; max-width: 560px;">
  <h2>Booking not completed</h2>
  <p>Hi {},</p>
  <p>Unfortunately your booking <strong>{}</strong> could not be completed
  because the payment did not go through.</p>
  <p>No amount has been captured. You are welcome to try again;
  availability for {} to {} is not held.</p>
</div>"#,
        s.guest_name, s.booking_number, s.check_in, s.check_out
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(booking_number: &str, total: f64) -> Reservation {
        use crate::db::{PaymentStatus, ReservationStatus};
        Reservation {
            id: "res-1".to_string(),
            booking_number: booking_number.to_string(),
            room_id: "r1".to_string(),
            guest_name: "Asha Rao".to_string(),
            guest_email: "asha@example.com".to_string(),
            guest_phone: "5550142".to_string(),
            check_in: "2030-12-02".to_string(),
            check_out: "2030-12-06".to_string(),
            total_nights: 4,
            status: ReservationStatus::Confirmed,
            payment_status: PaymentStatus::Paid,
            room_charges: total,
            tax_amount: 0.0,
            total_amount: total,
            advance_paid: total,
            balance_amount: 0.0,
            created_at: "2030-01-01T00:00:00Z".to_string(),
            updated_at: "2030-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_summary_sums_group_totals() {
        let rows = vec![reservation("BK1", 8000.0), reservation("BK1", 6000.0)];
        let summary = BookingSummary::from_reservations(&rows).unwrap();
        assert_eq!(summary.booking_number, "BK1");
        assert_eq!(summary.rooms, 2);
        assert_eq!(summary.total_amount, 14000.0);
    }

    #[test]
    fn test_summary_of_empty_group_is_none() {
        assert!(BookingSummary::from_reservations(&[]).is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_mailer_skips_quietly() {
        let mailer = BookingMailer::new(EmailConfig::default());
        let summary = BookingSummary::from_reservations(&[reservation("BK1", 8000.0)]).unwrap();
        assert!(!mailer.is_enabled());
        assert!(mailer.send_booking_confirmation(&summary).await.is_ok());
        assert!(mailer.send_booking_rejection(&summary).await.is_ok());
    }
}
