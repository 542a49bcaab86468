//! Transactional email over SMTP.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use thiserror::Error;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeEmailHtml<'a> {
    name: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeEmailText<'a> {
    name: &'a str,
}

#[derive(Template)]
#[template(path = "email/payment_receipt.html")]
struct PaymentReceiptEmailHtml<'a> {
    name: &'a str,
    invoice_number: &'a str,
    total_amount: i64,
    lines: &'a [ReceiptLine],
}

#[derive(Template)]
#[template(path = "email/payment_receipt.txt")]
struct PaymentReceiptEmailText<'a> {
    name: &'a str,
    invoice_number: &'a str,
    total_amount: i64,
    lines: &'a [ReceiptLine],
}

/// A rendered email ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// One purchased line as shown in a receipt.
#[derive(Debug, Clone)]
pub struct ReceiptLine {
    pub artwork: String,
    pub quantity: i32,
    pub price: i64,
}

#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl Mailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }

    pub async fn send(&self, to: &str, content: &MailContent) -> Result<(), MailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| MailError::InvalidAddress(to.to_string()))?)
            .subject(content.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(content.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(content.html.clone()),
                    ),
            )?;

        self.transport.send(email).await?;

        tracing::info!(to = %to, subject = %content.subject, "email sent");
        Ok(())
    }

    pub async fn send_welcome(&self, to: &str, full_name: &str) -> Result<(), MailError> {
        self.send(to, &welcome_email(full_name)?).await
    }

    pub async fn send_payment_receipt(
        &self,
        to: &str,
        full_name: &str,
        invoice_number: &str,
        total_amount: i64,
        lines: &[ReceiptLine],
    ) -> Result<(), MailError> {
        let content = payment_receipt_email(full_name, invoice_number, total_amount, lines)?;
        self.send(to, &content).await
    }
}

/// Renders the welcome message sent after registration.
pub fn welcome_email(full_name: &str) -> Result<MailContent, MailError> {
    Ok(MailContent {
        subject: "Welcome to ArtMarket".to_string(),
        text: WelcomeEmailText { name: full_name }.render()?,
        html: WelcomeEmailHtml { name: full_name }.render()?,
    })
}

/// Renders the receipt sent once an order is paid.
pub fn payment_receipt_email(
    full_name: &str,
    invoice_number: &str,
    total_amount: i64,
    lines: &[ReceiptLine],
) -> Result<MailContent, MailError> {
    Ok(MailContent {
        subject: format!("Payment received for {invoice_number}"),
        text: PaymentReceiptEmailText {
            name: full_name,
            invoice_number,
            total_amount,
            lines,
        }
        .render()?,
        html: PaymentReceiptEmailHtml {
            name: full_name,
            invoice_number,
            total_amount,
            lines,
        }
        .render()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_lists_every_line_and_total() {
        let content = payment_receipt_email(
            "Mai",
            "INV-20260101-abcdef12",
            350_000,
            &[
                ReceiptLine {
                    artwork: "Lotus <Study>".into(),
                    quantity: 1,
                    price: 150_000,
                },
                ReceiptLine {
                    artwork: "Harbor".into(),
                    quantity: 2,
                    price: 100_000,
                },
            ],
        )
        .unwrap();

        assert_eq!(content.subject, "Payment received for INV-20260101-abcdef12");
        assert!(content.text.contains("- Lotus <Study> x1 @ 150000"));
        assert!(content.text.contains("Total: 350000"));
        assert!(content.html.contains("Lotus &lt;Study&gt;"));
        assert!(!content.html.contains("<Study>"));
    }

    #[test]
    fn welcome_escapes_name_in_html_only() {
        let content = welcome_email("<b>O'Hara</b>").unwrap();
        assert!(content.text.contains("Hi <b>O'Hara</b>,"));
        assert!(content.html.contains("&lt;b&gt;O"));
        assert!(!content.html.contains("<b>"));
        assert!(!content.html.contains("O'Hara"));
    }
}
