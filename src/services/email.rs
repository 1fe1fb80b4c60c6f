use crate::{
    config::SmtpConfig,
    errors::{AppError, AppResult},
    models::{Employee, Payroll},
    services::notification::Notifier,
};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use rust_decimal::Decimal;
use tracing::{error, info};

/// Sends payslips over SMTP.
#[derive(Clone)]
pub struct EmailNotifier {
    smtp: SmtpConfig,
}

impl EmailNotifier {
    pub fn new(smtp: SmtpConfig) -> Self {
        Self { smtp }
    }

    fn build_transport(&self) -> AppResult<AsyncSmtpTransport<Tokio1Executor>> {
        let creds = Credentials::new(self.smtp.username.clone(), self.smtp.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.smtp.host)
            .map_err(|e| AppError::EmailError(e.to_string()))?
            .credentials(creds)
            .port(self.smtp.port)
            .build();

        Ok(transport)
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn payslip(&self, employee: &Employee, payroll: &Payroll) -> AppResult<()> {
        let period = format!("{}-{:02}", payroll.period_year, payroll.period_month);
        let subject = format!("Your payslip for {}", period);

        let from_mailbox = format!("{} <{}>", self.smtp.from_name, self.smtp.from_address)
            .parse()
            .map_err(|e: lettre::address::AddressError| AppError::EmailError(e.to_string()))?;

        let to_mailbox = format!("{} <{}>", employee.full_name, employee.email)
            .parse()
            .map_err(|e: lettre::address::AddressError| AppError::EmailError(e.to_string()))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(payslip_text(&employee.full_name, &period, payroll)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(payslip_html(&employee.full_name, &period, payroll)),
                    ),
            )
            .map_err(|e| AppError::EmailError(e.to_string()))?;

        let transport = self.build_transport()?;

        match transport.send(email).await {
            Ok(_) => {
                info!("Payslip email sent to {}", employee.email);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send payslip email to {}: {}", employee.email, e);
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

/// (label, amount) rows shared by the text and HTML bodies.
fn payslip_lines(payroll: &Payroll) -> Vec<(&'static str, Decimal)> {
    vec![
        ("Base salary", payroll.base_salary),
        ("Overtime pay", payroll.overtime_pay),
        ("Gross salary", payroll.gross_salary),
        ("Social insurance", payroll.social_insurance),
        ("Unemployment insurance", payroll.unemployment_insurance),
        ("Income tax", payroll.income_tax),
        ("Stamp tax", payroll.stamp_tax),
        ("Advance deduction", payroll.advance_deduction),
        ("Penalty deduction", payroll.penalty_deduction),
        ("Total deductions", payroll.total_deductions),
        ("Net pay", payroll.net_salary),
    ]
}

fn payslip_text(employee_name: &str, period: &str, payroll: &Payroll) -> String {
    let mut body = format!(
        "Dear {employee_name},\n\nYour salary for {period} has been paid.\n\n\
         Worked days: {}  Leave days: {}  Absent days: {}\n\n",
        payroll.work_days, payroll.leave_days, payroll.absent_days
    );
    for (label, amount) in payslip_lines(payroll) {
        body.push_str(&format!("{:<24}{:>14}\n", label, format_amount(amount)));
    }
    if let Some(reference) = &payroll.payment_reference {
        body.push_str(&format!("\nPayment reference: {}\n", reference));
    }
    body
}

fn payslip_html(employee_name: &str, period: &str, payroll: &Payroll) -> String {
    let rows: String = payslip_lines(payroll)
        .into_iter()
        .map(|(label, amount)| {
            format!(
                "<tr><td>{}</td><td style=\"text-align:right\">{}</td></tr>",
                label,
                format_amount(amount)
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<body style="font-family: Arial, sans-serif; color: #333;">
  <h2>Payslip for {period}</h2>
  <p>Dear <strong>{employee_name}</strong>, your salary for {period} has been paid.</p>
  <table style="width: 100%; max-width: 480px; border-collapse: collapse;">{rows}</table>
  <p style="font-size: 12px; color: #6b7280;">Payment reference: {reference}</p>
</body>
</html>"#,
        reference = payroll.payment_reference.as_deref().unwrap_or("N/A"),
    )
}
