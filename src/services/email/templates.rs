use chrono::{Datelike, Duration, Utc};

/// Why a code is being mailed. Picks the subject line and the wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailPurpose {
    VerifyEmail,
    Login,
    Resend,
    PasswordReset,
}

impl MailPurpose {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::VerifyEmail => "Verify Your Email",
            Self::Login => "Your Login OTP",
            Self::Resend => "Your OTP Code",
            Self::PasswordReset => "Password Reset Code",
        }
    }

    fn headline(&self) -> &'static str {
        match self {
            Self::VerifyEmail => "Confirm your email address",
            Self::Login | Self::Resend => "Your sign-in code",
            Self::PasswordReset => "Password Reset Request",
        }
    }

    fn intro(&self) -> &'static str {
        match self {
            Self::VerifyEmail => "Thanks for signing up. Use the one-time code below to verify your email:",
            Self::Login | Self::Resend => "Use the one-time code below to finish signing in:",
            Self::PasswordReset => "We received a request to reset your password. Use the code below to reset it:",
        }
    }
}

/// HTML body carrying a one-time code.
pub fn otp_email(purpose: MailPurpose, name: &str, code: &str, valid_for: Duration) -> String {
    let minutes = valid_for.num_minutes().max(1);
    let year = Utc::now().year();

    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; border: 2px solid #f0f0f0; border-radius: 30px; overflow: hidden;">
  <div style="background-color: #2E5BFF; padding: 24px; text-align: center;">
    <h2 style="color: white; margin: 0; font-size: 20px;">{headline}</h2>
  </div>
  <div style="padding: 20px; background-color: #ffffff;">
    <p style="font-size: 14px; color: #333;">Hello <strong>{name}</strong>,</p>
    <p style="font-size: 14px; color: #333;">{intro}</p>
    <div style="text-align: center; margin: 20px 0;">
      <h2 style="border: 2px dashed #2E5BFF; padding: 10px 20px; color: #2E5BFF; display: inline-block; font-family: monospace;">{code}</h2>
    </div>
    <p style="font-size: 14px; color: #333;">This code is valid for the next <strong>{minutes} minutes</strong>. If you did not request it, you can ignore this email.</p>
    <p style="font-size: 14px; color: #333;">Do not share this code with anyone.</p>
  </div>
  <div style="background-color: #f9f9f9; padding: 15px; text-align: center; border-top: 1px solid #ddd;">
    <p style="font-size: 12px; color: #777; margin: 0;">Please do not reply to this email. &copy; {year}</p>
  </div>
</div>"#,
        headline = purpose.headline(),
        intro = purpose.intro(),
        name = escape_html(name),
        code = escape_html(code),
        minutes = minutes,
        year = year,
    )
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
