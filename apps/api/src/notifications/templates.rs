// Result email templates.

pub const ORGANISATION: &str = "Acme Corp";
const SENDER_NAME: &str = "Jane Doe";
const SENDER_TITLE: &str = "HR Manager";

#[derive(Debug, Clone, PartialEq)]
pub struct ResultMail {
    pub subject: String,
    pub html: String,
}

pub struct MailContext<'a> {
    pub candidate_name: &'a str,
    pub position: &'a str,
    pub is_eligible: bool,
    pub interview_link: &'a str,
    pub password: &'a str,
}

/// `{base}/?id={interview_id}`
pub fn interview_link(base_url: &str, interview_id: &str) -> String {
    format!("{}/?id={}", base_url.trim_end_matches('/'), interview_id)
}

pub fn render_result_mail(ctx: &MailContext<'_>) -> ResultMail {
    let name = escape_html(ctx.candidate_name);
    let position = escape_html(ctx.position);
    let link = escape_html(ctx.interview_link);
    let password = escape_html(ctx.password);

    if ctx.is_eligible {
        let subject = format!("Interview Shortlist — {} at {ORGANISATION}", ctx.position);
        let body = format!(
            r#"<p>Dear <strong>{name}</strong>,</p>
<p>Congratulations! Your application has been <strong>shortlisted</strong> for the position of <strong>{position}</strong> at <strong>{ORGANISATION}</strong>.</p>
<p>The next step is an AI-assisted interview. Use the link below to join at a time that suits you.</p>
<p><a href="{link}" style="display:inline-block;background-color:#2563eb;color:#ffffff;padding:10px 16px;border-radius:6px;text-decoration:none;font-weight:600;">View interview details &amp; schedule</a></p>
<p style="font-size:13px;color:#6b7280;">If the button doesn't work, copy and paste this link into your browser:<br/><a href="{link}">{link}</a></p>
<p>Password: <strong>{password}</strong></p>"#
        );
        ResultMail {
            html: wrap(&subject, &body),
            subject,
        }
    } else {
        let subject = format!("Application Update — {} at {ORGANISATION}", ctx.position);
        let body = format!(
            r#"<p>Dear <strong>{name}</strong>,</p>
<p>Thank you for your interest in the position of <strong>{position}</strong> at <strong>{ORGANISATION}</strong>.</p>
<p>After careful review we have decided not to move forward with your application at this time. We will keep your profile on file for future openings that match your experience.</p>"#
        );
        ResultMail {
            html: wrap(&subject, &body),
            subject,
        }
    }
}

fn wrap(subject: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8" /><title>{title}</title></head>
<body style="margin:0;padding:24px;background-color:#f4f6f8;font-family:Arial, Helvetica, sans-serif;color:#1f2937;">
<h2 style="margin:0 0 18px 0;font-size:20px;color:#0b1220;">Application Update</h2>
{body}
<p>Best regards,<br/>{SENDER_NAME}<br/>{SENDER_TITLE}, {ORGANISATION}</p>
</body>
</html>"#,
        title = escape_html(subject),
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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
