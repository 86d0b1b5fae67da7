pub fn render_password_reset(deep_link: &str, expires_in_minutes: u64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <div style="background: #667eea; color: white; padding: 30px; text-align: center; border-radius: 10px 10px 0 0;">
      <h1>Password Reset Request</h1>
    </div>
    <div style="background: #f9f9f9; padding: 30px; border-radius: 0 0 10px 10px;">
      <h2>Reset Your Password</h2>
      <p>We received a request to reset your password. Click the button below to set a new password:</p>
      <p><a href="{deep_link}" style="display: inline-block; background: #667eea; color: white; padding: 12px 30px; text-decoration: none; border-radius: 5px;">Reset Password</a></p>
      <p><strong>This link will expire in {expires_in_minutes} minutes.</strong></p>
      <p>If the button doesn't work, copy and paste this link into your browser:</p>
      <p style="word-break: break-all; color: #667eea;">{deep_link}</p>
      <p>If you didn't request this password reset, please ignore this email. Your account remains secure.</p>
    </div>
    <p style="text-align: center; margin-top: 20px; font-size: 12px; color: #666;">This email was sent from an automated system. Please do not reply.</p>
  </div>
</body>
</html>"#
    )
}
