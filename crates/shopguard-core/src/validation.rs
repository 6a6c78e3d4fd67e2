use crate::error::AccountError;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Trimmed, lower-cased identity used as the account key.
pub fn normalize_identity(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn require(field: &str, value: &str) -> Result<(), AccountError> {
    if value.trim().is_empty() {
        return Err(AccountError::validation(
            field,
            format!("The {} field is required.", display_name(field)),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AccountError> {
    require("email", email)?;
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(AccountError::validation(
            "email",
            "The Email field is not a valid e-mail address.",
        ));
    }
    Ok(())
}

/// Password rules checked at registration.
///
/// Requirements:
/// - At least 6 characters long
/// - Contains a lowercase letter, an uppercase letter and a digit
/// - Contains a non-alphanumeric character
pub fn validate_password_strength(password: &str) -> Vec<&'static str> {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push("Passwords must be at least 6 characters.");
    }

    if !password.chars().any(|c| !c.is_alphanumeric()) {
        errors.push("Passwords must have at least one non alphanumeric character.");
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Passwords must have at least one digit ('0'-'9').");
    }

    if !password.chars().any(|c| c.is_lowercase()) {
        errors.push("Passwords must have at least one lowercase ('a'-'z').");
    }

    if !password.chars().any(|c| c.is_uppercase()) {
        errors.push("Passwords must have at least one uppercase ('A'-'Z').");
    }

    errors
}

pub fn validate_new_password(password: &str, confirm_password: &str) -> Result<(), AccountError> {
    require("password", password)?;
    let problems = validate_password_strength(password);
    if !problems.is_empty() {
        return Err(AccountError::validation("password", problems.join(" ")));
    }
    if password != confirm_password {
        return Err(AccountError::validation(
            "confirm_password",
            "The password and confirmation password do not match.",
        ));
    }
    Ok(())
}

fn display_name(field: &str) -> &str {
    match field {
        "email" => "Email",
        "password" => "Password",
        "first_name" => "First name",
        "last_name" => "Last name",
        "device_fingerprinting" => "Device fingerprinting session",
        other => other,
    }
}
