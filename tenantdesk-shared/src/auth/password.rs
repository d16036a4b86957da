/// Password strength scoring
///
/// The auth provider stores and verifies passwords; the console only scores
/// candidate passwords before sign-up or reset so the operator gets feedback
/// without a round trip.
///
/// # Scoring
///
/// One point each for:
/// - at least 8 characters
/// - an uppercase letter
/// - a lowercase letter
/// - a digit
/// - a special character from `!@#$%^&*(),.?":{}|<>`
///
/// A password is acceptable with a score of 4 or more.
///
/// # Example
///
/// ```
/// use tenantdesk_shared::auth::password::validate_password_strength;
///
/// let strength = validate_password_strength("Tr0ub4dor&3");
/// assert!(strength.is_valid);
/// assert_eq!(strength.score, 5);
/// ```

use serde::{Deserialize, Serialize};

/// Minimum score for an acceptable password
pub const MIN_ACCEPTABLE_SCORE: u8 = 4;

/// Minimum password length that earns the length point
pub const MIN_LENGTH: usize = 8;

const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Result of scoring a password
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordStrength {
    /// Whether the password is acceptable
    pub is_valid: bool,

    /// Score from 0 to 5
    pub score: u8,

    /// One hint per missed criterion
    pub feedback: Vec<String>,
}

/// Scores a password
pub fn validate_password_strength(password: &str) -> PasswordStrength {
    let checks: [(bool, &str); 5] = [
        (
            password.chars().count() >= MIN_LENGTH,
            "Password must be at least 8 characters long",
        ),
        (
            password.chars().any(|c| c.is_ascii_uppercase()),
            "Include at least one uppercase letter",
        ),
        (
            password.chars().any(|c| c.is_ascii_lowercase()),
            "Include at least one lowercase letter",
        ),
        (
            password.chars().any(|c| c.is_ascii_digit()),
            "Include at least one number",
        ),
        (
            password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)),
            "Include at least one special character",
        ),
    ];

    let mut score = 0u8;
    let mut feedback = Vec::new();
    for (passed, hint) in checks {
        if passed {
            score += 1;
        } else {
            feedback.push(hint.to_string());
        }
    }

    PasswordStrength {
        is_valid: score >= MIN_ACCEPTABLE_SCORE,
        score,
        feedback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_password() {
        let strength = validate_password_strength("C0rrect-Horse!");
        assert_eq!(strength.score, 5);
        assert!(strength.is_valid);
        assert!(strength.feedback.is_empty());
    }

    #[test]
    fn test_four_of_five_is_valid() {
        // No special character
        let strength = validate_password_strength("Password123");
        assert_eq!(strength.score, 4);
        assert!(strength.is_valid);
        assert_eq!(strength.feedback, vec!["Include at least one special character"]);
    }

    #[test]
    fn test_weak_password() {
        let strength = validate_password_strength("abc");
        assert_eq!(strength.score, 1);
        assert!(!strength.is_valid);
        assert_eq!(strength.feedback.len(), 4);
        assert_eq!(strength.feedback[0], "Password must be at least 8 characters long");
    }

    #[test]
    fn test_empty_password() {
        let strength = validate_password_strength("");
        assert_eq!(strength.score, 0);
        assert_eq!(strength.feedback.len(), 5);
    }

    #[test]
    fn test_dash_is_not_special() {
        let strength = validate_password_strength("abcdefgh-");
        assert_eq!(strength.score, 2);
    }
}
