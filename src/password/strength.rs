//! Password strength evaluation.
//!
//! Scoring is a deterministic weighted sum, free of I/O and randomness:
//! length tiers, character classes, a bonus for long run-free passwords, and
//! penalties for common or personal-information passwords. The weights are
//! tuned so that a password with no feedback items always scores at least
//! the validity threshold; `is_valid` therefore never contradicts the
//! feedback list.

/// Passwords that show up at the top of every breach corpus. Matched after
/// lowercasing. A real deployment extends this list from a dictionary file.
const COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "123456",
    "12345678",
    "123456789",
    "qwerty",
    "qwerty123",
    "abc123",
    "letmein",
    "welcome",
    "welcome1",
    "admin",
    "iloveyou",
    "monkey",
    "dragon",
    "sunshine",
    "princess",
    "football",
    "baseball",
    "trustno1",
    "superman",
    "passw0rd",
    "p@ssw0rd",
];

const VALID_SCORE_THRESHOLD: u8 = 60;

/// Strength policy parameters. All checks are explicit and overridable.
#[derive(Clone, Copy, Debug)]
pub struct StrengthPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
    pub reject_common: bool,
    pub reject_personal_info: bool,
}

impl Default for StrengthPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
            reject_common: true,
            reject_personal_info: true,
        }
    }
}

/// User attributes a password must not contain.
#[derive(Clone, Debug, Default)]
pub struct PersonalInfo {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl PersonalInfo {
    /// Lowercased fragments to test for containment. Fragments shorter than
    /// three characters are skipped to avoid false positives on initials.
    fn fragments(&self) -> Vec<String> {
        let mut fragments = Vec::new();
        if let Some(email) = &self.email {
            if let Some(local) = email.split('@').next() {
                fragments.push(local.to_lowercase());
            }
        }
        if let Some(first) = &self.first_name {
            fragments.push(first.to_lowercase());
        }
        if let Some(last) = &self.last_name {
            fragments.push(last.to_lowercase());
        }
        fragments.retain(|fragment| fragment.len() >= 3);
        fragments
    }
}

/// Result of a strength evaluation.
#[derive(Clone, Debug)]
pub struct StrengthReport {
    pub is_valid: bool,
    pub score: u8,
    pub feedback: Vec<String>,
}

impl StrengthPolicy {
    /// Evaluate a password against this policy.
    #[must_use]
    pub fn evaluate(&self, password: &str, user: Option<&PersonalInfo>) -> StrengthReport {
        let mut feedback = Vec::new();
        let mut score: i32 = 0;

        let length = password.chars().count();
        if length >= self.min_length {
            score += 20;
        } else {
            feedback.push(format!(
                "Password must be at least {} characters long",
                self.min_length
            ));
        }
        if length >= 12 {
            score += 10;
        }
        if length >= 16 {
            score += 10;
        }

        let has_upper = password.chars().any(char::is_uppercase);
        let has_lower = password.chars().any(char::is_lowercase);
        let has_digit = password.chars().any(|ch| ch.is_ascii_digit());
        let has_special = password.chars().any(|ch| !ch.is_alphanumeric());

        if has_upper {
            score += 10;
        } else if self.require_uppercase {
            feedback.push("Add an uppercase letter".to_string());
        }
        if has_lower {
            score += 10;
        } else if self.require_lowercase {
            feedback.push("Add a lowercase letter".to_string());
        }
        if has_digit {
            score += 10;
        } else if self.require_digit {
            feedback.push("Add a digit".to_string());
        }
        if has_special {
            score += 10;
        } else if self.require_special {
            feedback.push("Add a special character".to_string());
        }

        if !has_repeated_run(password, 3) {
            score += 10;
        }

        let lowered = password.to_lowercase();
        if self.reject_common && COMMON_PASSWORDS.contains(&lowered.as_str()) {
            score -= 40;
            feedback.push("This password is too common".to_string());
        }

        if self.reject_personal_info {
            if let Some(user) = user {
                if user
                    .fragments()
                    .iter()
                    .any(|fragment| lowered.contains(fragment))
                {
                    score -= 30;
                    feedback.push("Password must not contain your name or email".to_string());
                }
            }
        }

        let score = u8::try_from(score.clamp(0, 100)).unwrap_or(0);
        StrengthReport {
            is_valid: feedback.is_empty() && score >= VALID_SCORE_THRESHOLD,
            score,
            feedback,
        }
    }
}

/// True when the password contains `run_len` or more identical characters in
/// a row.
fn has_repeated_run(password: &str, run_len: usize) -> bool {
    let mut previous = None;
    let mut run = 0usize;
    for ch in password.chars() {
        if Some(ch) == previous {
            run += 1;
            if run >= run_len {
                return true;
            }
        } else {
            previous = Some(ch);
            run = 1;
        }
    }
    false
}
