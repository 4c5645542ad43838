//! User-facing failure text.

pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";
pub const INSIGHTS_UNAVAILABLE: &str = "AI is temporarily unavailable";

/// Translate an auth provider error code into text fit for a login form.
pub fn friendly_auth_message(code: &str) -> &'static str {
    match code {
        "auth/invalid-email" => "Please enter a valid email address.",
        "auth/user-not-found" => "No account found with this email.",
        "auth/wrong-password" => "Incorrect password. Please try again.",
        "auth/invalid-credential" => "Invalid email or password.",
        "auth/email-already-in-use" => "An account with this email already exists.",
        "auth/weak-password" => "Password should be at least 6 characters.",
        "auth/too-many-requests" => "Too many attempts. Please try again later.",
        "auth/network-request-failed" => "Network error. Check your connection and try again.",
        _ => GENERIC_FAILURE,
    }
}

pub fn load_failure(collection: &str) -> String {
    format!("Failed to load {collection}")
}
