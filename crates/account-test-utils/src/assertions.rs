//! Custom test assertions for JSON response bodies.

use serde_json::Value;

/// Assertions on the `{"error": {"code", "message"}}` body shape.
///
/// # Example
/// ```rust,ignore
/// body.assert_error_code("NOT_ALLOWED")
///     .assert_message_excludes("accounts.username");
/// ```
pub trait ErrorBodyAssertions {
    /// Assert the body is an error with the given code
    fn assert_error_code(&self, code: &str) -> &Self;

    /// Assert the error message does not contain `fragment`
    fn assert_message_excludes(&self, fragment: &str) -> &Self;

    /// Assert the body does not contain `fragment` anywhere
    fn assert_never_mentions(&self, fragment: &str) -> &Self;
}

impl ErrorBodyAssertions for Value {
    fn assert_error_code(&self, code: &str) -> &Self {
        let actual = self
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(Value::as_str);
        assert_eq!(
            actual,
            Some(code),
            "Expected error code {:?} in body {}",
            code,
            self
        );
        self
    }

    fn assert_message_excludes(&self, fragment: &str) -> &Self {
        let message = self
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or_else(|| panic!("Body has no error message: {}", self));
        assert!(
            !message.contains(fragment),
            "Error message {:?} must not contain {:?}",
            message,
            fragment
        );
        self
    }

    fn assert_never_mentions(&self, fragment: &str) -> &Self {
        assert!(
            !self.to_string().contains(fragment),
            "Body {} must not contain {:?}",
            self,
            fragment
        );
        self
    }
}
