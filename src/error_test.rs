use super::*;

#[test]
fn network_error_asks_to_try_again() {
    let err = AuthError::Network("connection refused".to_owned());
    assert!(err.user_message().contains("try again"));
}

#[test]
fn invalid_credentials_hides_server_detail() {
    let err = AuthError::InvalidCredentials("user not found".to_owned());
    assert_eq!(err.user_message(), INVALID_CREDENTIALS_MESSAGE);
}

#[test]
fn validation_prefers_top_level_message() {
    let err = AuthError::Validation {
        message: "Email already registered".to_owned(),
        fields: FieldErrors::new(),
    };
    assert_eq!(err.user_message(), "Email already registered");
}

#[test]
fn validation_falls_back_to_first_field_message() {
    let mut fields = FieldErrors::new();
    fields.insert("password".to_owned(), "Password must be at least 6 characters".to_owned());
    let err = AuthError::Validation { message: String::new(), fields };
    assert_eq!(err.user_message(), "Password must be at least 6 characters");
}

#[test]
fn field_helper_populates_both_message_and_map() {
    let err = AuthError::field("email", "Enter a valid email address");
    assert_eq!(err.user_message(), "Enter a valid email address");
    assert_eq!(
        err.fields().and_then(|f| f.get("email")).map(String::as_str),
        Some("Enter a valid email address")
    );
}

#[test]
fn server_error_is_generic() {
    let err = AuthError::Server { status: Some(503), message: "upstream down".to_owned() };
    assert_eq!(err.user_message(), SERVER_MESSAGE);
    assert!(err.fields().is_none());
}

#[test]
fn concurrent_request_message() {
    assert_eq!(AuthError::ConcurrentRequest.user_message(), CONCURRENT_MESSAGE);
}

#[test]
fn call_rejections_are_not_recorded() {
    assert!(!AuthError::ConcurrentRequest.is_recorded());
    assert!(!AuthError::Superseded.is_recorded());
    assert!(!AuthError::InvalidTransition(SessionStatus::Authenticated).is_recorded());
    assert!(AuthError::Network(String::new()).is_recorded());
}
