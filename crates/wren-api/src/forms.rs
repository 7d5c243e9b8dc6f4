//! Form validation: each field gets an ordered list of rules, every rule a
//! predicate plus the message reported when it fails. Rules run in order;
//! the first failure per field wins. Fields marked optional skip all
//! remaining rules when submitted empty. Validation is pure over the
//! submitted values and runs before any mutation is attempted.

use std::collections::BTreeMap;

use wren_types::forms::{LoginForm, MessageForm, ProfileForm, SignupForm};

pub const MAX_MESSAGE_LEN: usize = 140;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    by_field: BTreeMap<&'static str, Vec<String>>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.by_field.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.by_field.is_empty()
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.by_field.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

enum Rule {
    Required,
    MinLen(usize),
    MaxLen(usize),
    Email,
    Url,
}

impl Rule {
    fn check(&self, value: &str) -> Option<String> {
        match self {
            Rule::Required => value
                .trim()
                .is_empty()
                .then(|| "This field is required.".to_string()),
            Rule::MinLen(n) => (value.chars().count() < *n)
                .then(|| format!("Must be at least {n} characters long.")),
            Rule::MaxLen(n) => (value.chars().count() > *n)
                .then(|| format!("Cannot be longer than {n} characters.")),
            Rule::Email => (!is_email_shaped(value)).then(|| "Invalid email address.".to_string()),
            Rule::Url => (!is_url_shaped(value)).then(|| "Invalid URL.".to_string()),
        }
    }
}

#[derive(Default)]
pub struct FormValidator {
    errors: ValidationErrors,
}

impl FormValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<'v>(&mut self, name: &'static str, value: &'v str) -> FieldValidator<'_, 'v> {
        FieldValidator {
            name,
            value,
            errors: &mut self.errors,
            skip: false,
            failed: false,
        }
    }

    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

pub struct FieldValidator<'e, 'v> {
    name: &'static str,
    value: &'v str,
    errors: &'e mut ValidationErrors,
    skip: bool,
    failed: bool,
}

impl FieldValidator<'_, '_> {
    /// Optional fields skip every remaining rule when submitted empty.
    pub fn optional(mut self) -> Self {
        if self.value.trim().is_empty() {
            self.skip = true;
        }
        self
    }

    fn rule(mut self, rule: Rule) -> Self {
        if self.skip || self.failed {
            return self;
        }
        if let Some(message) = rule.check(self.value) {
            self.errors.add(self.name, message);
            self.failed = true;
        }
        self
    }

    pub fn required(self) -> Self {
        self.rule(Rule::Required)
    }

    pub fn min_len(self, n: usize) -> Self {
        self.rule(Rule::MinLen(n))
    }

    pub fn max_len(self, n: usize) -> Self {
        self.rule(Rule::MaxLen(n))
    }

    pub fn email(self) -> Self {
        self.rule(Rule::Email)
    }

    pub fn url(self) -> Self {
        self.rule(Rule::Url)
    }
}

pub fn validate_signup(form: &SignupForm) -> Result<(), ValidationErrors> {
    let mut v = FormValidator::new();
    v.field("username", &form.username).required().max_len(30);
    v.field("email", &form.email).required().email().max_len(50);
    v.field("password", &form.password).required().min_len(6).max_len(50);
    v.field("image_url", &form.image_url).optional().url().max_len(255);
    v.finish()
}

pub fn validate_login(form: &LoginForm) -> Result<(), ValidationErrors> {
    let mut v = FormValidator::new();
    v.field("username", &form.username).required().max_len(30);
    v.field("password", &form.password).required().min_len(6).max_len(50);
    v.finish()
}

pub fn validate_profile(form: &ProfileForm) -> Result<(), ValidationErrors> {
    let mut v = FormValidator::new();
    v.field("username", &form.username).required().max_len(30);
    v.field("email", &form.email).required().email().max_len(50);
    v.field("image_url", &form.image_url).optional().url().max_len(255);
    v.field("header_image_url", &form.header_image_url).optional().url().max_len(255);
    v.field("location", &form.location).optional().max_len(30);
    v.field("password", &form.password).required().min_len(6).max_len(50);
    v.finish()
}

pub fn validate_message(form: &MessageForm) -> Result<(), ValidationErrors> {
    let mut v = FormValidator::new();
    v.field("text", &form.text).required().max_len(MAX_MESSAGE_LEN);
    v.finish()
}

fn is_email_shaped(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

fn is_url_shaped(value: &str) -> bool {
    let Some(rest) = value
        .strip_prefix("http://")
        .or_else(|| value.strip_prefix("https://"))
    else {
        return false;
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    !host.is_empty() && !value.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_requires_all_mandatory_fields() {
        let errors = validate_signup(&SignupForm::default()).unwrap_err();
        assert_eq!(errors.field("username"), ["This field is required."]);
        assert_eq!(errors.field("email"), ["This field is required."]);
        assert_eq!(errors.field("password"), ["This field is required."]);
        // image_url is optional and empty, so no error
        assert!(errors.field("image_url").is_empty());
    }

    #[test]
    fn valid_signup_passes() {
        let form = SignupForm {
            username: "wren".into(),
            email: "wren@example.com".into(),
            password: "hunter22".into(),
            image_url: "https://example.com/pic.png".into(),
            csrf_token: String::new(),
        };
        assert!(validate_signup(&form).is_ok());
    }

    #[test]
    fn first_failing_rule_wins_per_field() {
        let form = SignupForm {
            username: "x".repeat(40),
            email: "not-an-email".into(),
            password: "ok-password".into(),
            image_url: String::new(),
            csrf_token: String::new(),
        };
        let errors = validate_signup(&form).unwrap_err();
        assert_eq!(errors.field("username").len(), 1);
        assert_eq!(errors.field("username")[0], "Cannot be longer than 30 characters.");
        assert_eq!(errors.field("email"), ["Invalid email address."]);
    }

    #[test]
    fn email_shapes() {
        assert!(is_email_shaped("a@b.co"));
        assert!(is_email_shaped("first.last@sub.domain.org"));
        assert!(!is_email_shaped("missing-at.example.com"));
        assert!(!is_email_shaped("@no-local.com"));
        assert!(!is_email_shaped("no-domain@"));
        assert!(!is_email_shaped("two@@example.com"));
        assert!(!is_email_shaped("dotless@example"));
        assert!(!is_email_shaped("space in@example.com"));
        assert!(!is_email_shaped("trailing@example.com."));
    }

    #[test]
    fn url_shapes() {
        assert!(is_url_shaped("http://example.com"));
        assert!(is_url_shaped("https://example.com/path?x=1"));
        assert!(!is_url_shaped("ftp://example.com"));
        assert!(!is_url_shaped("example.com"));
        assert!(!is_url_shaped("https://"));
        assert!(!is_url_shaped("https://exa mple.com"));
    }

    #[test]
    fn optional_url_skipped_when_empty_but_checked_when_present() {
        let mut form = SignupForm {
            username: "wren".into(),
            email: "wren@example.com".into(),
            password: "hunter22".into(),
            image_url: String::new(),
            csrf_token: String::new(),
        };
        assert!(validate_signup(&form).is_ok());

        form.image_url = "not a url".into();
        let errors = validate_signup(&form).unwrap_err();
        assert_eq!(errors.field("image_url"), ["Invalid URL."]);
    }

    #[test]
    fn message_text_bounds() {
        let empty = MessageForm::default();
        let errors = validate_message(&empty).unwrap_err();
        assert_eq!(errors.field("text"), ["This field is required."]);

        let long = MessageForm {
            text: "x".repeat(MAX_MESSAGE_LEN + 1),
            csrf_token: String::new(),
        };
        let errors = validate_message(&long).unwrap_err();
        assert_eq!(errors.field("text"), ["Cannot be longer than 140 characters."]);

        let exact = MessageForm {
            text: "x".repeat(MAX_MESSAGE_LEN),
            csrf_token: String::new(),
        };
        assert!(validate_message(&exact).is_ok());
    }

    #[test]
    fn password_length_bounds() {
        let form = LoginForm {
            username: "wren".into(),
            password: "short".into(),
            csrf_token: String::new(),
        };
        let errors = validate_login(&form).unwrap_err();
        assert_eq!(errors.field("password"), ["Must be at least 6 characters long."]);
    }
}
