use pickboard_shared::{Activity, Credentials, ProfileUpdate, Signup, User, UserStats};

use crate::api::ApiRequest;
use crate::client::Client;
use crate::error::ApiError;
use crate::notice::Notice;

/// Signup form as typed by the user, before it is sent anywhere.
#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub email: String,
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    /// Checks the form locally and returns the body the server expects.
    pub fn validate(&self) -> Result<Signup, ApiError> {
        let email = self.email.trim();
        let username = self.username.trim();
        if !email.contains('@') {
            return Err(ApiError::Invalid("Enter a valid email address.".into()));
        }
        if username.chars().count() < 2 {
            return Err(ApiError::Invalid(
                "Username must be at least 2 characters.".into(),
            ));
        }
        if self.password.chars().count() < 6 {
            return Err(ApiError::Invalid(
                "Password must be at least 6 characters.".into(),
            ));
        }
        if self.password != self.confirm_password {
            return Err(ApiError::Invalid("Passwords do not match.".into()));
        }
        Ok(Signup {
            email: email.to_string(),
            username: username.to_string(),
            password: self.password.clone(),
        })
    }
}

/// Login, logout and identity checks. Every action updates the shared
/// session; failures are also turned into notices.
#[derive(Clone)]
pub struct Auth {
    client: Client,
}

impl Auth {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Identity check run once at startup. Leaves the session settled either way.
    pub async fn start(&self) -> bool {
        self.verify().await
    }

    /// Asks the server who we are. Any failure signs the session out.
    pub async fn verify(&self) -> bool {
        let session = self.client.session();
        session.set_loading(true);
        match self.client.get::<User>("/users/me", vec![]).await {
            Ok(user) => {
                tracing::info!(user = %user.username, "session verified");
                session.sign_in(user);
                true
            }
            Err(err) => {
                tracing::debug!(error = %err, "no usable session");
                if matches!(&err, ApiError::Unauthenticated(detail) if detail == "token_expired") {
                    self.client.notify(Notice::session_expired());
                }
                session.sign_out();
                false
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let credentials = Credentials {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let request = ApiRequest::post("/users/login")
            .json(&credentials)?
            .without_recovery();

        match self.client.request::<User>(request).await {
            Ok(user) => {
                self.client.session().sign_in(user.clone());
                // The login body is thin; /users/me has the full profile.
                self.verify().await;
                self.client
                    .notify(Notice::success(format!("Welcome back, {}.", user.username)));
                Ok(self.client.session().snapshot().user.unwrap_or(user))
            }
            Err(err) => {
                self.client.session().sign_out();
                self.client.notify(Notice::error(failure_message(&err, "Login failed")));
                Err(err)
            }
        }
    }

    /// Validates locally first; nothing is sent for an invalid form.
    pub async fn signup(&self, form: &SignupForm) -> Result<User, ApiError> {
        let body = match form.validate() {
            Ok(body) => body,
            Err(err) => {
                self.client.report(&err, "Signup failed");
                return Err(err);
            }
        };
        let request = ApiRequest::post("/users/signup")
            .json(&body)?
            .without_recovery();

        match self.client.request::<User>(request).await {
            Ok(user) => {
                self.client
                    .notify(Notice::success("Account created. You can log in now."));
                Ok(user)
            }
            Err(err) => {
                self.client.notify(Notice::error(failure_message(&err, "Signup failed")));
                Err(err)
            }
        }
    }

    /// Signs out locally whatever the server says.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self
            .client
            .request::<serde_json::Value>(ApiRequest::post("/users/logout").without_recovery())
            .await;
        self.client.session().sign_out();
        match result {
            Ok(_) => {
                self.client.notify(Notice::success("Logged out."));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "logout call failed");
                Err(err)
            }
        }
    }

    pub async fn profile(&self) -> Result<User, ApiError> {
        let result = self.client.get("/users/me", vec![]).await;
        self.client.reported(result, "Could not load your profile")
    }

    pub async fn update_username(&self, username: &str) -> Result<User, ApiError> {
        let username = username.trim();
        let result = match self.client.session().snapshot().user {
            _ if username.chars().count() < 2 => Err(ApiError::Invalid(
                "Username must be at least 2 characters.".into(),
            )),
            None => Err(ApiError::LoginRequired),
            Some(current) => {
                let body = ProfileUpdate {
                    username: username.to_string(),
                    email: current.email,
                };
                self.client.put::<User, _>("/users/me", &body).await
            }
        };
        let user = self.client.reported(result, "Could not update your profile")?;
        self.client.session().sign_in(user.clone());
        self.client.notify(Notice::success("Profile updated."));
        Ok(user)
    }

    pub async fn stats(&self) -> Result<UserStats, ApiError> {
        let result = self.client.get("/users/stats", vec![]).await;
        self.client.reported(result, "Could not load your stats")
    }

    pub async fn activity(&self) -> Result<Vec<Activity>, ApiError> {
        let result = self.client.get("/users/activity", vec![]).await;
        self.client.reported(result, "Could not load your activity")
    }
}

/// Server detail when there is one, otherwise `fallback`.
fn failure_message(err: &ApiError, fallback: &str) -> String {
    match err {
        ApiError::Unauthenticated(detail)
        | ApiError::Forbidden(detail)
        | ApiError::NotFound(detail)
        | ApiError::Status { detail, .. }
            if !detail.is_empty() =>
        {
            format!("{fallback}: {detail}")
        }
        ApiError::Invalid(reason) => reason.clone(),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::fake::{json_response, FakeTransport};
    use crate::guard::REFRESH_PATH;
    use crate::notice::NoticeKind;

    fn form() -> SignupForm {
        SignupForm {
            email: "mina@example.com".into(),
            username: "mina".into(),
            password: "hunter22".into(),
            confirm_password: "hunter22".into(),
        }
    }

    fn setup(
        transport: FakeTransport,
    ) -> (Auth, Arc<FakeTransport>, mpsc::UnboundedReceiver<Notice>) {
        let transport = Arc::new(transport);
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Client::with_transport(transport.clone(), Arc::new(tx));
        (Auth::new(client), transport, rx)
    }

    fn mina() -> serde_json::Value {
        json!({"user_id": 5, "username": "mina", "email": "mina@example.com"})
    }

    #[test]
    fn signup_form_rules() {
        assert!(form().validate().is_ok());

        let mut bad = form();
        bad.email = "mina.example.com".into();
        assert_eq!(
            bad.validate().unwrap_err(),
            ApiError::Invalid("Enter a valid email address.".into())
        );

        let mut bad = form();
        bad.username = " m ".into();
        assert!(bad.validate().is_err());

        let mut bad = form();
        bad.password = "12345".into();
        bad.confirm_password = "12345".into();
        assert!(bad.validate().is_err());

        let mut bad = form();
        bad.confirm_password = "hunter23".into();
        assert_eq!(
            bad.validate().unwrap_err(),
            ApiError::Invalid("Passwords do not match.".into())
        );
    }

    #[tokio::test]
    async fn invalid_signup_sends_nothing() {
        let (auth, transport, mut rx) =
            setup(FakeTransport::new(|_| json_response(StatusCode::OK, mina())));
        let mut bad = form();
        bad.confirm_password = "nope".into();

        assert!(auth.signup(&bad).await.is_err());
        assert!(transport.requests().is_empty());
        assert_eq!(rx.try_recv().unwrap().message, "Passwords do not match.");
    }

    #[tokio::test]
    async fn login_signs_in_and_verifies() {
        let (auth, transport, mut rx) =
            setup(FakeTransport::new(|_| json_response(StatusCode::OK, mina())));

        let user = auth.login("mina@example.com", "hunter22").await.unwrap();
        assert_eq!(user.username, "mina");
        assert!(auth.client.session().is_authenticated());
        assert_eq!(transport.calls("/users/login"), 1);
        assert_eq!(transport.calls("/users/me"), 1);
        assert_eq!(rx.try_recv().unwrap().kind, NoticeKind::Success);
    }

    #[tokio::test]
    async fn bad_password_does_not_refresh() {
        let (auth, transport, mut rx) = setup(FakeTransport::new(|_| {
            json_response(
                StatusCode::UNAUTHORIZED,
                json!({"detail": "Invalid email or password"}),
            )
        }));

        let err = auth.login("mina@example.com", "wrong").await.unwrap_err();
        assert_eq!(err, ApiError::Unauthenticated("Invalid email or password".into()));
        assert_eq!(transport.calls(REFRESH_PATH), 0);
        assert!(!auth.client.session().is_authenticated());
        assert_eq!(
            rx.try_recv().unwrap().message,
            "Login failed: Invalid email or password"
        );
    }

    #[tokio::test]
    async fn failed_verify_settles_signed_out() {
        let (auth, _transport, mut rx) = setup(FakeTransport::new(|_| {
            json_response(StatusCode::UNAUTHORIZED, json!({"detail": "token_missing"}))
        }));

        assert!(!auth.start().await);
        let session = auth.client.session().snapshot();
        assert!(!session.is_authenticated);
        assert!(!session.is_loading);
        // Never signed in, so nothing to tell the user.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn logout_signs_out_even_when_the_call_fails() {
        let (auth, _transport, _rx) = setup(FakeTransport::new(|req| match req.path.as_str() {
            "/users/logout" => json_response(StatusCode::INTERNAL_SERVER_ERROR, json!({})),
            _ => json_response(StatusCode::OK, mina()),
        }));
        auth.login("mina@example.com", "hunter22").await.unwrap();

        assert!(auth.logout().await.is_err());
        assert!(!auth.client.session().is_authenticated());
    }

    #[tokio::test]
    async fn username_update_keeps_email() {
        let (auth, transport, _rx) = setup(FakeTransport::new(|req| {
            let mut body = mina();
            if let Some(name) = req.body.as_ref().and_then(|b| b.get("username")) {
                body["username"] = name.clone();
            }
            json_response(StatusCode::OK, body)
        }));
        auth.login("mina@example.com", "hunter22").await.unwrap();

        let user = auth.update_username("  mina2 ").await.unwrap();
        assert_eq!(user.username, "mina2");

        let put = transport
            .requests()
            .into_iter()
            .find(|r| r.method == reqwest::Method::PUT)
            .unwrap();
        assert_eq!(
            put.body,
            Some(json!({"username": "mina2", "email": "mina@example.com"}))
        );
        assert_eq!(auth.client.session().snapshot().user.unwrap().username, "mina2");
    }
}
