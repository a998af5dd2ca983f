//! Scripted in-process bookshelf service for pipeline tests

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use session_auth::{LOGIN_PATH, REFRESH_PATH, REGISTER_PATH, bearer_token};
use tokio::sync::Semaphore;
use transport::{Body, Request, Response, StatusCode, Transport};

/// How the fake answers `/auth/refresh`.
#[derive(Debug, Clone)]
pub(crate) enum RefreshReply {
    /// 200 with this access token, which resources accept from then on
    Issue(&'static str),
    /// Bare status with no token
    Status(StatusCode),
    /// 200 with a body that is not a token response
    Garbage,
    /// Never answers
    Hang,
}

pub(crate) const LOGIN_PASSWORD: &str = "secret";

/// Email the register endpoint treats as already taken.
pub(crate) const TAKEN_EMAIL: &str = "taken@example.com";

/// Resources answer 200 only for the currently accepted access token and 401
/// otherwise. `reject_everything()` also makes register answer 401. `/broken` answers 500 and `/offline` fails at the transport.
pub(crate) struct FakeService {
    accepted: Mutex<Option<String>>,
    refresh_reply: Mutex<RefreshReply>,
    reject_everything: AtomicBool,
    refresh_gate: Option<Semaphore>,
    refresh_calls: AtomicUsize,
    sent: Mutex<Vec<Request>>,
}

impl FakeService {
    pub(crate) fn new(reply: RefreshReply) -> Self {
        Self {
            accepted: Mutex::new(None),
            refresh_reply: Mutex::new(reply),
            reject_everything: AtomicBool::new(false),
            refresh_gate: None,
            refresh_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Hold every refresh response until `open_gate()`.
    pub(crate) fn gated(mut self) -> Self {
        self.refresh_gate = Some(Semaphore::new(0));
        self
    }

    pub(crate) fn open_gate(&self) {
        if let Some(gate) = &self.refresh_gate {
            gate.add_permits(1024);
        }
    }

    pub(crate) fn set_refresh_reply(&self, reply: RefreshReply) {
        *self.refresh_reply.lock().unwrap() = reply;
    }

    /// Server-side expiry of the current access token.
    pub(crate) fn expire_access(&self) {
        *self.accepted.lock().unwrap() = None;
    }

    pub(crate) fn reject_everything(&self) {
        self.reject_everything.store(true, Ordering::SeqCst);
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sent_to(&self, path: &str) -> Vec<Request> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    fn accept(&self, token: &str) {
        *self.accepted.lock().unwrap() = Some(token.to_string());
    }

    fn login(&self, request: &Request) -> Response {
        let password = match &request.body {
            Body::Form(fields) => fields
                .iter()
                .find(|(name, _)| name == "password")
                .map(|(_, value)| value.as_str()),
            _ => None,
        };
        if password != Some(LOGIN_PASSWORD) {
            return Response::new(StatusCode::UNAUTHORIZED, "Incorrect email or password");
        }
        self.accept("at_login");
        Response::with_json(
            StatusCode::OK,
            &serde_json::json!({
                "access_token": "at_login",
                "refresh_token": "rt_login",
                "token_type": "bearer"
            }),
        )
    }

    fn register(&self, request: &Request) -> Response {
        if self.reject_everything.load(Ordering::SeqCst) {
            return Response::new(StatusCode::UNAUTHORIZED, "Not authenticated");
        }
        let Body::Json(body) = &request.body else {
            return Response::new(StatusCode::UNPROCESSABLE_ENTITY, "expected JSON");
        };
        if body["email"] == TAKEN_EMAIL {
            return Response::with_json(
                StatusCode::BAD_REQUEST,
                &serde_json::json!({"detail": "Email already registered"}),
            );
        }
        let mut user = body.clone();
        if let Some(fields) = user.as_object_mut() {
            fields.remove("password");
        }
        Response::with_json(StatusCode::OK, &user)
    }

    async fn refresh(&self) -> Response {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.refresh_gate {
            let _permit = gate.acquire().await.unwrap();
        }
        let reply = self.refresh_reply.lock().unwrap().clone();
        match reply {
            RefreshReply::Issue(token) => {
                self.accept(token);
                Response::with_json(
                    StatusCode::OK,
                    &serde_json::json!({"access_token": token, "token_type": "bearer"}),
                )
            }
            RefreshReply::Status(status) => Response::new(status, "Could not validate credentials"),
            RefreshReply::Garbage => Response::new(StatusCode::OK, "<html>maintenance</html>"),
            RefreshReply::Hang => std::future::pending().await,
        }
    }

    fn resource(&self, request: &Request) -> Response {
        let accepted = self.accepted.lock().unwrap().clone();
        let authorized = !self.reject_everything.load(Ordering::SeqCst)
            && accepted.is_some()
            && bearer_token(request) == accepted.as_deref();
        if authorized {
            Response::with_json(StatusCode::OK, &serde_json::json!({"path": request.path}))
        } else {
            Response::new(StatusCode::UNAUTHORIZED, "Could not validate credentials")
        }
    }
}

impl Transport for FakeService {
    fn send<'a>(
        &'a self,
        request: &'a Request,
    ) -> Pin<Box<dyn Future<Output = transport::Result<Response>> + Send + 'a>> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(request.clone());
            match request.path.as_str() {
                REGISTER_PATH => Ok(self.register(request)),
                LOGIN_PATH => Ok(self.login(request)),
                REFRESH_PATH => Ok(self.refresh().await),
                "/offline" => Err(transport::Error::Http("/offline: connection refused".into())),
                "/broken" => Ok(Response::new(StatusCode::INTERNAL_SERVER_ERROR, "boom")),
                _ => Ok(self.resource(request)),
            }
        })
    }
}
