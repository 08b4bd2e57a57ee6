//! CAS REST ticket exchange.
//!
//! Login is three strictly sequential requests:
//!
//! 1. `POST <cas>` with username/password, answered `201 Created` with a
//!    form whose `action` points at the new ticket-granting ticket.
//! 2. `POST <cas>/<tgt>` with `service=<warehouse>`, answered `200 OK` with
//!    the service ticket as the whole body.
//! 3. `GET <warehouse>?ticket=<st>`, after which the warehouse has set the
//!    `JSESSIONID` cookie. Both 200 and 404 count as success here.
//!
//! Every step gets its own HTTP client; only the last one keeps cookies.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use reqwest::{Response, StatusCode, Url};
use tracing::{debug, info, instrument, warn};

use whtools_core::error::{AuthError, AuthFailure, AuthStage};
use whtools_core::tokens::SESSION_COOKIE;
use whtools_core::{Credentials, ServiceUrl, SessionId};

use crate::tls::TlsSettings;

/// Ticket-granting ticket id, valid for one login.
struct TicketGrantingTicket(String);

/// Single-use service ticket for the warehouse.
struct ServiceTicket(String);

impl fmt::Display for TicketGrantingTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ServiceTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client for a CAS server's REST ticket endpoint.
#[derive(Debug, Clone)]
pub struct CasClient {
    cas: ServiceUrl,
    tls: TlsSettings,
}

impl CasClient {
    /// Create a client for the CAS tickets resource, e.g.
    /// `https://cas.example.org/cas/v1/tickets`.
    pub fn new(cas: ServiceUrl, tls: TlsSettings) -> Self {
        Self { cas, tls }
    }

    /// Returns the CAS tickets URL.
    pub fn url(&self) -> &ServiceUrl {
        &self.cas
    }

    /// Exchange credentials for a warehouse session id.
    ///
    /// `service` is the HTTP address of the warehouse. The returned id is
    /// empty when the warehouse accepted the ticket without setting a
    /// session cookie.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthError`] naming the first step that failed.
    #[instrument(skip(self, credentials), fields(cas = %self.cas, username = %credentials.username()))]
    pub async fn login(
        &self,
        credentials: &Credentials,
        service: &ServiceUrl,
    ) -> Result<SessionId, AuthError> {
        let tgt = self.ticket_granting_ticket(credentials).await?;
        debug!(%tgt, "Got ticket-granting ticket");

        let st = self.service_ticket(&tgt, service).await?;
        debug!(%st, "Got service ticket");

        let session = self.redeem(service, &st).await?;
        if session.is_empty() {
            warn!("Warehouse did not set {}; continuing with an empty session id", SESSION_COOKIE);
        } else {
            info!("Successful CAS login");
        }

        Ok(session)
    }

    async fn ticket_granting_ticket(
        &self,
        credentials: &Credentials,
    ) -> Result<TicketGrantingTicket, AuthError> {
        let stage = AuthStage::TicketGrantingTicket;
        let client = self.http_client(stage, None)?;

        let response = client
            .post(self.cas.as_str())
            .form(&[
                ("username", credentials.username()),
                ("password", credentials.password()),
            ])
            .send()
            .await
            .map_err(|e| transport(stage, e))?;

        let (status, body) = read_response(stage, response).await?;
        if status != StatusCode::CREATED {
            return Err(status_error(stage, status, body));
        }

        match extract_ticket_id(&body) {
            Some(id) => Ok(TicketGrantingTicket(id.to_string())),
            None => Err(AuthError::new(stage, AuthFailure::TicketNotFound { body })),
        }
    }

    async fn service_ticket(
        &self,
        tgt: &TicketGrantingTicket,
        service: &ServiceUrl,
    ) -> Result<ServiceTicket, AuthError> {
        let stage = AuthStage::ServiceTicket;
        let client = self.http_client(stage, None)?;

        let url = self.cas.child(&tgt.0).map_err(|e| {
            AuthError::new(
                stage,
                AuthFailure::Transport {
                    message: e.to_string(),
                },
            )
        })?;

        let response = client
            .post(url.as_str())
            .form(&[("service", service.as_str())])
            .send()
            .await
            .map_err(|e| transport(stage, e))?;

        let (status, body) = read_response(stage, response).await?;
        if status != StatusCode::OK {
            return Err(status_error(stage, status, body));
        }

        Ok(ServiceTicket(body))
    }

    async fn redeem(&self, service: &ServiceUrl, st: &ServiceTicket) -> Result<SessionId, AuthError> {
        let stage = AuthStage::SessionRedeem;
        let cookies = Arc::new(SessionCookies::default());
        let client = self.http_client(stage, Some(cookies.clone()))?;

        let response = client
            .get(service.as_str())
            .query(&[("ticket", st.0.as_str())])
            .send()
            .await
            .map_err(|e| transport(stage, e))?;

        let (status, body) = read_response(stage, response).await?;
        if status != StatusCode::OK && status != StatusCode::NOT_FOUND {
            return Err(status_error(stage, status, body));
        }

        Ok(SessionId::new(cookies.find(SESSION_COOKIE).unwrap_or_default()))
    }

    fn http_client(
        &self,
        stage: AuthStage,
        cookies: Option<Arc<SessionCookies>>,
    ) -> Result<reqwest::Client, AuthError> {
        let mut builder =
            reqwest::Client::builder().user_agent(concat!("whtools/", env!("CARGO_PKG_VERSION")));
        if let Some(cookies) = cookies {
            builder = builder.cookie_provider(cookies);
        }

        self.tls
            .apply_to_http(builder)
            .and_then(reqwest::ClientBuilder::build)
            .map_err(|e| transport(stage, e))
    }
}

async fn read_response(
    stage: AuthStage,
    response: Response,
) -> Result<(StatusCode, String), AuthError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| transport(stage, e))?;
    debug!(%stage, %status, "CAS response");
    Ok((status, body))
}

fn status_error(stage: AuthStage, status: StatusCode, body: String) -> AuthError {
    AuthError::new(
        stage,
        AuthFailure::Status {
            status: status.as_u16(),
            body,
        },
    )
}

fn transport(stage: AuthStage, err: reqwest::Error) -> AuthError {
    AuthError::new(
        stage,
        AuthFailure::Transport {
            message: err.to_string(),
        },
    )
}

/// Pull the ticket id out of the `action="…/<id>"` attribute of a 201 body.
fn extract_ticket_id(body: &str) -> Option<&str> {
    const MARKER: &str = "action=\"";

    let start = body.rfind(MARKER)? + MARKER.len();
    let action = &body[start..];
    let action = &action[..action.find('"')?];
    let id = &action[action.rfind('/')? + 1..];

    (!id.is_empty()).then_some(id)
}

/// Cookie store for the redeem step.
///
/// Cookies are kept in a [`Jar`] for redirects, and every `Set-Cookie`
/// name/value pair is also recorded regardless of its domain or path, so the
/// session cookie is found even when it is scoped away from the service URL.
#[derive(Default)]
struct SessionCookies {
    jar: Jar,
    received: Mutex<Vec<(String, String)>>,
}

impl SessionCookies {
    /// The value of the most recently received cookie called `name`.
    fn find(&self, name: &str) -> Option<String> {
        let received = self.received.lock().unwrap_or_else(PoisonError::into_inner);
        received
            .iter()
            .rev()
            .find(|(cookie, _)| cookie == name)
            .map(|(_, value)| value.clone())
    }
}

impl CookieStore for SessionCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let headers: Vec<&HeaderValue> = cookie_headers.collect();

        {
            let mut received = self.received.lock().unwrap_or_else(PoisonError::into_inner);
            received.extend(
                headers
                    .iter()
                    .filter_map(|header| header.to_str().ok())
                    .filter_map(cookie_pair),
            );
        }

        self.jar.set_cookies(&mut headers.into_iter(), url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar.cookies(url)
    }
}

/// Name and value of a `Set-Cookie` header, without its attributes.
fn cookie_pair(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();

    (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
}
