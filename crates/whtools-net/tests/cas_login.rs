//! CAS login tests against a mock CAS server and warehouse.

use whtools_core::error::{AuthFailure, AuthStage};
use whtools_core::{Credentials, ServiceUrl};
use whtools_net::{CasClient, TlsSettings};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TICKETS: &str = "/cas/v1/tickets";

fn cas_client(server: &MockServer) -> CasClient {
    let url = ServiceUrl::new(format!("{}{}", server.uri(), TICKETS)).unwrap();
    CasClient::new(url, TlsSettings::system_default())
}

fn service_url(server: &MockServer) -> ServiceUrl {
    ServiceUrl::new(format!("{}/whtools", server.uri())).unwrap()
}

fn tgt_body(server: &MockServer, id: &str) -> String {
    format!(
        r#"<!DOCTYPE HTML PUBLIC "-//IETF//DTD HTML 2.0//EN"><html><head><title>201 Created</title></head><body><h1>TGT Created</h1><form action="{}{}/{}" method="POST">Service:<input type="text" name="service" value=""><br><input type="submit" value="Submit"></form></body></html>"#,
        server.uri(),
        TICKETS,
        id
    )
}

async fn mount_tgt(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TICKETS))
        .and(body_string_contains("username=alice"))
        .and(body_string_contains("password=s3cret"))
        .respond_with(ResponseTemplate::new(201).set_body_string(tgt_body(server, "TGT-1-abc")))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_st(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("{}/TGT-1-abc", TICKETS)))
        .and(body_string_contains("service=http%3A%2F%2F127.0.0.1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ST-9-xyz"))
        .expect(1)
        .mount(server)
        .await;
}

fn credentials() -> Credentials {
    Credentials::new("alice", "s3cret")
}

#[tokio::test]
async fn test_login_returns_session_cookie_on_404() {
    let server = MockServer::start().await;
    mount_tgt(&server).await;
    mount_st(&server).await;

    Mock::given(method("GET"))
        .and(path("/whtools"))
        .and(query_param("ticket", "ST-9-xyz"))
        .respond_with(ResponseTemplate::new(404).insert_header("Set-Cookie", "JSESSIONID=xyz; Path=/"))
        .expect(1)
        .mount(&server)
        .await;

    let session = cas_client(&server)
        .login(&credentials(), &service_url(&server))
        .await
        .unwrap();

    assert_eq!(session.as_str(), "xyz");
}

#[tokio::test]
async fn test_login_returns_session_cookie_on_200() {
    let server = MockServer::start().await;
    mount_tgt(&server).await;
    mount_st(&server).await;

    Mock::given(method("GET"))
        .and(path("/whtools"))
        .and(query_param("ticket", "ST-9-xyz"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", "JSESSIONID=0A1B2C; Path=/whtools; HttpOnly"),
        )
        .mount(&server)
        .await;

    let session = cas_client(&server)
        .login(&credentials(), &service_url(&server))
        .await
        .unwrap();

    assert_eq!(session.as_str(), "0A1B2C");
    assert_eq!(session.cookie_header(), "JSESSIONID=0A1B2C");
}

#[tokio::test]
async fn test_login_finds_cookie_scoped_to_another_path() {
    let server = MockServer::start().await;
    mount_tgt(&server).await;
    mount_st(&server).await;

    Mock::given(method("GET"))
        .and(path("/whtools"))
        .respond_with(
            ResponseTemplate::new(404).insert_header("Set-Cookie", "JSESSIONID=xyz; Path=/whtools/"),
        )
        .mount(&server)
        .await;

    let session = cas_client(&server)
        .login(&credentials(), &service_url(&server))
        .await
        .unwrap();

    assert_eq!(session.as_str(), "xyz");
}

#[tokio::test]
async fn test_service_ticket_body_is_used_verbatim() {
    let server = MockServer::start().await;
    mount_tgt(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("{}/TGT-1-abc", TICKETS)))
        .respond_with(ResponseTemplate::new(200).set_body_string("ST-9-xyz\n"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/whtools"))
        .and(query_param("ticket", "ST-9-xyz\n"))
        .respond_with(ResponseTemplate::new(200).insert_header("Set-Cookie", "JSESSIONID=raw"))
        .expect(1)
        .mount(&server)
        .await;

    let session = cas_client(&server)
        .login(&credentials(), &service_url(&server))
        .await
        .unwrap();

    assert_eq!(session.as_str(), "raw");
}

#[tokio::test]
async fn test_login_without_cookie_yields_empty_session() {
    let server = MockServer::start().await;
    mount_tgt(&server).await;
    mount_st(&server).await;

    Mock::given(method("GET"))
        .and(path("/whtools"))
        .respond_with(ResponseTemplate::new(200).insert_header("Set-Cookie", "other=1; Path=/"))
        .mount(&server)
        .await;

    let session = cas_client(&server)
        .login(&credentials(), &service_url(&server))
        .await
        .unwrap();

    assert!(session.is_empty());
}

#[tokio::test]
async fn test_bad_credentials_fail_first_step() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TICKETS))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    // Later steps must never run.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = cas_client(&server)
        .login(&credentials(), &service_url(&server))
        .await
        .unwrap_err();

    assert_eq!(err.stage, AuthStage::TicketGrantingTicket);
    assert_eq!(err.status(), Some(401));
    assert!(err.to_string().contains("bad credentials"));
}

#[tokio::test]
async fn test_ok_instead_of_created_is_a_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TICKETS))
        .respond_with(ResponseTemplate::new(200).set_body_string(tgt_body(&server, "TGT-1-abc")))
        .mount(&server)
        .await;

    let err = cas_client(&server)
        .login(&credentials(), &service_url(&server))
        .await
        .unwrap_err();

    assert_eq!(err.stage, AuthStage::TicketGrantingTicket);
    assert_eq!(err.status(), Some(200));
}

#[tokio::test]
async fn test_created_without_ticket_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TICKETS))
        .respond_with(ResponseTemplate::new(201).set_body_string("<html>created</html>"))
        .mount(&server)
        .await;

    let err = cas_client(&server)
        .login(&credentials(), &service_url(&server))
        .await
        .unwrap_err();

    assert_eq!(err.stage, AuthStage::TicketGrantingTicket);
    assert!(matches!(err.reason, AuthFailure::TicketNotFound { .. }));
}

#[tokio::test]
async fn test_service_ticket_rejection_carries_status_and_body() {
    let server = MockServer::start().await;
    mount_tgt(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("{}/TGT-1-abc", TICKETS)))
        .respond_with(ResponseTemplate::new(400).set_body_string("TGT expired"))
        .mount(&server)
        .await;

    let err = cas_client(&server)
        .login(&credentials(), &service_url(&server))
        .await
        .unwrap_err();

    assert_eq!(err.stage, AuthStage::ServiceTicket);
    assert_eq!(err.status(), Some(400));
    let msg = err.to_string();
    assert!(msg.contains("getServiceTicket"));
    assert!(msg.contains("TGT expired"));
}

#[tokio::test]
async fn test_redeem_rejection_fails_third_step() {
    let server = MockServer::start().await;
    mount_tgt(&server).await;
    mount_st(&server).await;

    Mock::given(method("GET"))
        .and(path("/whtools"))
        .respond_with(ResponseTemplate::new(403).set_body_string("ticket not valid"))
        .mount(&server)
        .await;

    let err = cas_client(&server)
        .login(&credentials(), &service_url(&server))
        .await
        .unwrap_err();

    assert_eq!(err.stage, AuthStage::SessionRedeem);
    assert_eq!(err.status(), Some(403));
}

#[tokio::test]
async fn test_unreachable_cas_is_a_transport_failure() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let cas = ServiceUrl::new(format!("http://127.0.0.1:{}{}", port, TICKETS)).unwrap();
    let service = ServiceUrl::new(format!("http://127.0.0.1:{}/whtools", port)).unwrap();
    let client = CasClient::new(cas, TlsSettings::system_default());

    let err = client.login(&credentials(), &service).await.unwrap_err();

    assert_eq!(err.stage, AuthStage::TicketGrantingTicket);
    assert!(matches!(err.reason, AuthFailure::Transport { .. }));
    assert_eq!(err.status(), None);
}
