use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use wikigate::{ANONYMOUS_TOKEN, HttpClient, WikiError, params_from};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const CSRF_TOKEN: &str = "d41d8cd98f00b204e9800998ecf8427e+\\";

fn client(server: &MockServer, logged_in: bool, interval: Duration) -> HttpClient {
    let http = HttpClient::with_client(
        &format!("{}/api.php", server.uri()),
        reqwest::Client::new(),
        interval,
    );
    http.set_logged_in(logged_in);
    http
}

fn form(request: &Request) -> HashMap<String, String> {
    url::form_urlencoded::parse(&request.body)
        .into_owned()
        .collect()
}

async fn mount_csrf_token(server: &MockServer, delay: Duration) {
    Mock::given(method("GET"))
        .and(path("/api.php"))
        .and(query_param("meta", "tokens"))
        .and(query_param("type", "csrf"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "batchcomplete": "",
                    "query": {"tokens": {"csrftoken": CSRF_TOKEN}}
                }))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

async fn mount_success(server: &MockServer, action: &str, delay: Duration) {
    let mut body = json!({});
    body[action] = json!({"result": "Success"});
    Mock::given(method("POST"))
        .and(path("/api.php"))
        .and(body_string_contains(format!("action={action}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_authenticated_edit_fetches_and_injects_token() {
    let server = MockServer::start().await;
    mount_csrf_token(&server, Duration::ZERO).await;
    mount_success(&server, "edit", Duration::ZERO).await;
    let http = client(&server, true, Duration::from_millis(10));

    let params = params_from(&[("title", "Sandbox"), ("text", "Hello"), ("summary", "test")]);
    let result = http.edit_page(params).await.unwrap();
    assert_eq!(result["edit"]["result"], "Success");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method.as_str(), "GET");
    assert_eq!(requests[1].method.as_str(), "POST");

    let expected: HashMap<String, String> = params_from(&[
        ("title", "Sandbox"),
        ("text", "Hello"),
        ("summary", "test"),
        ("action", "edit"),
        ("format", "json"),
        ("token", CSRF_TOKEN),
    ]);
    assert_eq!(form(&requests[1]), expected);
}

#[tokio::test]
async fn test_control_fields_are_overwritten() {
    let server = MockServer::start().await;
    mount_csrf_token(&server, Duration::ZERO).await;
    mount_success(&server, "edit", Duration::ZERO).await;
    let http = client(&server, true, Duration::from_millis(10));

    let params = params_from(&[
        ("title", "Sandbox"),
        ("action", "delete"),
        ("format", "xml"),
        ("token", "stale"),
        ("bot", "1"),
    ]);
    http.submit("edit", params).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let sent = form(requests.last().unwrap());
    assert_eq!(sent.len(), 5);
    assert_eq!(sent["action"], "edit");
    assert_eq!(sent["format"], "json");
    assert_eq!(sent["token"], CSRF_TOKEN);
    assert_eq!(sent["bot"], "1");
    assert_eq!(sent["title"], "Sandbox");
}

#[tokio::test]
async fn test_anonymous_move_uses_placeholder_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("meta", "tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;
    mount_success(&server, "move", Duration::ZERO).await;
    let http = client(&server, false, Duration::from_millis(10));

    let params = params_from(&[("from", "Old"), ("to", "New"), ("reason", "rename")]);
    http.move_page(params).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let sent = form(&requests[0]);
    assert_eq!(sent["token"], ANONYMOUS_TOKEN);
    assert_eq!(sent["action"], "move");
    assert_eq!(sent.len(), 6);
}

#[tokio::test]
async fn test_api_error_becomes_edit_error() {
    let server = MockServer::start().await;
    mount_csrf_token(&server, Duration::ZERO).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"code": "permissiondenied", "info": "permissiondenied"}
        })))
        .mount(&server)
        .await;
    let http = client(&server, true, Duration::from_millis(10));

    let result = http
        .edit_page(params_from(&[("title", "Protected"), ("text", "x")]))
        .await;
    match result {
        Err(WikiError::Edit(info)) => assert_eq!(info, "permissiondenied"),
        other => panic!("Unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_token_fails_before_submission() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("type", "csrf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "batchcomplete": "",
            "query": {"tokens": {}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;
    let http = client(&server, true, Duration::from_millis(10));

    let result = http.edit_page(params_from(&[("title", "Foo")])).await;
    assert!(matches!(result, Err(WikiError::TokenGet(_))));
}

#[tokio::test]
async fn test_token_error_carries_server_info() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("type", "userrights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"code": "permissiondenied", "info": "You don't have permission to change user rights."}
        })))
        .mount(&server)
        .await;
    let http = client(&server, true, Duration::from_millis(10));

    match http.get_token("userrights").await {
        Err(WikiError::TokenGet(info)) => {
            assert_eq!(info, "You don't have permission to change user rights.")
        }
        other => panic!("Unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_lock_is_released_after_failure() {
    let server = MockServer::start().await;
    mount_csrf_token(&server, Duration::ZERO).await;
    Mock::given(method("POST"))
        .and(body_string_contains("title=Protected"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"code": "protectedpage", "info": "This page has been protected"}
        })))
        .mount(&server)
        .await;
    mount_success(&server, "edit", Duration::ZERO).await;
    let http = client(&server, true, Duration::from_millis(10));

    assert!(
        http.edit_page(params_from(&[("title", "Protected")]))
            .await
            .is_err()
    );
    let second = tokio::time::timeout(
        Duration::from_secs(5),
        http.edit_page(params_from(&[("title", "Open")])),
    )
    .await
    .expect("throttle still locked");
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_back_to_back_submissions_are_paced() {
    let server = MockServer::start().await;
    mount_csrf_token(&server, Duration::ZERO).await;
    mount_success(&server, "edit", Duration::ZERO).await;
    let interval = Duration::from_millis(300);
    let http = client(&server, true, interval);

    http.edit_page(params_from(&[("title", "A")])).await.unwrap();
    let first = http.throttle().last_edit().await.unwrap();
    http.edit_page(params_from(&[("title", "B")])).await.unwrap();
    let second = http.throttle().last_edit().await.unwrap();
    assert!(second - first >= interval);
}

#[tokio::test]
async fn test_concurrent_submissions_never_overlap() {
    let server = MockServer::start().await;
    mount_csrf_token(&server, Duration::from_millis(50)).await;
    mount_success(&server, "edit", Duration::from_millis(50)).await;
    let http = Arc::new(client(&server, true, Duration::from_millis(20)));

    let mut handles = vec![];
    for i in 0..3 {
        let http = http.clone();
        handles.push(tokio::spawn(async move {
            let title = format!("Page {i}");
            http.edit_page(params_from(&[("title", title.as_str())])).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let methods: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.method.as_str().to_string())
        .collect();
    assert_eq!(methods, vec!["GET", "POST", "GET", "POST", "GET", "POST"]);
}

#[tokio::test]
async fn test_reads_proceed_during_throttle_wait() {
    let server = MockServer::start().await;
    mount_csrf_token(&server, Duration::ZERO).await;
    mount_success(&server, "edit", Duration::ZERO).await;
    Mock::given(method("GET"))
        .and(query_param("list", "random"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": {"random": [{"id": 1, "ns": 0, "title": "Foo"}]}
        })))
        .mount(&server)
        .await;
    let http = Arc::new(client(&server, true, Duration::from_secs(2)));
    http.edit_page(params_from(&[("title", "A")])).await.unwrap();

    let waiting = {
        let http = http.clone();
        tokio::spawn(async move { http.edit_page(params_from(&[("title", "B")])).await })
    };
    let titles = tokio::time::timeout(Duration::from_secs(1), http.get_random_pages(1, 0))
        .await
        .expect("read blocked by throttle")
        .unwrap();
    assert_eq!(titles, vec!["Foo".to_string()]);
    assert!(!waiting.is_finished());
    waiting.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_non_json_response_propagates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Server error</html>"))
        .mount(&server)
        .await;
    let http = client(&server, false, Duration::from_millis(10));

    let result = http.edit_page(params_from(&[("title", "Foo")])).await;
    assert!(matches!(result, Err(WikiError::Http(_))));
}

#[tokio::test]
async fn test_rights_change_is_paced_after_edit() {
    let server = MockServer::start().await;
    mount_csrf_token(&server, Duration::ZERO).await;
    mount_success(&server, "edit", Duration::ZERO).await;
    Mock::given(method("GET"))
        .and(query_param("type", "userrights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "batchcomplete": "",
            "query": {"tokens": {"userrightstoken": "rights+\\"}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("action=userrights"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "userrights": {"user": "Foo", "userid": 7, "added": ["bot"], "removed": []}
        })))
        .mount(&server)
        .await;
    let interval = Duration::from_millis(300);
    let http = client(&server, true, interval);

    http.edit_page(params_from(&[("title", "A")])).await.unwrap();
    let edited = http.throttle().last_edit().await.unwrap();
    http.user_rights(params_from(&[("user", "Foo"), ("add", "bot")]))
        .await
        .unwrap();
    let first_rights = http.throttle().last_edit().await.unwrap();
    http.user_rights(params_from(&[("user", "Foo"), ("add", "bot")]))
        .await
        .unwrap();
    let second_rights = http.throttle().last_edit().await.unwrap();
    assert!(first_rights - edited >= interval);
    assert!(second_rights - first_rights >= interval);

    let requests = server.received_requests().await.unwrap();
    let sent = form(requests.last().unwrap());
    assert_eq!(sent["token"], "rights+\\");
}

#[tokio::test]
async fn test_empty_error_field_is_not_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "",
            "edit": {"result": "Success"}
        })))
        .mount(&server)
        .await;
    let http = client(&server, false, Duration::from_millis(10));

    let result = http.edit_page(params_from(&[("title", "Foo")])).await.unwrap();
    assert_eq!(result["edit"]["result"], "Success");
}
