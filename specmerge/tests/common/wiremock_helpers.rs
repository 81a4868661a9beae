use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mounts a HEAD responder at `url_path` reporting the given type and length.
///
/// `expected_calls` is verified when the server is dropped.
pub async fn mount_image_head(
    server: &MockServer,
    url_path: &str,
    content_type: &str,
    content_length: Option<u64>,
    expected_calls: Option<u64>,
) {
    let mut response = ResponseTemplate::new(200).insert_header("content-type", content_type);
    if let Some(len) = content_length {
        response = response.insert_header("content-length", len.to_string().as_str());
    }

    let mock = Mock::given(method("HEAD")).and(path(url_path)).respond_with(response);
    match expected_calls {
        Some(n) => mock.expect(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

/// Mounts a HEAD responder that answers only after `delay_ms`.
pub async fn mount_slow_head(server: &MockServer, url_path: &str, delay_ms: u64) {
    Mock::given(method("HEAD"))
        .and(path(url_path))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .insert_header("content-length", "999999")
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(server)
        .await;
}

/// Mounts a HEAD responder with a non-success status.
pub async fn mount_status_head(server: &MockServer, url_path: &str, status: u16) {
    Mock::given(method("HEAD"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

pub fn url(server: &MockServer, url_path: &str) -> String {
    format!("{}{}", server.uri(), url_path)
}
