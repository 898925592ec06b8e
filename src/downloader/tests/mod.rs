use super::test_helpers::*;
use super::*;
use crate::container::encode_direct_link;
use crate::error::JobError;
use crate::types::{AddOptions, JobKind, Priority, State};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

mod submit;

/// Hoster answering every availability probe with 200
async fn hoster() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}
