use std::sync::Arc;
use std::time::Duration;

use quota_scan::{
    HttpTransportFactory, LogObserver, PollConfig, QuotaPoller, RetryPolicy, Target,
    TransportConfig,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CALENDAR: &str = r#"
<div class="table-responsive">
  <table class="table table-bordered">
    <thead><tr><th>Tanggal</th><th>Kuota</th></tr></thead>
    <tbody>
      <tr>
        <td>Jumat, <span class="text-primary">17 Oktober 2025</span></td>
        <td><span class="text-red">Kuota Penuh</span><span class="hide"></span></td>
      </tr>
      <tr>
        <td>Sabtu, <span class="text-primary">18 Oktober 2025</span></td>
        <td><span class="text-green">Tersedia</span> <span class="hide">42</span></td>
      </tr>
    </tbody>
  </table>
</div>"#;

fn poller(base_url: &str) -> QuotaPoller {
    let transport = TransportConfig {
        base_url: base_url.to_string(),
        retry: RetryPolicy {
            backoff_factor: Duration::from_millis(5),
            ..RetryPolicy::default()
        },
        ..TransportConfig::default()
    };
    let config = PollConfig {
        year_month: "2025-10".to_string(),
        interval: Duration::from_millis(10),
        ..PollConfig::default()
    };

    QuotaPoller::new(
        Arc::new(HttpTransportFactory::new(transport)),
        Arc::new(LogObserver),
        config,
    )
    .unwrap()
}

async fn calendar_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/website/home/get_view"))
        .and(body_string_contains("year_month=2025-10"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CALENDAR))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn single_check_finds_available_date() {
    let server = calendar_server().await;
    let mut poller = poller(&server.uri());

    let record = poller
        .check_once(&Target::Localized("18 Oktober 2025".to_string()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.date_text, "Sabtu, 18 Oktober 2025");
    assert_eq!(record.remaining, Some(42));
    assert!(record.is_available);
}

#[tokio::test]
async fn single_check_reports_full_date() {
    let server = calendar_server().await;
    let mut poller = poller(&server.uri());

    let record = poller.check_once(&Target::Day(17)).await.unwrap().unwrap();

    assert!(record.is_full);
    assert!(!record.is_available);
    assert_eq!(record.remaining, None);
}

#[tokio::test]
async fn single_check_unlisted_date_is_none() {
    let server = calendar_server().await;
    let mut poller = poller(&server.uri());

    let record = poller
        .check_once(&Target::Iso("2025-10-31".to_string()))
        .await
        .unwrap();

    assert!(record.is_none());
}

#[tokio::test]
async fn wait_until_available_survives_transient_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CALENDAR))
        .mount(&server)
        .await;

    let mut poller = poller(&server.uri());
    let record = poller
        .wait_until_available(&Target::Day(18), 5, &CancellationToken::new())
        .await;

    assert!(record.is_some_and(|r| r.is_available));
    assert_eq!(poller.session().consecutive_errors(), 0);
    assert_eq!(poller.session().successful_requests(), 1);
}
