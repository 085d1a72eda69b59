use aire_ingest::clock::FixedClock;
use aire_ingest::config::{Config, SourceConfig};
use aire_ingest::error::AppError;
use aire_ingest::extractor::{extract, ExtractOutcome};
use aire_ingest::fetcher::Fetcher;
use aire_ingest::models::HourlyRequest;
use chrono::NaiveDate;
use std::io::Write;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"<html><body>
<table>
  <tr><th>Fecha</th><th>Hora</th><th>ATM</th><th>CEN</th></tr>
  <tr><td>01/03/2025</td><td>1</td><td>8.1</td><td>N/D</td></tr>
</table>
</body></html>"#;

fn source(base_url: &str, max_retries: u32) -> SourceConfig {
    SourceConfig {
        base_url: base_url.to_string(),
        query_type: "HORARIO".to_string(),
        timeout_seconds: 5,
        max_retries,
        user_agent: "aire-ingest-test".to_string(),
    }
}

/// Test that the fetched page is parsed end to end, with pm25 sent as pm2
#[tokio::test]
async fn test_fetches_with_wire_code_and_extracts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/horario.php"))
        .and(query_param("qtipo", "HORARIO"))
        .and(query_param("parametro", "pm2"))
        .and(query_param("anio", "2025"))
        .and(query_param("qmes", "03"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let base_url = format!("{}/horario.php", mock_server.uri());
    let fetcher = Fetcher::new(&source(&base_url, 0)).expect("Failed to create fetcher");

    let request = HourlyRequest::new("pm25", "2025", "03");
    let markup = fetcher
        .fetch_markup(&request)
        .await
        .expect("Fetch failed");

    let clock = FixedClock(
        NaiveDate::from_ymd_opt(2025, 4, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap(),
    );
    let extraction = extract(&markup, &request, &clock);

    assert_eq!(extraction.outcome, ExtractOutcome::Extracted);
    assert_eq!(extraction.observations.len(), 2);
    assert!(extraction
        .observations
        .iter()
        .all(|o| o.parameter == "pm25"));
}

/// Test optional filters reach the upstream query
#[tokio::test]
async fn test_sends_optional_filters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("dia", "07"))
        .and(query_param("hora", "9"))
        .and(query_param("qestacion", "ATM"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(&source(&mock_server.uri(), 0)).expect("Failed to create fetcher");
    let request = HourlyRequest::new("o3", "2025", "03")
        .with_day("07")
        .with_hour(9)
        .with_station("ATM");

    assert!(fetcher.fetch_markup(&request).await.is_ok());
}

/// Test retry logic with transient failures
#[tokio::test]
async fn test_retries_on_server_error() {
    let mock_server = MockServer::start().await;

    // First two requests fail with 500, third succeeds
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(&source(&mock_server.uri(), 3)).expect("Failed to create fetcher");
    let markup = fetcher
        .fetch_markup(&HourlyRequest::new("o3", "2025", "03"))
        .await
        .expect("Fetch should succeed after retries");

    assert!(markup.contains("Hora"));
}

/// Test client errors are reported without retrying
#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = Fetcher::new(&source(&mock_server.uri(), 3)).expect("Failed to create fetcher");
    let result = fetcher
        .fetch_markup(&HourlyRequest::new("o3", "2025", "03"))
        .await;

    match result {
        Err(AppError::Http(e)) => assert_eq!(e.status().map(|s| s.as_u16()), Some(404)),
        other => panic!("Expected HTTP error, got: {:?}", other.map(|m| m.len())),
    }
}

/// Test loading a config file with environment substitution
#[test]
fn test_config_load_from_file() {
    std::env::set_var("AIRE_INGEST_TEST_BASE_URL", "https://aire.example.gob.mx/horario.php");

    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    writeln!(
        file,
        "source:\n  base_url: ${{AIRE_INGEST_TEST_BASE_URL}}\n  max_retries: 1\ndefaults:\n  parameter: pm10\n  station: CEN"
    )
    .expect("Failed to write config");

    let config = Config::load(file.path()).expect("Config should load");
    assert_eq!(config.source.base_url, "https://aire.example.gob.mx/horario.php");
    assert_eq!(config.source.max_retries, 1);
    assert_eq!(config.defaults.parameter, "pm10");
    assert_eq!(config.defaults.station.as_deref(), Some("CEN"));
}

/// Test missing config file is a configuration error
#[test]
fn test_config_missing_file() {
    match Config::load("/nonexistent/aire-ingest/config.yaml") {
        Err(AppError::Config(msg)) => assert!(msg.contains("Failed to read config file")),
        other => panic!("Expected Config error, got: {:?}", other.map(|_| ())),
    }
}
