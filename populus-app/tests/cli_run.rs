use clap::Parser;
use populus_app::cli::Cli;
use populus_app::run::{
    EXIT_ALL_PROVIDERS_FAILED, EXIT_CONFIG, EXIT_CSV, EXIT_OK, execute,
};
use populus_render::{WordCloudOptions, WordCloudRenderer};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Config pointing every endpoint at the mock server.
fn write_config(tmp: &TempDir, server: &MockServer, bing_key: &str) -> PathBuf {
    let uri = server.uri();
    let yaml = format!(
        r#"
credentials:
  bing_api_key: "{bing_key}"
endpoints:
  google_search: "{uri}/"
  bing_search: "{uri}/"
  duckduckgo: "{uri}/"
  trends: "{uri}/"
http:
  timeout_secs: 5
logging:
  dir: "{logs}"
"#,
        logs = tmp.path().join("logs").display()
    );
    let p = tmp.path().join("populus.yaml");
    fs::write(&p, yaml).expect("write config");
    p
}

async fn run(args: &[&str]) -> (u8, String) {
    let cli = Cli::try_parse_from(args).expect("valid args");
    let mut out = Vec::new();
    let code = execute(cli, &mut out).await;
    (code, String::from_utf8(out).unwrap())
}

fn args<'a>(config: &'a Path, output: &'a Path, extra: &[&'a str]) -> Vec<&'a str> {
    let mut v = vec![
        "populus",
        "--config",
        config.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
    ];
    v.extend_from_slice(extra);
    v
}

async fn mount_trends(server: &MockServer) {
    let explore = json!({ "widgets": [
        { "id": "TIMESERIES", "token": "ts", "request": {} }
    ]});
    Mock::given(method("GET"))
        .and(path("/trends/api/explore"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(")]}}'\n{explore}")))
        .mount(server)
        .await;
    let multiline = json!({ "default": { "timelineData": [
        { "time": "1712448000", "value": [12] },
        { "time": "1712534400", "value": [87] }
    ]}});
    Mock::given(method("GET"))
        .and(path("/trends/api/widgetdata/multiline"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(")]}}',\n{multiline}")))
        .mount(server)
        .await;
}

#[tokio::test]
async fn duckduckgo_run_prints_terms_and_writes_csv() {
    let server = MockServer::start().await;
    mount_trends(&server).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "RelatedTopics": [
                { "Text": "Solar eclipse - Moon blocks the Sun", "FirstURL": "https://duckduckgo.com/Solar_eclipse" },
                { "Text": "solar  Eclipse - duplicate spelling", "FirstURL": "https://duckduckgo.com/Solar_Eclipse" },
                { "Text": "Eclipse glasses - Eye protection", "FirstURL": "https://duckduckgo.com/Eclipse_glasses" }
            ]
        })))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, &server, "");
    let output = tmp.path().join("results.csv");
    let (code, stdout) = run(&args(&config, &output, &["-q", "solar eclipse", "-p", "duckduckgo"])).await;

    assert_eq!(code, EXIT_OK);
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        vec!["Solar eclipse\t2024-04-08\t87", "Eclipse glasses\t2024-04-08\t87"]
    );
    let csv = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "term,peak_date,popularity_score");
    assert_eq!(lines[1], "Solar eclipse,2024-04-08,87");
    assert_eq!(lines.len(), 3);
}

#[tokio::test]
async fn wordcloud_is_written_next_to_the_csv() {
    if !WordCloudRenderer::new(WordCloudOptions::default()).has_font() {
        eprintln!("no system font found, skipping word cloud run");
        return;
    }
    let server = MockServer::start().await;
    mount_trends(&server).await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "RelatedTopics": [
                { "Text": "Solar eclipse - Moon blocks the Sun", "FirstURL": "https://duckduckgo.com/Solar_eclipse" },
                { "Text": "Eclipse glasses - Eye protection", "FirstURL": "https://duckduckgo.com/Eclipse_glasses" }
            ]
        })))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, &server, "");
    let output = tmp.path().join("results.csv");
    let cloud = tmp.path().join("cloud.png");
    let (code, _) = run(&args(
        &config,
        &output,
        &["-q", "solar eclipse", "-p", "ddg", "-w", cloud.to_str().unwrap()],
    ))
    .await;

    assert_eq!(code, EXIT_OK);
    assert!(output.exists());
    let png = fs::read(&cloud).unwrap();
    assert_eq!(&png[..4], &[137, 80, 78, 71]);
}

#[tokio::test]
async fn every_provider_failing_exits_3_without_csv() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, &server, "bing-key");
    let output = tmp.path().join("results.csv");
    let (code, stdout) = run(&args(&config, &output, &["-q", "solar eclipse", "-p", "bing,duckduckgo"])).await;

    assert_eq!(code, EXIT_ALL_PROVIDERS_FAILED);
    assert!(stdout.is_empty());
    assert!(!output.exists());
}

#[tokio::test]
async fn missing_bing_key_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, &server, "");
    let output = tmp.path().join("results.csv");
    let (code, _) = run(&args(&config, &output, &["-q", "solar eclipse", "-p", "bing"])).await;

    assert_eq!(code, EXIT_CONFIG);
    assert!(!output.exists());
}

#[tokio::test]
async fn invalid_country_is_a_request_error() {
    let server = MockServer::start().await;
    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, &server, "");
    let output = tmp.path().join("results.csv");
    let (code, _) = run(&args(&config, &output, &["-q", "x", "-c", "spain", "-p", "ddg"])).await;
    assert_eq!(code, EXIT_CONFIG);
}

#[tokio::test]
async fn missing_config_file_is_a_config_error() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("nope.yaml");
    let output = tmp.path().join("results.csv");
    let (code, _) = run(&args(&config, &output, &["-q", "x"])).await;
    assert_eq!(code, EXIT_CONFIG);
}

#[tokio::test]
async fn empty_result_writes_header_and_skips_wordcloud() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "RelatedTopics": [] })))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, &server, "");
    let output = tmp.path().join("results.csv");
    let cloud = tmp.path().join("cloud.png");
    let (code, _) = run(&args(
        &config,
        &output,
        &["-q", "nothing", "-p", "ddg", "-w", cloud.to_str().unwrap()],
    ))
    .await;

    assert_eq!(code, EXIT_OK);
    assert_eq!(fs::read_to_string(&output).unwrap().trim_end(), "term,peak_date,popularity_score");
    assert!(!cloud.exists());
}

#[tokio::test]
async fn unwritable_output_exits_4() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "RelatedTopics": [] })))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let config = write_config(&tmp, &server, "");
    let output = tmp.path().join("missing-dir").join("results.csv");
    let (code, _) = run(&args(&config, &output, &["-q", "x", "-p", "ddg"])).await;
    assert_eq!(code, EXIT_CSV);
}
