use assert_cmd::assert::OutputAssertExt;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("gravid").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: gravid [OPTIONS] <COMMAND>"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("about"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("--api-url <API_URL>"))
        .stdout(predicate::str::contains("--countdown <COUNTDOWN>"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn test_cli_serve_help() {
    let mut cmd = Command::cargo_bin("gravid").unwrap();
    cmd.arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: gravid serve"))
        .stdout(predicate::str::contains("--port <PORT>"))
        .stdout(predicate::str::contains("--templates <TEMPLATES>"));
}

#[test]
fn test_cli_ask_help() {
    let mut cmd = Command::cargo_bin("gravid").unwrap();
    cmd.arg("ask")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: gravid ask [OPTIONS] <QUESTION>"));
}

#[test]
fn test_cli_no_command() {
    // Running without a command should show help/usage
    let mut cmd = Command::cargo_bin("gravid").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage: gravid [OPTIONS] <COMMAND>"));
}

#[test]
fn test_cli_rejects_invalid_api_url() {
    let mut cmd = Command::cargo_bin("gravid").unwrap();
    cmd.args(["--api-url", "not a url", "ask", "oi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_cli_reads_countdown_from_env() {
    let mut cmd = Command::cargo_bin("gravid").unwrap();
    cmd.env("GRAVID_COUNTDOWN", "0")
        .args(["ask", "oi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"))
        .stderr(predicate::str::contains("countdown must start above zero"));
}

#[test]
fn test_cli_flag_overrides_env() {
    let mut cmd = Command::cargo_bin("gravid").unwrap();
    cmd.env("GRAVID_TIMEOUT", "30")
        .args(["--timeout", "0", "ask", "oi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("request timeout must be above zero"));
}

#[test]
fn test_cli_help_shows_defaults() {
    let mut cmd = Command::cargo_bin("gravid").unwrap();
    cmd.env_remove("GRAVID_API_URL")
        .env_remove("GRAVID_COUNTDOWN")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("env: GRAVID_API_URL"))
        .stdout(predicate::str::contains("[default: https://gravidai.onrender.com]"))
        .stdout(predicate::str::contains("[default: 20]"));
}

#[tokio::test]
async fn test_cli_ask_prints_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ask_question"))
        .and(body_json(json!({ "question": "Posso tomar café?" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "Com moderação.",
            "source": [{ "source": "Caderneta da gestante.pdf", "page": 12 }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("gravid")
            .unwrap()
            .env("GRAVID_API_URL", uri)
            .args(["ask", "  Posso tomar café? "])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    output
        .assert()
        .success()
        .stdout(predicate::str::contains("GravidAI: Com moderação."))
        .stdout(predicate::str::contains("Fonte: Caderneta da gestante.pdf (p. 12)"));
}

#[tokio::test]
async fn test_cli_ask_reports_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ask_question"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("gravid")
            .unwrap()
            .args(["--api-url", uri.as_str(), "ask", "Posso tomar café?"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    output
        .assert()
        .failure()
        .stderr(predicate::str::contains("Erro ao obter resposta. Tente novamente."));
}

#[tokio::test]
async fn test_cli_about() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "\n    O GravidAI é um assistente virtual.\n"
        })))
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("gravid")
            .unwrap()
            .env("GRAVID_API_URL", uri)
            .arg("about")
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    output
        .assert()
        .success()
        .stdout(predicate::str::contains("O GravidAI é um assistente virtual."));
}
