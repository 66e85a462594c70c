// ABOUTME: Tests for proxy configuration rendering and activation.
// ABOUTME: Covers template determinism and the validate-before-reload gate.

mod support;

use apostoli::error::{Error, ExitCategory};
use apostoli::stages::{ProxyConfigurer, ProxyInputs, render_proxy_config};
use apostoli::types::AppName;
use support::fake_executor::FakeExecutor;

fn inputs(app: &str, port: u16) -> ProxyInputs {
    ProxyInputs::new(&AppName::new(app).unwrap(), port)
}

/// Test: identical inputs always render byte-identical output.
#[test]
fn rendering_is_deterministic() {
    let first = render_proxy_config(&inputs("demo", 8080));
    let second = render_proxy_config(&inputs("demo", 8080));
    assert_eq!(first, second);
}

/// Test: exactly one HTTP redirect block and one TLS-terminating block.
#[test]
fn rendered_config_has_one_redirect_and_one_tls_block() {
    let rendered = render_proxy_config(&inputs("demo", 8080));

    assert_eq!(rendered.matches("listen 80;").count(), 1);
    assert_eq!(rendered.matches("listen 443 ssl;").count(), 1);
    assert_eq!(rendered.matches("return 301 https://").count(), 1);
    assert!(rendered.contains("proxy_pass http://127.0.0.1:8080;"));
}

/// Test: the TLS block restricts protocols and forwards client identity.
#[test]
fn rendered_config_hardens_tls_and_forwards_headers() {
    let rendered = render_proxy_config(&inputs("demo", 3000));

    assert!(rendered.contains("ssl_protocols TLSv1.2 TLSv1.3;"));
    assert!(rendered.contains("ssl_ciphers "));
    assert!(rendered.contains("client_max_body_size"));
    assert!(rendered.contains("proxy_set_header Host $host;"));
    assert!(rendered.contains("proxy_set_header X-Real-IP $remote_addr;"));
    assert!(rendered.contains("proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;"));
    assert!(rendered.contains("proxy_set_header X-Forwarded-Proto $scheme;"));
    assert!(rendered.contains("proxy_set_header Upgrade $http_upgrade;"));
    assert!(rendered.contains("proxy_read_timeout"));
}

/// Test: different ports produce different configs (and only the port
/// reference differs in meaning).
#[test]
fn port_is_the_only_upstream_reference() {
    let a = render_proxy_config(&inputs("demo", 8080));
    let b = render_proxy_config(&inputs("demo", 9090));
    assert_ne!(a, b);
    assert!(b.contains("proxy_pass http://127.0.0.1:9090;"));
    assert!(!b.contains("8080"));
}

/// Test: the configure flow runs cert, write, link, check, reload in order.
#[tokio::test]
async fn configure_orders_steps_and_reloads() {
    let executor = FakeExecutor::new();
    let app = AppName::new("demo").unwrap();

    ProxyConfigurer::new(&executor, &app, 8080)
        .configure()
        .await
        .unwrap();

    let cert = executor.position("openssl req").unwrap();
    let write = executor.position("cat > '/etc/nginx/sites-available/demo.conf'").unwrap();
    let link = executor.position("ln -sf").unwrap();
    let check = executor.position("nginx -t").unwrap();
    let reload = executor.position("systemctl reload nginx").unwrap();

    assert!(cert < write && write < link && link < check && check < reload);
    assert!(executor.ran("rm -f /etc/nginx/sites-enabled/default"));
}

/// Test: a failed syntax check surfaces ProxyConfigError and skips the
/// reload entirely.
#[tokio::test]
async fn failed_syntax_check_blocks_reload() {
    let executor = FakeExecutor::new();
    let app = AppName::new("demo").unwrap();

    executor.respond("nginx -t", 1, "unexpected end of file in demo.conf");

    let err = ProxyConfigurer::new(&executor, &app, 8080)
        .configure()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ProxyConfig(_)));
    assert_eq!(err.category(), ExitCategory::ProxyConfig);
    assert!(err.to_string().contains("unexpected end of file"));
    assert!(!executor.ran("systemctl reload nginx"));
}

/// Test: the certificate step is guarded so an existing pair is reused.
#[tokio::test]
async fn certificate_generation_is_guarded() {
    let executor = FakeExecutor::new();
    let app = AppName::new("demo").unwrap();

    ProxyConfigurer::new(&executor, &app, 8080)
        .configure()
        .await
        .unwrap();

    let commands = executor.commands();
    let cert_step = commands
        .iter()
        .find(|c| c.contains("openssl req"))
        .expect("certificate step should run");
    assert!(
        cert_step.contains("if [ ! -f"),
        "generation must be behind an absence check: {cert_step}"
    );
}
