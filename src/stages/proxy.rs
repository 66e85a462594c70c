// ABOUTME: Reverse-proxy configuration: certificate, rendered config, activation.
// ABOUTME: Rendering is a pure function so identical inputs give identical bytes.

use crate::error::{Error, Result};
use crate::ssh::{Executor, RemoteCommand};
use crate::stages::result::{EXCERPT_LINES, excerpt};
use crate::stages::shell_quote;
use crate::types::AppName;
use std::time::Duration;

const STEP_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared self-signed certificate pair, provisioned once per host.
pub const CERT_PATH: &str = "/etc/ssl/certs/apostoli-selfsigned.crt";
pub const KEY_PATH: &str = "/etc/ssl/private/apostoli-selfsigned.key";

const CERT_DAYS: u32 = 365;
const CERT_BITS: u32 = 2048;

const SITES_AVAILABLE: &str = "/etc/nginx/sites-available";
const SITES_ENABLED: &str = "/etc/nginx/sites-enabled";

/// Heredoc delimiter for writing the rendered config. Must never occur
/// in the rendered output.
const HEREDOC_TAG: &str = "APOSTOLI_NGINX_EOF";

/// Template inputs for one application's proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyInputs {
    pub app: AppName,
    pub port: u16,
    pub cert_path: String,
    pub key_path: String,
}

impl ProxyInputs {
    pub fn new(app: &AppName, port: u16) -> Self {
        Self {
            app: app.clone(),
            port,
            cert_path: CERT_PATH.to_string(),
            key_path: KEY_PATH.to_string(),
        }
    }
}

/// Render the nginx configuration for an application.
///
/// Deterministic: the same inputs always produce byte-identical output,
/// so re-running the stage overwrites the file with no semantic change.
/// One plain-HTTP redirect block, one TLS-terminating block.
pub fn render_proxy_config(inputs: &ProxyInputs) -> String {
    format!(
        r#"# managed by apostoli: {app}
server {{
    listen 80;
    listen [::]:80;
    server_name _;
    return 301 https://$host$request_uri;
}}

server {{
    listen 443 ssl;
    listen [::]:443 ssl;
    server_name _;

    ssl_certificate {cert};
    ssl_certificate_key {key};
    ssl_protocols TLSv1.2 TLSv1.3;
    ssl_ciphers ECDHE-ECDSA-AES128-GCM-SHA256:ECDHE-RSA-AES128-GCM-SHA256:ECDHE-ECDSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-GCM-SHA384;
    ssl_prefer_server_ciphers off;

    client_max_body_size 50m;

    location / {{
        proxy_pass http://127.0.0.1:{port};
        proxy_http_version 1.1;
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_set_header Upgrade $http_upgrade;
        proxy_set_header Connection "upgrade";
        proxy_connect_timeout 60s;
        proxy_send_timeout 60s;
        proxy_read_timeout 60s;
    }}
}}
"#,
        app = inputs.app,
        cert = inputs.cert_path,
        key = inputs.key_path,
        port = inputs.port,
    )
}

/// Provisions the certificate, writes and activates the configuration,
/// and reloads nginx only after the syntax check passes.
pub struct ProxyConfigurer<'a, E: Executor> {
    executor: &'a E,
    inputs: ProxyInputs,
}

impl<'a, E: Executor> ProxyConfigurer<'a, E> {
    pub fn new(executor: &'a E, app: &AppName, port: u16) -> Self {
        Self {
            executor,
            inputs: ProxyInputs::new(app, port),
        }
    }

    pub async fn configure(&self) -> Result<String> {
        self.ensure_certificate().await?;
        self.write_config().await?;
        self.activate().await?;
        self.validate_and_reload().await?;
        Ok(format!(
            "proxy for {} -> 127.0.0.1:{} active",
            self.inputs.app, self.inputs.port
        ))
    }

    /// Generate the shared self-signed pair only if it is absent.
    async fn ensure_certificate(&self) -> Result<()> {
        let script = format!(
            "if [ ! -f {crt} ] || [ ! -f {key} ]; then \
             mkdir -p /etc/ssl/certs /etc/ssl/private && \
             openssl req -x509 -nodes -days {days} -newkey rsa:{bits} \
             -keyout {key} -out {crt} -subj '/CN=apostoli'; fi",
            crt = shell_quote(CERT_PATH),
            key = shell_quote(KEY_PATH),
            days = CERT_DAYS,
            bits = CERT_BITS,
        );
        self.run_step("provision certificate", &script).await
    }

    /// Write the rendered configuration keyed by app name, so multiple
    /// applications coexist without collision.
    async fn write_config(&self) -> Result<()> {
        let rendered = render_proxy_config(&self.inputs);
        debug_assert!(!rendered.contains(HEREDOC_TAG));
        let script = format!(
            "mkdir -p {avail} && cat > {path} <<'{tag}'\n{rendered}{tag}\n",
            avail = SITES_AVAILABLE,
            path = shell_quote(&self.config_path()),
            tag = HEREDOC_TAG,
        );
        self.run_step("write proxy config", &script).await
    }

    /// Link into the active set and drop the distribution default site.
    async fn activate(&self) -> Result<()> {
        let script = format!(
            "mkdir -p {enabled} && ln -sf {path} {link} && rm -f {enabled}/default",
            enabled = SITES_ENABLED,
            path = shell_quote(&self.config_path()),
            link = shell_quote(&self.enabled_path()),
        );
        self.run_step("activate proxy config", &script).await
    }

    /// Syntax check gates the reload: a failed check leaves the running
    /// proxy untouched. Reload, not restart, so other sites stay up.
    async fn validate_and_reload(&self) -> Result<()> {
        let check = RemoteCommand::new("nginx -t", STEP_TIMEOUT);
        let output = self.executor.run(&check).await?;
        if !output.success() {
            return Err(Error::ProxyConfig(format!(
                "nginx syntax check failed: {}",
                excerpt(&output.combined(), EXCERPT_LINES)
            )));
        }

        self.run_step("reload proxy", "systemctl reload nginx").await
    }

    fn config_path(&self) -> String {
        format!("{SITES_AVAILABLE}/{}.conf", self.inputs.app)
    }

    fn enabled_path(&self) -> String {
        format!("{SITES_ENABLED}/{}.conf", self.inputs.app)
    }

    async fn run_step(&self, what: &str, script: &str) -> Result<()> {
        tracing::debug!("{what}");
        let command = RemoteCommand::new(script, STEP_TIMEOUT);
        let output = self.executor.run(&command).await?;
        if !output.success() {
            return Err(Error::ProxyConfig(format!(
                "{what} failed: {}",
                excerpt(&output.combined(), EXCERPT_LINES)
            )));
        }
        Ok(())
    }
}
