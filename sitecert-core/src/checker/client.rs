use std::error::Error as _;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::tls::TlsInfo;
use reqwest::Url;
use tracing::{debug, instrument, warn};

use super::policy::{classify, ChainVerdict, PolicyError};
use super::types::{CheckReport, CheckResult, RunEvent, RunSummary};
use super::x509::parse_certificate_der;
use crate::error::{error_chain, SiteCertError};
use crate::target::CheckTarget;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_EXPIRY_HORIZON_DAYS: i64 = 7;

/// Fragments of platform TLS errors that mean the peer certificate was refused
const VERIFICATION_MARKERS: &[&str] = &[
    "certificate",
    "verify failed",
    "self signed",
    "self-signed",
    "not trusted",
    "unknown ca",
];

/// What a completed HTTPS request exposed
#[derive(Debug)]
struct Exchange {
    http_status: u16,
    peer_certificate: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verification {
    /// Platform chain and hostname verification
    Platform,
    /// Accept whatever the peer presents so it can be inspected
    AcceptAny,
}

/// Checks the TLS certificate presented by websites
#[derive(Debug, Clone)]
pub struct CertificateChecker {
    timeout: Duration,
    expiry_horizon: chrono::Duration,
    user_agent: String,
}

impl Default for CertificateChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl CertificateChecker {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            expiry_horizon: chrono::Duration::days(DEFAULT_EXPIRY_HORIZON_DAYS),
            user_agent: format!("sitecert/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set the timeout for connecting and for the whole request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Certificates expiring within this window are reported as expiring soon
    pub fn with_expiry_horizon(mut self, horizon: chrono::Duration) -> Self {
        self.expiry_horizon = horizon;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn expiry_horizon(&self) -> chrono::Duration {
        self.expiry_horizon
    }

    /// Check a single target. Never fails: every problem ends up classified
    /// in the returned report.
    #[instrument(skip(self), fields(target = %target))]
    pub async fn check(&self, target: &CheckTarget) -> CheckReport {
        let started = Instant::now();
        let checked_at = Utc::now();

        let url = match target.to_url() {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Target rejected");
                return CheckReport::connection_error(
                    target.clone(),
                    None,
                    e.to_string(),
                    checked_at,
                );
            }
        };
        let host = target.host_hint();

        let transport_failure = |error: String| {
            warn!(error = %error, "Connection failed");
            let mut report = CheckReport::connection_error(
                target.clone(),
                Some(url.to_string()),
                error,
                checked_at,
            );
            report.duration_ms = started.elapsed().as_millis() as u64;
            report
        };

        let (exchange, verdict_source) = match self.fetch(&url, Verification::Platform).await {
            Ok(exchange) => (exchange, None),
            Err(strict_err) if strict_err.is_timeout() => {
                return transport_failure(
                    SiteCertError::Timeout(error_chain(&strict_err)).to_string(),
                );
            }
            Err(strict_err) if !is_verification_failure(&strict_err) => {
                return transport_failure(error_chain(&strict_err));
            }
            Err(strict_err) => {
                let strict_message = error_chain(&strict_err);
                debug!(
                    error = %strict_message,
                    "Verified request failed, retrying without verification"
                );

                match self.fetch(&url, Verification::AcceptAny).await {
                    Ok(exchange) => (exchange, Some(strict_message)),
                    // The handshake cannot complete even when accepting any
                    // certificate, so this is not a certificate problem.
                    Err(e) => return transport_failure(error_chain(&e)),
                }
            }
        };

        let certificate = exchange
            .peer_certificate
            .as_deref()
            .and_then(|der| match parse_certificate_der(der, checked_at) {
                Ok(info) => Some(info),
                Err(e) => {
                    warn!(error = %e, "Could not parse peer certificate");
                    None
                }
            });

        let verdict = match (&verdict_source, &certificate) {
            (Some(message), cert) => {
                ChainVerdict::rejected(message, cert.as_ref(), host.as_deref(), checked_at)
            }
            (None, Some(_)) => ChainVerdict::trusted(),
            (None, None) => ChainVerdict::with_errors(vec![PolicyError::MissingCertificate]),
        };

        let result = match &certificate {
            Some(cert) => classify(&verdict, cert, checked_at, self.expiry_horizon),
            None => CheckResult::Invalid,
        };

        debug!(result = %result, http_status = exchange.http_status, "Check complete");

        CheckReport {
            target: target.clone(),
            url: Some(url.to_string()),
            result,
            certificate,
            policy_errors: verdict.into_errors(),
            http_status: Some(exchange.http_status),
            error: None,
            checked_at,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Check every target in order, one at a time.
    pub async fn run(&self, targets: &[CheckTarget]) -> RunSummary {
        self.run_with(targets, |_| {}).await
    }

    /// Like [`run`](Self::run), reporting progress before and after each check.
    pub async fn run_with<F>(&self, targets: &[CheckTarget], mut on_event: F) -> RunSummary
    where
        F: FnMut(RunEvent<'_>),
    {
        let total = targets.len();
        let mut summary = RunSummary::new(Utc::now());

        debug!(total = total, "Starting run");

        for (index, target) in targets.iter().enumerate() {
            on_event(RunEvent::Checking {
                index,
                total,
                target,
            });

            let report = self.check(target).await;

            on_event(RunEvent::Checked {
                index,
                total,
                report: &report,
            });
            summary.record(report);
        }

        summary.finish(Utc::now());
        debug!(
            total = summary.total(),
            failures = summary.failures(),
            "Run finished"
        );
        summary
    }

    /// Issue one GET and capture the status code and the peer certificate.
    /// The client, and with it the connection, is dropped on return.
    async fn fetch(
        &self,
        url: &Url,
        verification: Verification,
    ) -> std::result::Result<Exchange, reqwest::Error> {
        let client = self.build_client(verification)?;

        let response = client
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let peer_certificate = response
            .extensions()
            .get::<TlsInfo>()
            .and_then(|info| info.peer_certificate())
            .map(<[u8]>::to_vec);

        Ok(Exchange {
            http_status: response.status().as_u16(),
            peer_certificate,
        })
    }

    fn build_client(
        &self,
        verification: Verification,
    ) -> std::result::Result<reqwest::Client, reqwest::Error> {
        let accept_any = verification == Verification::AcceptAny;

        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(0)
            .tls_info(true)
            .danger_accept_invalid_certs(accept_any)
            .danger_accept_invalid_hostnames(accept_any)
            .build()
    }
}

/// Whether a failed verified request was refused at certificate
/// verification rather than failing in transport.
fn is_verification_failure(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(cause) = source {
        if let Some(tls) = cause.downcast_ref::<native_tls::Error>() {
            return mentions_verification(&error_chain(tls));
        }
        source = cause.source();
    }

    // The top-level message carries the URL, so only the causes are searched
    err.source()
        .map(|cause| mentions_verification(&error_chain(cause)))
        .unwrap_or(false)
}

fn mentions_verification(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    VERIFICATION_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use rcgen::{CertificateParams, KeyPair};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// PEM material a loopback server presents
    struct ServerCert {
        cert_pem: String,
        key_pem: String,
    }

    fn leaf_params(not_after: (i32, u8, u8)) -> CertificateParams {
        let mut params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        params.not_before = rcgen::date_time_ymd(2020, 1, 1);
        params.not_after = rcgen::date_time_ymd(not_after.0, not_after.1, not_after.2);
        params
    }

    fn self_signed(not_after: (i32, u8, u8)) -> ServerCert {
        let key = KeyPair::generate().unwrap();
        let cert = leaf_params(not_after).self_signed(&key).unwrap();
        ServerCert {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
        }
    }

    /// Serve `cert` on a loopback port and answer every request with 204.
    /// With `drop_first` the first connection is closed right after the
    /// handshake, before any response.
    async fn spawn_server(cert: ServerCert, drop_first: bool) -> u16 {
        let identity =
            native_tls::Identity::from_pkcs8(cert.cert_pem.as_bytes(), cert.key_pem.as_bytes())
                .unwrap();
        let acceptor =
            tokio_native_tls::TlsAcceptor::from(native_tls::TlsAcceptor::new(identity).unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let drop_next = Arc::new(AtomicBool::new(drop_first));

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let drop_next = drop_next.clone();
                tokio::spawn(async move {
                    // Verified clients abort the handshake here
                    let Ok(mut tls) = acceptor.accept(stream).await else {
                        return;
                    };
                    if drop_next.swap(false, Ordering::SeqCst) {
                        return;
                    }
                    let mut buf = [0u8; 2048];
                    let _ = tls.read(&mut buf).await;
                    let _ = tls
                        .write_all(b"HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n")
                        .await;
                    let _ = tls.shutdown().await;
                });
            }
        });

        port
    }

    async fn spawn_self_signed_server(not_after: (i32, u8, u8)) -> u16 {
        spawn_server(self_signed(not_after), false).await
    }

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn checker() -> CertificateChecker {
        CertificateChecker::new().with_timeout(Duration::from_secs(5))
    }

    #[test]
    fn test_checker_defaults() {
        let checker = CertificateChecker::default();
        assert_eq!(checker.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(checker.expiry_horizon(), chrono::Duration::days(7));
    }

    #[test]
    fn test_mentions_verification() {
        assert!(mentions_verification(
            "error:0A000086:SSL routines::certificate verify failed"
        ));
        assert!(mentions_verification("self signed certificate"));
        assert!(mentions_verification("Unknown CA"));

        assert!(!mentions_verification("connection closed before message completed"));
        assert!(!mentions_verification("Connection reset by peer (os error 104)"));
        assert!(!mentions_verification("Connection refused (os error 111)"));
    }

    #[tokio::test]
    async fn test_self_signed_certificate_is_invalid() {
        let port = spawn_self_signed_server((2099, 1, 1)).await;
        let target = CheckTarget::new(format!("https://localhost:{}/", port));

        let report = checker().check(&target).await;

        assert_eq!(report.result, CheckResult::Invalid);
        assert_eq!(report.http_status, Some(204));
        assert!(report.error.is_none());
        assert!(matches!(
            report.policy_errors.as_slice(),
            [PolicyError::UntrustedChain(_)]
        ));
        let cert = report.certificate.expect("certificate should be captured");
        assert_eq!(cert.dns_names, vec!["localhost"]);
    }

    #[tokio::test]
    async fn test_expired_certificate_is_invalid_and_named() {
        let port = spawn_self_signed_server((2021, 6, 1)).await;
        let target = CheckTarget::new(format!("localhost:{}", port));

        let report = checker().check(&target).await;

        assert_eq!(report.result, CheckResult::Invalid);
        assert!(report.policy_errors.contains(&PolicyError::Expired));
        assert!(report.certificate.unwrap().days_until_expiry < 0);
    }

    #[tokio::test]
    async fn test_refused_connection_is_connection_error() {
        let target = CheckTarget::new(format!("https://127.0.0.1:{}/", closed_port()));

        let report = checker().check(&target).await;

        assert_eq!(report.result, CheckResult::ConnectionError);
        assert!(report.certificate.is_none());
        assert!(report.error.is_some());
        assert!(report.url.is_some());
    }

    #[tokio::test]
    async fn test_malformed_target_is_connection_error() {
        let report = checker().check(&CheckTarget::new("http://example.com")).await;

        assert_eq!(report.result, CheckResult::ConnectionError);
        assert!(report.url.is_none());
        assert!(report.error.unwrap().contains("http"));
    }

    #[tokio::test]
    async fn test_run_over_nothing() {
        let summary = checker().run(&[]).await;
        assert_eq!(summary.total(), 0);
        assert!(!summary.has_failures());
    }

    /// Checks against a CA the platform trusts. OpenSSL reads the extra
    /// trust anchor from `SSL_CERT_FILE`; the other native-tls backends
    /// ignore it.
    #[cfg(all(unix, not(any(target_os = "macos", target_os = "ios"))))]
    mod trusted {
        use super::*;
        use std::sync::OnceLock;

        use chrono::Datelike;
        use rcgen::{BasicConstraints, DistinguishedName, DnType, IsCa, KeyUsagePurpose};

        static TEST_CA_KEY: OnceLock<String> = OnceLock::new();

        fn ca_params() -> CertificateParams {
            let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
            params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
            params.key_usages = vec![
                KeyUsagePurpose::KeyCertSign,
                KeyUsagePurpose::CrlSign,
                KeyUsagePurpose::DigitalSignature,
            ];
            let mut name = DistinguishedName::new();
            name.push(DnType::CommonName, "Sitecert Test CA");
            params.distinguished_name = name;
            params.not_before = rcgen::date_time_ymd(2020, 1, 1);
            params.not_after = rcgen::date_time_ymd(2099, 12, 31);
            params
        }

        /// The process-wide test CA. Its certificate is written out and
        /// trusted once; the issuer is rebuilt from the same key and params.
        fn test_ca() -> (rcgen::Certificate, KeyPair) {
            let key_pem = TEST_CA_KEY.get_or_init(|| {
                let key = KeyPair::generate().unwrap();
                let cert = ca_params().self_signed(&key).unwrap();
                let path = tempfile::Builder::new()
                    .suffix(".pem")
                    .tempfile()
                    .unwrap()
                    .into_temp_path()
                    .keep()
                    .unwrap();
                std::fs::write(&path, cert.pem()).unwrap();
                std::env::set_var("SSL_CERT_FILE", &path);
                key.serialize_pem()
            });

            let key = KeyPair::from_pem(key_pem).unwrap();
            let cert = ca_params().self_signed(&key).unwrap();
            (cert, key)
        }

        fn signed_by_test_ca(not_after: (i32, u8, u8)) -> ServerCert {
            let (ca_cert, ca_key) = test_ca();
            let key = KeyPair::generate().unwrap();
            let cert = leaf_params(not_after)
                .signed_by(&key, &ca_cert, &ca_key)
                .unwrap();
            ServerCert {
                cert_pem: cert.pem(),
                key_pem: key.serialize_pem(),
            }
        }

        fn days_from_now(days: i64) -> (i32, u8, u8) {
            let date = (Utc::now() + chrono::Duration::days(days)).date_naive();
            (date.year(), date.month() as u8, date.day() as u8)
        }

        #[tokio::test]
        async fn test_trusted_certificate_is_ok() {
            let port = spawn_server(signed_by_test_ca((2099, 1, 1)), false).await;
            let target = CheckTarget::new(format!("localhost:{}", port));

            let report = checker().check(&target).await;

            assert_eq!(report.result, CheckResult::Ok);
            assert!(report.policy_errors.is_empty());
            assert_eq!(report.http_status, Some(204));
            let cert = report.certificate.expect("certificate should be captured");
            assert_eq!(cert.issuer, "Sitecert Test CA");
            assert!(cert.days_until_expiry > 7);
        }

        #[tokio::test]
        async fn test_trusted_certificate_near_expiry_is_expiring_soon() {
            let port = spawn_server(signed_by_test_ca(days_from_now(3)), false).await;
            let target = CheckTarget::new(format!("localhost:{}", port));

            let report = checker().check(&target).await;

            assert_eq!(report.result, CheckResult::ExpiringSoon);
            assert!(report.policy_errors.is_empty());
            assert!(report.certificate.unwrap().days_until_expiry <= 7);
        }

        #[tokio::test]
        async fn test_dropped_connection_is_not_blamed_on_certificate() {
            let port = spawn_server(signed_by_test_ca((2099, 1, 1)), true).await;
            let target = CheckTarget::new(format!("localhost:{}", port));

            let report = checker().check(&target).await;

            assert_eq!(report.result, CheckResult::ConnectionError);
            assert!(report.policy_errors.is_empty());
            assert!(report.certificate.is_none());
            assert!(report.error.is_some());
        }

        #[tokio::test]
        async fn test_run_reports_every_target_in_order() {
            let port = spawn_server(signed_by_test_ca((2099, 1, 1)), false).await;
            let invalid_port = spawn_self_signed_server((2099, 1, 1)).await;
            let targets = vec![
                CheckTarget::new(format!("localhost:{}", port)),
                CheckTarget::new(format!("localhost:{}", invalid_port)),
                CheckTarget::new(format!("127.0.0.1:{}", closed_port())),
                CheckTarget::new(""),
            ];

            let mut events = Vec::new();
            let summary = checker()
                .run_with(&targets, |event| match event {
                    RunEvent::Checking { index, total, .. } => {
                        events.push(format!("checking {}/{}", index, total))
                    }
                    RunEvent::Checked { index, report, .. } => {
                        events.push(format!("checked {} {}", index, report.result))
                    }
                })
                .await;

            assert_eq!(summary.total(), 4);
            assert_eq!(summary.failures(), 3);
            assert!(summary.has_failures());
            let order: Vec<_> = summary.reports.iter().map(|r| r.target.clone()).collect();
            assert_eq!(order, targets);
            assert_eq!(
                events,
                vec![
                    "checking 0/4",
                    "checked 0 OK",
                    "checking 1/4",
                    "checked 1 INVALID",
                    "checking 2/4",
                    "checked 2 CONNECTION_ERROR",
                    "checking 3/4",
                    "checked 3 CONNECTION_ERROR",
                ]
            );
        }
    }
}
