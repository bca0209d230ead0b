use chrono::{DateTime, Utc};
use x509_parser::prelude::*;

use super::types::CertificateInfo;
use crate::error::{Result, SiteCertError};

/// Parse the leaf certificate captured during the handshake.
pub fn parse_certificate_der(der: &[u8], now: DateTime<Utc>) -> Result<CertificateInfo> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| SiteCertError::CertificateParse(e.to_string()))?;

    let validity = cert.validity();
    let valid_from = asn1_to_utc(&validity.not_before)?;
    let valid_until = asn1_to_utc(&validity.not_after)?;

    let mut dns_names = Vec::new();
    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            if let GeneralName::DNSName(dns) = name {
                dns_names.push(dns.to_string());
            }
        }
    }

    Ok(CertificateInfo {
        subject: display_name(cert.subject()),
        issuer: display_name(cert.issuer()),
        valid_from,
        valid_until,
        days_until_expiry: (valid_until - now).num_days(),
        dns_names,
    })
}

fn asn1_to_utc(time: &ASN1Time) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(time.timestamp(), 0).ok_or_else(|| {
        SiteCertError::CertificateParse(format!("validity date out of range: {}", time))
    })
}

/// Common name when present, otherwise the full distinguished name.
fn display_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| name.to_string())
}
