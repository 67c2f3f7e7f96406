//! SAML service-provider integration.
//!
//! The provider is configured once at startup from the IdP's metadata
//! document and then answers two questions: where to send the browser
//! to authenticate (redirect binding, deflated+base64 AuthnRequest),
//! and which employee a posted `SAMLResponse` asserts. Assertions are
//! validated (status, time window, audience) before anything in them
//! is trusted.

use std::io::Write;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use flate2::Compression;
use flate2::write::DeflateEncoder;
use samael::metadata::EntityDescriptor;
use thiserror::Error;

/// SAML status URI for a successful authentication.
const STATUS_SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

/// Attribute carrying the employee identifier users are matched by.
const EMPLOYEE_NUMBER_ATTRIBUTE: &str = "employeeNumber";

/// Timeout for the one-time metadata fetch.
const METADATA_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SamlError {
    #[error("error fetching IdP metadata: {0}")]
    MetadataFetch(String),

    #[error("error parsing IdP metadata: {0}")]
    MetadataParse(String),

    #[error("IdP metadata is missing {0}")]
    MetadataIncomplete(&'static str),

    #[error("error building authentication request: {0}")]
    AuthnRequest(String),

    #[error("no SAMLResponse form value provided")]
    MissingResponse,

    #[error("invalid SAML response: {0}")]
    InvalidResponse(String),

    #[error("SAML authentication failed: {0}")]
    AuthnFailed(String),

    #[error("SAML assertion is outside its validity window")]
    InvalidTime,

    #[error("SAML assertion audience does not include this service")]
    NotInAudience,

    #[error("SAML assertion has no attribute statement")]
    NoAttributeStatement,
}

/// The configured identity provider, built from its metadata document.
#[derive(Debug)]
pub struct SamlProvider {
    entity_id: String,
    acs_url: String,
    /// Expected assertion audience; same as the SP entity id.
    audience: String,
    sso_url: String,
    slo_url: Option<String>,
    idp_issuer: String,
    /// Base64 DER signing certificates from the metadata KeyDescriptors.
    idp_certificates: Vec<String>,
}

impl SamlProvider {
    /// Fetches the IdP metadata and builds a provider from it.
    pub async fn from_idp_metadata(
        entity_id: &str,
        acs_url: &str,
        metadata_url: &str,
    ) -> Result<Self, SamlError> {
        let client = reqwest::Client::builder()
            .timeout(METADATA_FETCH_TIMEOUT)
            .build()
            .map_err(|e| SamlError::MetadataFetch(e.to_string()))?;

        let response = client
            .get(metadata_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SamlError::MetadataFetch(e.to_string()))?;
        let xml = response
            .text()
            .await
            .map_err(|e| SamlError::MetadataFetch(e.to_string()))?;

        Self::from_metadata_xml(entity_id, acs_url, &xml)
    }

    /// Builds a provider from an already-fetched metadata document.
    ///
    /// Fails when the document has no IdP SSO descriptor, no
    /// single-sign-on endpoint, or no signing certificate.
    pub fn from_metadata_xml(
        entity_id: &str,
        acs_url: &str,
        xml: &str,
    ) -> Result<Self, SamlError> {
        let metadata: EntityDescriptor =
            samael::metadata::de::from_str(xml).map_err(|e| SamlError::MetadataParse(e.to_string()))?;

        let idp = metadata
            .idp_sso_descriptors
            .as_ref()
            .and_then(|descriptors| descriptors.first())
            .ok_or(SamlError::MetadataIncomplete("an IdP SSO descriptor"))?;

        let sso_url = idp
            .single_sign_on_services
            .first()
            .map(|endpoint| endpoint.location.clone())
            .ok_or(SamlError::MetadataIncomplete("a single-sign-on endpoint"))?;

        let slo_url = idp
            .single_logout_services
            .first()
            .map(|endpoint| endpoint.location.clone());

        let idp_certificates: Vec<String> = idp
            .key_descriptors
            .iter()
            .filter_map(|descriptor| descriptor.key_info.x509_data.as_ref())
            .flat_map(|data| data.certificates.iter().cloned())
            .collect();
        if idp_certificates.is_empty() {
            return Err(SamlError::MetadataIncomplete("a signing certificate"));
        }

        Ok(Self {
            entity_id: entity_id.to_string(),
            acs_url: acs_url.to_string(),
            audience: entity_id.to_string(),
            sso_url,
            slo_url,
            idp_issuer: metadata.entity_id.clone().unwrap_or_default(),
            idp_certificates,
        })
    }

    /// The IdP's single-logout endpoint, when it advertises one.
    pub fn slo_url(&self) -> Option<&str> {
        self.slo_url.as_deref()
    }

    pub fn idp_issuer(&self) -> &str {
        &self.idp_issuer
    }

    pub fn idp_certificates(&self) -> &[String] {
        &self.idp_certificates
    }

    /// Builds the IdP redirect URL carrying a fresh AuthnRequest
    /// (redirect binding: deflate, base64, urlencode).
    pub fn build_auth_url(&self, relay_state: &str) -> Result<String, SamlError> {
        let request_id = format!("_id{}", uuid::Uuid::new_v4());
        let issue_instant = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let authn_request = format!(
            r#"<samlp:AuthnRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
                xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
                ID="{}"
                Version="2.0"
                IssueInstant="{}"
                Destination="{}"
                ProtocolBinding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST"
                AssertionConsumerServiceURL="{}">
                <saml:Issuer>{}</saml:Issuer>
            </samlp:AuthnRequest>"#,
            request_id, issue_instant, self.sso_url, self.acs_url, self.entity_id
        );

        let encoded = deflate_and_encode(&authn_request)?;

        let separator = if self.sso_url.contains('?') { '&' } else { '?' };
        let mut url = format!(
            "{}{}SAMLRequest={}",
            self.sso_url,
            separator,
            urlencoding::encode(&encoded)
        );
        if !relay_state.is_empty() {
            url.push_str(&format!("&RelayState={}", urlencoding::encode(relay_state)));
        }
        Ok(url)
    }

    /// Validates a posted `SAMLResponse` and returns the employee id it
    /// asserts. The id may be empty when the IdP omits the attribute;
    /// callers treat that like any other unknown employee.
    pub fn employee_id_from_response(
        &self,
        saml_response: Option<&str>,
    ) -> Result<String, SamlError> {
        let encoded = saml_response
            .filter(|value| !value.is_empty())
            .ok_or(SamlError::MissingResponse)?;

        let xml = BASE64
            .decode(encoded)
            .map_err(|e| SamlError::InvalidResponse(e.to_string()))
            .and_then(|bytes| {
                String::from_utf8(bytes).map_err(|e| SamlError::InvalidResponse(e.to_string()))
            })?;

        let response = xml
            .parse::<samael::schema::Response>()
            .map_err(|e| SamlError::InvalidResponse(e.to_string()))?;

        if let Some(ref status) = response.status {
            let status_value = status.status_code.value.as_deref();
            if status_value != Some(STATUS_SUCCESS) {
                let message = status
                    .status_message
                    .as_ref()
                    .and_then(|m| m.value.clone())
                    .unwrap_or_else(|| "unknown error".to_string());
                return Err(SamlError::AuthnFailed(message));
            }
        }

        let assertion = response
            .assertion
            .as_ref()
            .ok_or_else(|| SamlError::InvalidResponse("response contains no assertion".into()))?;

        let now = Utc::now();
        if let Some(ref conditions) = assertion.conditions {
            if let Some(not_before) = conditions.not_before {
                if now < not_before {
                    return Err(SamlError::InvalidTime);
                }
            }
            if let Some(not_on_or_after) = conditions.not_on_or_after {
                if now >= not_on_or_after {
                    return Err(SamlError::InvalidTime);
                }
            }
            if let Some(ref restrictions) = conditions.audience_restrictions {
                let permitted = restrictions
                    .iter()
                    .flat_map(|restriction| restriction.audience.iter())
                    .map(|audience| audience.as_str())
                    .any(|value| value == self.audience);
                if !permitted {
                    return Err(SamlError::NotInAudience);
                }
            }
        }

        let statements = assertion
            .attribute_statements
            .as_ref()
            .filter(|statements| !statements.is_empty())
            .ok_or(SamlError::NoAttributeStatement)?;

        let employee_id = statements
            .iter()
            .flat_map(|statement| statement.attributes.iter())
            .filter(|attribute| attribute.name.as_deref() == Some(EMPLOYEE_NUMBER_ATTRIBUTE))
            .flat_map(|attribute| attribute.values.iter())
            .filter_map(|value| value.value.clone())
            .next()
            .unwrap_or_default();

        Ok(employee_id)
    }

    /// Builds a provider directly from its parts, bypassing metadata.
    #[cfg(test)]
    pub(crate) fn from_parts(entity_id: &str, acs_url: &str, sso_url: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            acs_url: acs_url.to_string(),
            audience: entity_id.to_string(),
            sso_url: sso_url.to_string(),
            slo_url: None,
            idp_issuer: "https://idp.example.org".to_string(),
            idp_certificates: Vec::new(),
        }
    }
}

fn deflate_and_encode(xml: &str) -> Result<String, SamlError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(xml.as_bytes())
        .map_err(|e| SamlError::AuthnRequest(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| SamlError::AuthnRequest(e.to_string()))?;
    Ok(BASE64.encode(compressed))
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA_XML: &str = r#"<?xml version="1.0"?>
<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata"
    xmlns:ds="http://www.w3.org/2000/09/xmldsig#"
    entityID="https://idp.example.org/saml">
  <md:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
    <md:KeyDescriptor use="signing">
      <ds:KeyInfo>
        <ds:X509Data>
          <ds:X509Certificate>MIIBfakecertdata</ds:X509Certificate>
        </ds:X509Data>
      </ds:KeyInfo>
    </md:KeyDescriptor>
    <md:SingleLogoutService
        Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect"
        Location="https://idp.example.org/saml/slo"/>
    <md:SingleSignOnService
        Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect"
        Location="https://idp.example.org/saml/sso"/>
  </md:IDPSSODescriptor>
</md:EntityDescriptor>"#;

    const METADATA_XML_NO_CERT: &str = r#"<?xml version="1.0"?>
<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata"
    entityID="https://idp.example.org/saml">
  <md:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
    <md:SingleSignOnService
        Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect"
        Location="https://idp.example.org/saml/sso"/>
  </md:IDPSSODescriptor>
</md:EntityDescriptor>"#;

    fn provider() -> SamlProvider {
        SamlProvider::from_metadata_xml(
            "http://localhost:8100",
            "http://localhost:8100/auth/callback",
            METADATA_XML,
        )
        .unwrap()
    }

    #[test]
    fn parses_metadata() {
        let provider = provider();
        assert_eq!("https://idp.example.org/saml", provider.idp_issuer());
        assert_eq!("https://idp.example.org/saml/sso", provider.sso_url);
        assert_eq!(Some("https://idp.example.org/saml/slo"), provider.slo_url());
        assert_eq!(1, provider.idp_certificates().len());
    }

    #[test]
    fn rejects_metadata_without_certificate() {
        let err = SamlProvider::from_metadata_xml(
            "http://localhost:8100",
            "http://localhost:8100/auth/callback",
            METADATA_XML_NO_CERT,
        )
        .unwrap_err();
        assert!(matches!(err, SamlError::MetadataIncomplete(_)));
    }

    #[test]
    fn rejects_garbage_metadata() {
        let err = SamlProvider::from_metadata_xml("a", "b", "not xml at all").unwrap_err();
        assert!(matches!(err, SamlError::MetadataParse(_)));
    }

    #[test]
    fn auth_url_carries_request_and_relay_state() {
        let provider = provider();

        let url = provider.build_auth_url("").unwrap();
        assert!(url.starts_with("https://idp.example.org/saml/sso?SAMLRequest="));
        assert!(!url.contains("RelayState"));

        let url = provider.build_auth_url("/return/here").unwrap();
        assert!(url.contains("&RelayState=%2Freturn%2Fhere"));
    }

    #[test]
    fn auth_urls_are_unique_per_request() {
        let provider = provider();
        assert_ne!(
            provider.build_auth_url("").unwrap(),
            provider.build_auth_url("").unwrap()
        );
    }

    #[test]
    fn missing_response_is_rejected() {
        let provider = provider();
        assert!(matches!(
            provider.employee_id_from_response(None),
            Err(SamlError::MissingResponse)
        ));
        assert!(matches!(
            provider.employee_id_from_response(Some("")),
            Err(SamlError::MissingResponse)
        ));
    }

    #[test]
    fn undecodable_response_is_rejected() {
        let provider = provider();
        assert!(matches!(
            provider.employee_id_from_response(Some("@@not-base64@@")),
            Err(SamlError::InvalidResponse(_))
        ));

        let not_xml = BASE64.encode("this is not xml");
        assert!(matches!(
            provider.employee_id_from_response(Some(&not_xml)),
            Err(SamlError::InvalidResponse(_))
        ));
    }
}
