// src/certificate/mod.rs

//! Product identity certificates
//!
//! A product certificate is an X.509 certificate whose custom extensions
//! describe one or more products. Each product occupies a branch of the
//! `1.3.6.1.4.1.2312.9.1` namespace:
//!
//! - `<ns>.<id>.1` - product name
//! - `<ns>.<id>.2` - product version
//! - `<ns>.<id>.3` - architecture(s)
//! - `<ns>.<id>.4` - comma separated provided tags
//!
//! Only the decoding side lives here; signatures are never verified.

pub mod directory;

pub use directory::{ProductDirectory, ProductStore};

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use x509_cert::Certificate;
use x509_cert::der::Decode;
use x509_cert::der::asn1::Utf8StringRef;
use x509_cert::ext::Extension;

/// OID namespace holding product extensions
pub const PRODUCT_NAMESPACE: &str = "1.3.6.1.4.1.2312.9.1";

/// Product name of the legacy RHEL 5 Workstation line
pub const WORKSTATION_NAME: &str = "Red Hat Enterprise Linux Workstation";
/// Tag provided by the legacy RHEL 5 Workstation line
pub const WORKSTATION_TAG: &str = "rhel-5-client-workstation";
/// Product name of the legacy RHEL 5 Desktop line
pub const DESKTOP_NAME: &str = "Red Hat Enterprise Linux Desktop";
/// Tag provided by the legacy RHEL 5 Desktop line
pub const DESKTOP_TAG: &str = "rhel-5-client";
/// Major version both legacy lines share
pub const LEGACY_MAJOR_VERSION: &str = "5";

const FIELD_NAME: &str = "1";
const FIELD_VERSION: &str = "2";
const FIELD_ARCH: &str = "3";
const FIELD_PROVIDES: &str = "4";

/// A single product described by a certificate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub version: String,
    pub architecture: Option<String>,
    pub provided_tags: Vec<String>,
}

impl Product {
    /// First component of the dotted version ("5" for "5.8")
    pub fn major_version(&self) -> &str {
        self.version.split('.').next().unwrap_or_default()
    }

    /// Check whether the product provides the given tag
    pub fn provides(&self, tag: &str) -> bool {
        self.provided_tags.iter().any(|t| t == tag)
    }

    /// Classify the product against the legacy variants
    pub fn variant(&self) -> ProductVariant {
        ProductVariant::classify(self)
    }
}

/// Legacy product lines that must never be installed side by side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductVariant {
    /// RHEL 5 Workstation, supersedes Desktop
    Workstation,
    /// RHEL 5 Desktop
    Desktop,
    /// Anything else
    Other,
}

impl ProductVariant {
    /// Classify a product by exact name, provided tag and major version
    pub fn classify(product: &Product) -> Self {
        if product.major_version() != LEGACY_MAJOR_VERSION {
            return Self::Other;
        }
        if product.name == WORKSTATION_NAME && product.provides(WORKSTATION_TAG) {
            Self::Workstation
        } else if product.name == DESKTOP_NAME && product.provides(DESKTOP_TAG) {
            Self::Desktop
        } else {
            Self::Other
        }
    }
}

/// A decoded product certificate
///
/// The decoded PEM text is kept so the certificate can be written back
/// byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductCertificate {
    products: Vec<Product>,
    pem: String,
    path: Option<PathBuf>,
}

impl ProductCertificate {
    /// Decode a PEM encoded product certificate
    pub fn from_pem(text: &str) -> Result<Self> {
        let blocks = pem::parse_many(text)
            .map_err(|e| Error::CertificateError(format!("Invalid PEM data: {}", e)))?;
        let block = blocks
            .iter()
            .find(|b| b.tag() == "CERTIFICATE")
            .ok_or_else(|| Error::CertificateError("No CERTIFICATE block found".to_string()))?;

        let cert = Certificate::from_der(block.contents())
            .map_err(|e| Error::CertificateError(format!("Invalid X.509 certificate: {}", e)))?;

        let extensions = cert.tbs_certificate.extensions.as_deref().unwrap_or(&[]);
        let products = products_from_extensions(extensions);
        if products.is_empty() {
            return Err(Error::CertificateError(
                "Certificate carries no product extensions".to_string(),
            ));
        }

        Ok(Self {
            products,
            pem: text.to_string(),
            path: None,
        })
    }

    /// Read and decode a certificate file, remembering where it came from
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cert = Self::from_pem(&text).map_err(|e| match e {
            Error::CertificateError(msg) => {
                Error::CertificateError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        Ok(cert.with_path(path))
    }

    /// The product this certificate is reconciled by (the first one)
    pub fn product(&self) -> &Product {
        &self.products[0]
    }

    /// All products described by the certificate
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Identifier of the primary product
    pub fn product_id(&self) -> &str {
        &self.product().id
    }

    /// Raw PEM text
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Backing file, once persisted
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Copy of this certificate bound to a backing file
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Collect products from certificate extensions, in extension order
fn products_from_extensions(extensions: &[Extension]) -> Vec<Product> {
    let mut products: Vec<Product> = Vec::new();

    for ext in extensions {
        let oid = ext.extn_id.to_string();
        let Some((id, field)) = product_field(&oid) else {
            continue;
        };

        let idx = match products.iter().position(|p| p.id == id) {
            Some(idx) => idx,
            None => {
                products.push(Product {
                    id: id.to_string(),
                    ..Default::default()
                });
                products.len() - 1
            }
        };
        let product = &mut products[idx];
        let value = extension_text(ext.extn_value.as_bytes());

        match field {
            FIELD_NAME => product.name = value,
            FIELD_VERSION => product.version = value,
            FIELD_ARCH => product.architecture = Some(value),
            FIELD_PROVIDES => {
                product.provided_tags = value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }

    products
}

/// Split a product extension OID into (product id, field number)
fn product_field(oid: &str) -> Option<(&str, &str)> {
    let rest = oid.strip_prefix(PRODUCT_NAMESPACE)?.strip_prefix('.')?;
    let (id, field) = rest.split_once('.')?;
    if id.is_empty() || field.contains('.') {
        return None;
    }
    Some((id, field))
}

/// Extension values are DER UTF8Strings; older certificates carry raw text
fn extension_text(value: &[u8]) -> String {
    match Utf8StringRef::from_der(value) {
        Ok(s) => s.to_string(),
        Err(_) => String::from_utf8_lossy(value).into_owned(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures;
