// src/certificate/fixtures.rs

//! Self-signed product certificates for tests
//!
//! Shared by the unit tests and the integration tests under `tests/`, so
//! this file only depends on `rcgen`.

const NAMESPACE_ARCS: [u64; 9] = [1, 3, 6, 1, 4, 1, 2312, 9, 1];

/// One product described by a generated certificate
pub struct ProductFields<'a> {
    pub id: u64,
    pub name: &'a str,
    pub version: &'a str,
    pub tags: &'a [&'a str],
}

fn utf8_der(value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let mut out = vec![0x0c];
    if bytes.len() < 0x80 {
        out.push(bytes.len() as u8);
    } else {
        out.push(0x81);
        out.push(bytes.len() as u8);
    }
    out.extend_from_slice(bytes);
    out
}

/// Certificate carrying every given product, in order
pub fn products_pem(products: &[ProductFields<'_>]) -> String {
    let mut params = rcgen::CertificateParams::default();
    for product in products {
        let provides = product.tags.join(",");
        let fields = [
            (1, product.name),
            (2, product.version),
            (3, "x86_64"),
            (4, provides.as_str()),
        ];
        for (field, value) in fields {
            let mut oid = NAMESPACE_ARCS.to_vec();
            oid.push(product.id);
            oid.push(field);
            params
                .custom_extensions
                .push(rcgen::CustomExtension::from_oid_content(&oid, utf8_der(value)));
        }
    }
    let key = rcgen::KeyPair::generate().unwrap();
    params.self_signed(&key).unwrap().pem()
}

pub fn product_pem(id: u64, name: &str, version: &str, tags: &[&str]) -> String {
    products_pem(&[ProductFields {
        id,
        name,
        version,
        tags,
    }])
}
