use crate::NodeOptions;
use crate::SecurityConfig;
use crate::TlsMaterial;

#[test]
fn test_options_from_security_carry_tls_material() {
    let security = SecurityConfig {
        auth_enabled: true,
        enable_tls: true,
        cluster_key_file: Some("tests/libs/key1".to_string()),
        ..Default::default()
    };
    let options = NodeOptions::from_security(&security);
    assert!(options.auth_enabled);
    let tls = options.tls.expect("tls material expected");
    assert_eq!(security.server_certificate_path, tls.server_certificate_path);
    assert_eq!(Some("tests/libs/key1".to_string()), options.cluster_key_file);
}

#[test]
fn test_options_without_tls_have_no_material() {
    let options = NodeOptions::from_security(&SecurityConfig::default());
    assert!(options.tls.is_none());
    assert!(!options.auth_enabled);
}

#[test]
fn test_validate_rejects_empty_cert_paths() {
    let options = NodeOptions {
        tls: Some(TlsMaterial {
            server_certificate_path: String::new(),
            certificate_authority_root_path: "ca.pem".to_string(),
        }),
        ..Default::default()
    };
    assert!(options.validate().is_err());
}

#[test]
fn test_validate_rejects_empty_key_file() {
    let options = NodeOptions {
        cluster_key_file: Some(String::new()),
        ..Default::default()
    };
    assert!(options.validate().is_err());
}
