
use commons::dispatch;
use commons::dispatch_ok;
use commons::insert_num;
use commons::start_cluster;
use serial_test::serial;
use shardkit::AuthMechanism;
use shardkit::CommandBody;
use shardkit::ConnectionOrigin;
use shardkit::SecurityConfig;
use shardkit::UserSpec;

const SERVER_SUBJECT: &str = "C=US,ST=New York,L=New York City,O=ShardKit,OU=Kernel,CN=server";
const INTERNAL_SUBJECT: &str = "C=US,ST=New York,L=New York City,O=ShardKit,OU=Kernel,CN=internal";
const CLIENT_SUBJECT: &str = "C=US,ST=New York,L=New York City,O=ShardKit,OU=KernelUser,CN=client";

fn x509_security() -> SecurityConfig {
    SecurityConfig {
        auth_enabled: true,
        enable_tls: true,
        server_certificate_path: "certs/server.pem".into(),
        certificate_authority_root_path: "certs/ca.pem".into(),
        server_x509_subject: SERVER_SUBJECT.into(),
        ..Default::default()
    }
}

fn create_external_user(subject: &str) -> CommandBody {
    CommandBody::CreateUser {
        db: "$external".into(),
        user: UserSpec::new(subject),
    }
}

fn authenticate_x509() -> CommandBody {
    CommandBody::Authenticate {
        db: "$external".into(),
        mechanism: AuthMechanism::X509,
        user: None,
        pwd: None,
    }
}

/// Case 1: subjects matching the server identity apart from CN are reserved
/// and can never become users; an ordinary client subject can
#[tokio::test]
#[serial]
async fn test_reserved_principals_cannot_become_users() {
    let (topology, dispatcher) = start_cluster(x509_security()).await;
    let connection = dispatcher.connect(ConnectionOrigin::loopback_with_cert(CLIENT_SUBJECT));

    for reserved in [SERVER_SUBJECT, INTERNAL_SUBJECT] {
        let response = dispatch(&dispatcher, &connection, create_external_user(reserved)).await;
        assert!(!response.ok, "{} must be reserved", reserved);
        assert!(response.errmsg.as_deref().unwrap_or("").contains("reserved"));
    }

    dispatch_ok(&dispatcher, &connection, create_external_user(CLIENT_SUBJECT)).await;
    topology.stop().await;
}

/// Case 2: full client lifecycle: bootstrap via localhost exception,
/// certificate authentication, authenticated writes, logout, and the
/// audit line in the global log
#[tokio::test]
#[serial]
async fn test_x509_client_lifecycle() {
    let (topology, dispatcher) = start_cluster(x509_security()).await;
    let connection = dispatcher.connect(ConnectionOrigin::loopback_with_cert(CLIENT_SUBJECT));

    // unauthenticated writes are gated even on loopback
    let gated = dispatch(&dispatcher, &connection, insert_num("test.audit", 1)).await;
    assert!(!gated.ok);

    // the localhost exception admits the bootstrap createUser, once
    dispatch_ok(&dispatcher, &connection, create_external_user(CLIENT_SUBJECT)).await;
    let second = dispatch(
        &dispatcher,
        &connection,
        CommandBody::CreateUser {
            db: "admin".into(),
            user: UserSpec::with_password("late", "pass"),
        },
    )
    .await;
    assert!(!second.ok, "the exception is revoked by the first user creation");

    dispatch_ok(&dispatcher, &connection, authenticate_x509()).await;
    dispatch_ok(&dispatcher, &connection, insert_num("test.audit", 1)).await;

    let log = dispatch_ok(
        &dispatcher,
        &connection,
        CommandBody::GetLog {
            name: "global".into(),
        },
    )
    .await;
    let expected = format!("Successfully authenticated as principal {} on $external", CLIENT_SUBJECT);
    assert!(
        log.log_lines().unwrap_or(&[]).iter().any(|l| l.contains(&expected)),
        "global log must carry the authentication audit line"
    );

    dispatch_ok(&dispatcher, &connection, CommandBody::Logout).await;
    let gated = dispatch(&dispatcher, &connection, insert_num("test.audit", 2)).await;
    assert!(!gated.ok, "logout must close the session again");

    topology.stop().await;
}

/// Case 3: the certificate mechanism needs a certificate and a matching
/// registered principal
#[tokio::test]
#[serial]
async fn test_x509_requires_known_certificate() {
    let (topology, dispatcher) = start_cluster(x509_security()).await;

    let bootstrap = dispatcher.connect(ConnectionOrigin::loopback_with_cert(CLIENT_SUBJECT));
    dispatch_ok(&dispatcher, &bootstrap, create_external_user(CLIENT_SUBJECT)).await;

    // no certificate on the connection
    let plain = dispatcher.connect(ConnectionOrigin::remote_plain());
    let response = dispatch(&dispatcher, &plain, authenticate_x509()).await;
    assert!(!response.ok);

    // certificate subject that was never registered
    let unknown = dispatcher.connect(ConnectionOrigin::loopback_with_cert(
        "C=US,ST=New York,L=New York City,O=ShardKit,OU=KernelUser,CN=stranger",
    ));
    let response = dispatch(&dispatcher, &unknown, authenticate_x509()).await;
    assert!(!response.ok);

    // explicit user field disagreeing with the certificate
    let mismatched = dispatcher.connect(ConnectionOrigin::loopback_with_cert(CLIENT_SUBJECT));
    let response = dispatch(
        &dispatcher,
        &mismatched,
        CommandBody::Authenticate {
            db: "$external".into(),
            mechanism: AuthMechanism::X509,
            user: Some(INTERNAL_SUBJECT.into()),
            pwd: None,
        },
    )
    .await;
    assert!(!response.ok);

    topology.stop().await;
}

/// Case 4: getParameter advertises both authentication mechanisms
#[tokio::test]
#[serial]
async fn test_advertised_mechanisms() {
    let (topology, dispatcher) = start_cluster(SecurityConfig::default()).await;
    let connection = dispatcher.connect(ConnectionOrigin::loopback_plain());

    let response = dispatch_ok(
        &dispatcher,
        &connection,
        CommandBody::GetParameter {
            name: "authenticationMechanisms".into(),
        },
    )
    .await;
    match response.body {
        shardkit::ResponseBody::Parameter { value, .. } => {
            assert!(value.contains("MONGODB-X509"));
            assert!(value.contains("SCRAM-SHA-1"));
        }
        other => panic!("unexpected body {:?}", other),
    }

    topology.stop().await;
}
