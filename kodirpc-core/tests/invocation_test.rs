use kodirpc_core::client::{CallError, KodiClient};
use kodirpc_core::introspection::{INTROSPECT_METHOD, ValidationPolicy, ValidationTarget};
use kodirpc_core::transport::TransportError;
use pretty_assertions::assert_eq;
use recording_transport::RecordingTransport;
use serde_json::json;


fn setup_client(policy: ValidationPolicy) -> (KodiClient<RecordingTransport>, RecordingTransport) {
    let transport = RecordingTransport::new();
    let client = KodiClient::from_transport(transport.clone(), policy);
    (client, transport)
}

#[tokio::test]
async fn test_invoke_binds_positional_arguments() {
    let (client, transport) = setup_client(ValidationPolicy::Enforce);

    let result = client
        .invoke("Demo.Echo", vec![json!("hi")])
        .await
        .unwrap();
    assert_eq!(result, json!("hi"));

    let request = transport.last().unwrap();
    assert_eq!(request.method, "Demo.Echo");
    assert_eq!(request.params, Some(json!({"value": "hi"})));

    let sum = client
        .invoke("Demo.Add", vec![json!(2), json!(3)])
        .await
        .unwrap();
    assert_eq!(sum, json!(5));

    // Trailing parameters may be omitted.
    let partial = client.invoke("Demo.Add", vec![json!(2)]).await.unwrap();
    assert_eq!(partial, json!(2));
    assert_eq!(transport.last().unwrap().params, Some(json!({"a": 2})));
}

#[tokio::test]
async fn test_every_call_gets_a_fresh_id() {
    let (client, transport) = setup_client(ValidationPolicy::Observe);

    client.invoke("JSONRPC.Ping", vec![]).await.unwrap();
    client.invoke("JSONRPC.Ping", vec![]).await.unwrap();

    let ids: Vec<String> = transport
        .sent()
        .into_iter()
        .map(|request| request.id.expect("every request carries an id"))
        .collect();

    assert_eq!(ids.len(), 3);
    assert!(ids.iter().all(|id| id.len() == 36));
    assert_ne!(ids[1], ids[2]);
}

#[tokio::test]
async fn test_surplus_arguments_fail_before_sending() {
    let (client, transport) = setup_client(ValidationPolicy::Observe);

    let err = client
        .invoke("Demo.Echo", vec![json!("a"), json!("b")])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CallError::Arity {
            expected: 1,
            given: 2,
            ..
        }
    ));
    assert_eq!(transport.count("Demo.Echo"), 0);
}

#[tokio::test]
async fn test_unknown_method() {
    let (client, transport) = setup_client(ValidationPolicy::Observe);

    let err = client.invoke("Demo.Ghost", vec![]).await.unwrap_err();

    assert!(matches!(err, CallError::UnknownMethod(ref name) if name == "Demo.Ghost"));
    assert_eq!(transport.count("Demo.Ghost"), 0);
}

#[tokio::test]
async fn test_invalid_argument_when_enforcing() {
    let (client, transport) = setup_client(ValidationPolicy::Enforce);

    let err = client.invoke("Demo.Echo", vec![json!(1)]).await.unwrap_err();

    let CallError::Validation(err) = err else {
        panic!("Expected a validation error, got {err:?}");
    };
    assert_eq!(
        err.target,
        ValidationTarget::Argument {
            method: "Demo.Echo".to_string(),
            position: 0,
            name: "value".to_string(),
        }
    );

    // Nothing but the introspection went out.
    assert_eq!(transport.count("Demo.Echo"), 0);
    assert_eq!(transport.count(INTROSPECT_METHOD), 1);
}

#[tokio::test]
async fn test_invalid_argument_when_observing() {
    let (client, transport) = setup_client(ValidationPolicy::Observe);

    let result = client.invoke("Demo.Echo", vec![json!(1)]).await.unwrap();

    assert_eq!(result, json!(1));
    assert_eq!(transport.count("Demo.Echo"), 1);
}

#[tokio::test]
async fn test_policy_can_be_chosen_per_call() {
    let (client, _) = setup_client(ValidationPolicy::Observe);

    let err = client
        .invoke_with("Demo.Echo", vec![json!(1)], ValidationPolicy::Enforce)
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::Validation(_)));
}

#[tokio::test]
async fn test_result_validation() {
    // 1. Observing: the invalid result is returned as is
    let (client, _) = setup_client(ValidationPolicy::Observe);
    let result = client.invoke("Demo.Broken", vec![]).await.unwrap();
    assert_eq!(result, json!("not a number"));

    // 2. Enforcing: the invalid result is an error naming the method
    let (client, transport) = setup_client(ValidationPolicy::Enforce);
    let err = client.invoke("Demo.Broken", vec![]).await.unwrap_err();

    let CallError::Validation(err) = err else {
        panic!("Expected a validation error, got {err:?}");
    };
    assert_eq!(
        err.target,
        ValidationTarget::Result {
            method: "Demo.Broken".to_string()
        }
    );
    assert_eq!(transport.count("Demo.Broken"), 1);
}

#[tokio::test]
async fn test_schema_references_between_types() {
    let (client, _) = setup_client(ValidationPolicy::Enforce);

    let result = client
        .invoke("Demo.GetProperties", vec![json!(["volume", "language"])])
        .await
        .unwrap();
    assert_eq!(result, json!({"volume": 87, "language": "en_GB"}));

    let err = client
        .invoke("Demo.GetProperties", vec![json!(["colour"])])
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::Validation(_)));
}

#[tokio::test]
async fn test_remote_errors_propagate() {
    // Observing lets the bad argument through; the service rejects it.
    let (client, _) = setup_client(ValidationPolicy::Observe);

    let err = client
        .invoke("Demo.Add", vec![json!(1), json!("two")])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CallError::Transport(TransportError::Remote {
            code: mock_service::INVALID_PARAMS,
            ..
        })
    ));
}
