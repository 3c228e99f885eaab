use crate::{
    Client, ClientBuilder, ClientConfig, Error, FailureReason, RandomSource, Rejection,
    SubmissionOutcome, Transport,
    task_config::{AggregatorEndpoint, TaskConfig},
};
use assert_matches::assert_matches;
use async_trait::async_trait;
use divviup_core::{
    DapVersion,
    hpke::{self, HpkeApplicationInfo, HpkeKeypair, Label},
    retries::{RetryConfig, test_util::test_retry_config},
    test_util::{dummy_vdaf, install_test_trace_subscriber},
    time::{Clock, MockClock},
    vdaf::{Measurement, VdafInstance},
};
use divviup_messages::{
    Duration, InputShareAad, MediaType, PlaintextInputShare, Report, Role, TaskId, Time,
    codec::{Decode, Encode, ParameterizedDecode},
};
use http::header::CONTENT_TYPE;
use std::{
    collections::{HashSet, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::Notify;
use url::Url;

/// A transport that replays a scripted sequence of outcomes, accepting once the script runs out,
/// and records every report it is handed.
#[derive(Debug, Default)]
struct FakeTransport {
    outcomes: Mutex<VecDeque<SubmissionOutcome>>,
    submissions: Mutex<Vec<(Url, Vec<u8>)>>,
}

impl FakeTransport {
    fn new(outcomes: impl IntoIterator<Item = SubmissionOutcome>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            submissions: Mutex::default(),
        })
    }

    fn accepting() -> Arc<Self> {
        Arc::default()
    }

    fn reports(&self) -> Vec<Report> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| Report::get_decoded_with_param(&2, body).unwrap())
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn submit(&self, upload_url: &Url, encoded_report: &[u8]) -> SubmissionOutcome {
        self.submissions
            .lock()
            .unwrap()
            .push((upload_url.clone(), encoded_report.to_vec()));
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SubmissionOutcome::Accepted)
    }
}

struct TestTask {
    leader_keypair: HpkeKeypair,
    helper_keypair: HpkeKeypair,
    task_config: TaskConfig,
}

impl TestTask {
    fn new(task_id: TaskId, vdaf: VdafInstance, endpoint: &Url) -> Self {
        let leader_keypair = HpkeKeypair::test();
        let helper_keypair = HpkeKeypair::test();
        let task_config = TaskConfig::new(
            task_id,
            Vec::from([
                AggregatorEndpoint::new(endpoint.clone(), leader_keypair.config().clone()),
                AggregatorEndpoint::new(endpoint.clone(), helper_keypair.config().clone()),
            ]),
            vdaf,
            Duration::from_seconds(60),
            DapVersion::Dap09,
        )
        .unwrap();
        Self {
            leader_keypair,
            helper_keypair,
            task_config,
        }
    }

    fn fake() -> Self {
        Self::new(
            TaskId::from([1; 32]),
            VdafInstance::Fake,
            &Url::parse("https://leader.example.com/").unwrap(),
        )
    }

    fn client(&self, transport: Arc<dyn Transport>, max_attempts: u32) -> Client<MockClock> {
        ClientBuilder::new(self.task_config.clone())
            .with_transport(transport)
            .with_retry_config(test_retry_config(max_attempts))
            .with_clock(MockClock::default())
            .build()
            .unwrap()
    }

    /// Decrypt the input shares of a report produced with the fake VDAF, and recombine them.
    fn unshard(&self, report: &Report) -> u8 {
        let aad = InputShareAad::new(
            *report.task_id(),
            report.metadata().clone(),
            report.public_share().to_vec(),
        )
        .get_encoded()
        .unwrap();

        let input_shares: Vec<u8> = [&self.leader_keypair, &self.helper_keypair]
            .into_iter()
            .zip(report.encrypted_input_shares())
            .enumerate()
            .map(|(index, (keypair, ciphertext))| {
                let plaintext = hpke::open(
                    keypair,
                    &HpkeApplicationInfo::new(
                        &DapVersion::Dap09,
                        &Label::InputShare,
                        &Role::Client,
                        &Role::for_aggregator_index(index),
                    ),
                    ciphertext,
                    &aad,
                )
                .unwrap();
                let payload = PlaintextInputShare::get_decoded(&plaintext)
                    .unwrap()
                    .into_payload();
                assert_eq!(payload.len(), 1);
                payload[0]
            })
            .collect();
        dummy_vdaf::Vdaf::new().unshard(&input_shares)
    }
}

#[tokio::test]
async fn submit_accepted() {
    install_test_trace_subscriber();
    let task = TestTask::fake();
    let transport = FakeTransport::accepting();
    let client = task.client(transport.clone(), 3);

    client.submit(Measurement::Sum(123)).await.unwrap();

    let submissions = transport.submissions.lock().unwrap().clone();
    assert_eq!(submissions.len(), 1);
    assert_eq!(
        submissions[0].0,
        task.task_config.reports_resource_uri().unwrap()
    );

    let report = &transport.reports()[0];
    assert_eq!(report.task_id(), task.task_config.task_id());
    // The mock clock's default time, rounded down to the minute.
    assert_eq!(
        report.metadata().time(),
        &Time::from_seconds_since_epoch(999_999_960)
    );
    assert_eq!(task.unshard(report), 123);
}

#[tokio::test]
async fn retry_transient_failures() {
    install_test_trace_subscriber();
    let task = TestTask::fake();
    let transport = FakeTransport::new([
        SubmissionOutcome::TransientFailure(FailureReason::Timeout),
        SubmissionOutcome::TransientFailure(FailureReason::HttpStatus(503)),
        SubmissionOutcome::Accepted,
    ]);
    let client = task.client(transport.clone(), 3);

    client.submit(Measurement::Sum(7)).await.unwrap();

    let reports = transport.reports();
    assert_eq!(reports.len(), 3);
    let report_ids: HashSet<_> = reports
        .iter()
        .map(|report| *report.metadata().id())
        .collect();
    assert_eq!(report_ids.len(), 3);
    for report in &reports {
        assert_eq!(task.unshard(report), 7);
    }
}

#[tokio::test]
async fn retries_exhausted() {
    install_test_trace_subscriber();
    let task = TestTask::fake();
    let transport = FakeTransport::new(vec![
        SubmissionOutcome::TransientFailure(FailureReason::Timeout);
        4
    ]);
    let client = task.client(transport.clone(), 3);

    let error = client.submit(Measurement::Sum(7)).await.unwrap_err();
    assert!(error.is_retryable());
    assert_matches!(
        error,
        Error::Exhausted {
            attempts: 3,
            last_failure: FailureReason::Timeout,
        }
    );
    assert_eq!(transport.reports().len(), 3);
}

#[tokio::test]
async fn rejection_not_retried() {
    install_test_trace_subscriber();
    let task = TestTask::fake();
    let transport = FakeTransport::new([SubmissionOutcome::Rejected(Rejection::new(
        "reportRejected".to_string(),
        400,
        None,
    ))]);
    let client = task.client(transport.clone(), 3);

    let error = client.submit(Measurement::Sum(7)).await.unwrap_err();
    assert!(!error.is_retryable());
    assert_matches!(error, Error::Rejected(rejection) => {
        assert_eq!(rejection.reason(), "reportRejected");
    });
    assert_eq!(transport.reports().len(), 1);
}

#[tokio::test]
async fn invalid_measurement_not_submitted() {
    install_test_trace_subscriber();
    let task = TestTask::fake();
    let transport = FakeTransport::accepting();
    let client = task.client(transport.clone(), 3);

    assert_matches!(
        client.submit(Measurement::Sum(256)).await,
        Err(Error::InvalidMeasurement(_))
    );
    assert_matches!(
        client.submit(Measurement::Histogram(0)).await,
        Err(Error::InvalidMeasurement(_))
    );
    assert!(transport.reports().is_empty());
}

#[derive(Debug)]
struct ZeroRandomSource;

impl RandomSource for ZeroRandomSource {
    fn fill_bytes(&self, dest: &mut [u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        dest.fill(0);
        Ok(())
    }
}

#[tokio::test]
async fn report_id_generation_failure() {
    install_test_trace_subscriber();
    let task = TestTask::fake();
    let transport = FakeTransport::accepting();
    let client = ClientBuilder::new(task.task_config.clone())
        .with_transport(transport.clone())
        .with_random_source(Arc::new(ZeroRandomSource))
        .build()
        .unwrap();

    assert_matches!(
        client.submit(Measurement::Sum(1)).await,
        Err(Error::IdGenerationFailed(_))
    );
    assert!(transport.reports().is_empty());
}

#[tokio::test]
async fn report_timestamps_follow_clock() {
    install_test_trace_subscriber();
    let task = TestTask::fake();
    let transport = FakeTransport::accepting();
    let clock = MockClock::new(Time::from_seconds_since_epoch(1_700_000_045));
    let client = ClientBuilder::new(task.task_config.clone())
        .with_transport(transport.clone())
        .with_clock(clock.clone())
        .build()
        .unwrap();

    client.submit(Measurement::Sum(1)).await.unwrap();
    clock.advance(&Duration::from_seconds(75));
    client.submit(Measurement::Sum(1)).await.unwrap();

    let times: Vec<_> = transport
        .reports()
        .iter()
        .map(|report| *report.metadata().time())
        .collect();
    assert_eq!(
        times,
        [
            Time::from_seconds_since_epoch(1_700_000_040),
            Time::from_seconds_since_epoch(1_700_000_100),
        ]
    );
    assert_eq!(clock.now(), Time::from_seconds_since_epoch(1_700_000_120));
}

fn unsupported_version_task_config(task_config: &TaskConfig) -> TaskConfig {
    let yaml = serde_yaml::to_string(task_config)
        .unwrap()
        .replace("dap-09", "dap-07");
    // Deserializing directly skips validation.
    serde_yaml::from_str(&yaml).unwrap()
}

#[tokio::test]
async fn unsupported_version() {
    install_test_trace_subscriber();
    let task = TestTask::fake();
    let unsupported = unsupported_version_task_config(&task.task_config);
    assert_eq!(
        unsupported.dap_version(),
        &DapVersion::Unsupported("dap-07".to_string())
    );

    assert_matches!(
        ClientBuilder::new(unsupported.clone())
            .with_transport(FakeTransport::accepting())
            .build(),
        Err(Error::UnsupportedVersion(version)) => assert_eq!(version, "dap-07")
    );

    let client = task.client(FakeTransport::accepting(), 1);
    assert_matches!(
        client.replace_task_config(unsupported).await,
        Err(Error::UnsupportedVersion(_))
    );
    assert_eq!(*client.task_config().await, task.task_config);
}

#[tokio::test]
async fn invalid_retry_config() {
    install_test_trace_subscriber();
    let task = TestTask::fake();
    assert_matches!(
        ClientBuilder::new(task.task_config.clone())
            .with_transport(FakeTransport::accepting())
            .with_retry_config(RetryConfig {
                max_attempts: 0,
                ..Default::default()
            })
            .build(),
        Err(Error::RetryConfig(_))
    );
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// A transport whose submissions never complete.
#[derive(Debug, Default)]
struct PendingTransport {
    started: Notify,
    dropped: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for PendingTransport {
    async fn submit(&self, _: &Url, _: &[u8]) -> SubmissionOutcome {
        let _guard = DropFlag(Arc::clone(&self.dropped));
        self.started.notify_one();
        std::future::pending().await
    }
}

#[tokio::test]
async fn cancellation_drops_pending_submission() {
    install_test_trace_subscriber();
    let task = TestTask::fake();
    let transport = Arc::new(PendingTransport::default());
    let client = task.client(transport.clone(), 3);

    let handle = tokio::spawn(async move { client.submit(Measurement::Sum(9)).await });
    transport.started.notified().await;
    assert!(!transport.dropped.load(Ordering::SeqCst));

    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());
    assert!(transport.dropped.load(Ordering::SeqCst));
}

/// A transport that holds each submission until it is released.
#[derive(Debug, Default)]
struct GatedTransport {
    started: Notify,
    release: Notify,
    task_ids: Mutex<Vec<TaskId>>,
}

#[async_trait]
impl Transport for GatedTransport {
    async fn submit(&self, _: &Url, encoded_report: &[u8]) -> SubmissionOutcome {
        let report = Report::get_decoded_with_param(&2, encoded_report).unwrap();
        self.task_ids.lock().unwrap().push(*report.task_id());
        self.started.notify_one();
        self.release.notified().await;
        SubmissionOutcome::Accepted
    }
}

#[tokio::test]
async fn replace_task_config_during_submission() {
    install_test_trace_subscriber();
    let task = TestTask::fake();
    let transport = Arc::new(GatedTransport::default());
    let client = task.client(transport.clone(), 1);

    let in_flight = tokio::spawn({
        let client = client.clone();
        async move { client.submit(Measurement::Sum(9)).await }
    });
    transport.started.notified().await;

    let new_task = TestTask::new(
        TaskId::from([2; 32]),
        VdafInstance::Fake,
        &Url::parse("https://other-leader.example.com/").unwrap(),
    );
    client
        .replace_task_config(new_task.task_config.clone())
        .await
        .unwrap();
    assert_eq!(*client.task_config().await, new_task.task_config);

    transport.release.notify_one();
    in_flight.await.unwrap().unwrap();

    transport.release.notify_one();
    client.submit(Measurement::Sum(9)).await.unwrap();

    assert_eq!(
        *transport.task_ids.lock().unwrap(),
        [TaskId::from([1; 32]), TaskId::from([2; 32])]
    );
}

#[tokio::test]
async fn upload_prio3() {
    install_test_trace_subscriber();
    let mut server = mockito::Server::new_async().await;
    let server_url = Url::parse(&server.url()).unwrap();

    for (index, (vdaf, measurement)) in [
        (VdafInstance::Prio3Count, Measurement::Count(true)),
        (
            VdafInstance::Prio3Sum {
                max_measurement: 4096,
            },
            Measurement::Sum(1337),
        ),
        (
            VdafInstance::Prio3SumVec {
                bits: 16,
                length: 3,
                chunk_length: 2,
            },
            Measurement::SumVec(Vec::from([1, 2, 65535])),
        ),
        (
            VdafInstance::Prio3Histogram {
                length: 12,
                chunk_length: 4,
            },
            Measurement::Histogram(5),
        ),
    ]
    .into_iter()
    .enumerate()
    {
        let task_id = TaskId::from([index as u8 + 10; 32]);
        let task = TestTask::new(task_id, vdaf, &server_url);
        let mocked_upload = server
            .mock("POST", format!("/tasks/{task_id}/reports").as_str())
            .match_header(CONTENT_TYPE.as_str(), Report::MEDIA_TYPE)
            .with_status(201)
            .expect(1)
            .create_async()
            .await;

        let client = Client::builder(task.task_config.clone())
            .with_retry_config(test_retry_config(3))
            .build()
            .unwrap();
        client.submit(measurement).await.unwrap();

        mocked_upload.assert_async().await;
    }
}

#[tokio::test]
async fn upload_problem_details() {
    install_test_trace_subscriber();
    let mut server = mockito::Server::new_async().await;
    let task = TestTask::new(
        TaskId::from([3; 32]),
        VdafInstance::Prio3Count,
        &Url::parse(&server.url()).unwrap(),
    );
    let mocked_upload = server
        .mock(
            "POST",
            format!("/tasks/{}/reports", task.task_config.task_id()).as_str(),
        )
        .match_header(CONTENT_TYPE.as_str(), Report::MEDIA_TYPE)
        .with_status(400)
        .with_header(CONTENT_TYPE.as_str(), "application/problem+json")
        .with_body(concat!(
            "{\"type\": \"urn:ietf:params:ppm:dap:error:reportTooEarly\", ",
            "\"detail\": \"Report could not be processed because it arrived too early.\"}"
        ))
        .expect(1)
        .create_async()
        .await;

    let client = Client::builder(task.task_config.clone())
        .with_retry_config(test_retry_config(3))
        .build()
        .unwrap();
    assert_matches!(
        client.submit(Measurement::Count(false)).await,
        Err(Error::Rejected(rejection)) => {
            assert_eq!(rejection.reason(), "reportTooEarly");
            assert_eq!(rejection.status(), 400);
            assert_eq!(
                rejection.detail(),
                Some("Report could not be processed because it arrived too early.")
            );
        }
    );

    mocked_upload.assert_async().await;
}

#[tokio::test]
async fn upload_http_status_exhausted() {
    install_test_trace_subscriber();
    let mut server = mockito::Server::new_async().await;
    let task = TestTask::new(
        TaskId::from([4; 32]),
        VdafInstance::Prio3Count,
        &Url::parse(&server.url()).unwrap(),
    );
    let mocked_upload = server
        .mock(
            "POST",
            format!("/tasks/{}/reports", task.task_config.task_id()).as_str(),
        )
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let client = Client::builder(task.task_config.clone())
        .with_retry_config(test_retry_config(3))
        .build()
        .unwrap();
    assert_matches!(
        client.submit(Measurement::Count(true)).await,
        Err(Error::Exhausted {
            attempts: 3,
            last_failure: FailureReason::HttpStatus(503),
        })
    );

    mocked_upload.assert_async().await;
}

#[test]
fn client_config_yaml() {
    install_test_trace_subscriber();
    let task = TestTask::new(
        TaskId::from([5; 32]),
        VdafInstance::Prio3Histogram {
            length: 4,
            chunk_length: 2,
        },
        &Url::parse("https://leader.example.com/dap").unwrap(),
    );

    let mut mapping = serde_yaml::Mapping::new();
    mapping.insert(
        "task".into(),
        serde_yaml::to_value(&task.task_config).unwrap(),
    );
    let config = ClientConfig::from_yaml(&serde_yaml::to_string(&mapping).unwrap()).unwrap();
    assert_eq!(config.task, task.task_config);
    assert_eq!(config.retry, RetryConfig::default());
    assert_eq!(config.request_timeout_secs, 30);
    Client::from_config(config).unwrap();

    let yaml = format!(
        "{}retry:\n  max_attempts: 0\n",
        serde_yaml::to_string(&mapping).unwrap()
    );
    assert_matches!(
        ClientConfig::from_yaml(&yaml),
        Err(Error::RetryConfig(_))
    );
}
