//! Repository connector (§4.C): builds a transport for a repository by
//! trying factories in descending priority order, then exposes bounded
//! parallel `get`/`put` over a task list.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use aether_core::config::ConnectorConfig;
use aether_util::errors::AetherError;
use aether_util::hash::ChecksumAlgorithm;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::auth::Credentials;
use crate::checksum::{self, ChecksumCalculator, ChecksumPolicy};
use crate::file_transport::FileTransport;
use crate::http_transport::HttpTransport;
use crate::partial;
use crate::repository::RemoteRepository;
use crate::transport::{Context, Location, Transport};

/// Transport factories in descending priority; the first whose scheme
/// matches wins. File-backed schemes are tried before HTTP so that a
/// locally mirrored repository never needlessly goes over the network.
const FACTORY_PRIORITY: &[&str] = &["file", "http"];

/// Builds the transport for a repository, trying known factories in
/// order and falling through on scheme mismatch. If none apply, the
/// error enumerates every factory attempted, per §4.C.
pub fn build_transport(
    repo: &RemoteRepository,
    config: &ConnectorConfig,
    credentials: Credentials,
) -> miette::Result<Transport> {
    let mut attempted = Vec::new();

    for name in FACTORY_PRIORITY {
        attempted.push(*name);
        match *name {
            "file" => {
                if let Some(base) = repo.scheme.file_base() {
                    let strategy = repo.scheme.write_strategy();
                    return Ok(Transport::File(FileTransport::new(base).with_strategy(strategy)));
                }
            }
            "http" => {
                if repo.scheme.is_http() {
                    return Ok(Transport::Http(HttpTransport::new(&repo.url, config, credentials)?));
                }
            }
            _ => {}
        }
    }

    Err(AetherError::InvalidInput {
        message: format!(
            "no transporter for repository '{}' ({}); attempted: {}",
            repo.id,
            repo.url,
            attempted.join(", ")
        ),
    }
    .into())
}

/// One file to fetch, with the checksum sidecar values already fetched
/// from the layout (algorithm, expected hex digest).
pub struct GetTask {
    pub location: Location,
    pub destination: PathBuf,
    pub expected_checksums: Vec<(ChecksumAlgorithm, String)>,
}

/// One file to upload.
pub struct PutTask {
    pub location: Location,
    pub data: Vec<u8>,
}

/// A connector bound to one transport, ready to run bounded-parallel
/// `get`/`put` batches.
pub struct RepositoryConnector {
    transport: Arc<Transport>,
    pool_size: usize,
    checksum_policy: ChecksumPolicy,
    request_timeout: Duration,
}

impl RepositoryConnector {
    pub fn new(
        transport: Transport,
        pool_size: usize,
        checksum_policy: ChecksumPolicy,
        request_timeout: Duration,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            pool_size: pool_size.max(1),
            checksum_policy,
            request_timeout,
        }
    }

    pub async fn get(&self, tasks: Vec<GetTask>) -> Vec<miette::Result<u64>> {
        let semaphore = Arc::new(Semaphore::new(self.pool_size));
        let mut set = JoinSet::new();
        for task in tasks {
            let transport = Arc::clone(&self.transport);
            let semaphore = Arc::clone(&semaphore);
            let policy = self.checksum_policy;
            let timeout = self.request_timeout;
            set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                fetch_one(&transport, task, policy, timeout).await
            });
        }
        drain(set, "get").await
    }

    pub async fn put(&self, tasks: Vec<PutTask>) -> Vec<miette::Result<()>> {
        let semaphore = Arc::new(Semaphore::new(self.pool_size));
        let mut set = JoinSet::new();
        for task in tasks {
            let transport = Arc::clone(&self.transport);
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                transport.put(&task.location, &task.data, &Context::new()).await
            });
        }
        drain(set, "put").await
    }
}

async fn drain<T: Send + 'static>(
    mut set: JoinSet<miette::Result<T>>,
    op: &str,
) -> Vec<miette::Result<T>> {
    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        results.push(joined.unwrap_or_else(|e| {
            Err(AetherError::Generic {
                message: format!("{op} task panicked: {e}"),
            }
            .into())
        }));
    }
    results
}

async fn fetch_one(
    transport: &Transport,
    task: GetTask,
    policy: ChecksumPolicy,
    request_timeout: Duration,
) -> miette::Result<u64> {
    let cx = Context::new();
    let resumed = partial::get_resumable(transport, &task.location, &task.destination, request_timeout, &cx).await?;

    if !task.expected_checksums.is_empty() && policy != ChecksumPolicy::Ignore {
        let algorithms: Vec<ChecksumAlgorithm> =
            task.expected_checksums.iter().map(|(a, _)| *a).collect();
        let mut calc = ChecksumCalculator::new(&algorithms);
        let data = tokio::fs::read(&task.destination)
            .await
            .map_err(AetherError::Io)?;

        let offset = resumed.resumed_from.unwrap_or(0).min(data.len() as u64) as usize;
        calc.init(offset as u64);
        calc.feed_replay(&data[..offset]);
        calc.update(&data[offset..]);

        let digests = calc.get();
        for (algo, expected) in &task.expected_checksums {
            if let Some(Ok(actual)) = digests.get(algo) {
                checksum::verify(policy, *algo, expected, actual, &task.location.0)?;
            }
        }
    }

    Ok(resumed.total_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RemoteRepository;
    use aether_core::config::ConnectorConfig;
    use std::fs;

    #[test]
    fn file_scheme_builds_file_transport() {
        let repo = RemoteRepository::new("local", "file:/tmp/repo").unwrap();
        let transport = build_transport(&repo, &ConnectorConfig::default(), Credentials::default()).unwrap();
        assert!(matches!(transport, Transport::File(_)));
    }

    #[test]
    fn http_scheme_builds_http_transport() {
        let repo = RemoteRepository::central();
        let transport = build_transport(&repo, &ConnectorConfig::default(), Credentials::default()).unwrap();
        assert!(matches!(transport, Transport::Http(_)));
    }

    #[test]
    fn bundle_scheme_has_no_transporter() {
        let repo = RemoteRepository::new("archive", "bundle:/tmp/repo.bundle").unwrap();
        let err = build_transport(&repo, &ConnectorConfig::default(), Credentials::default());
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn get_batch_downloads_and_verifies_checksum() {
        let src_dir = tempfile::tempdir().unwrap();
        fs::write(src_dir.path().join("a.jar"), b"hello world").unwrap();
        let transport = Transport::File(FileTransport::new(src_dir.path()));
        let connector = RepositoryConnector::new(transport, 2, ChecksumPolicy::Fail, Duration::from_secs(2));

        let dest_dir = tempfile::tempdir().unwrap();
        let dest = dest_dir.path().join("a.jar");
        let expected = aether_util::hash::sha256_bytes(b"hello world");

        let results = connector
            .get(vec![GetTask {
                location: Location("a.jar".into()),
                destination: dest.clone(),
                expected_checksums: vec![(ChecksumAlgorithm::Sha256, expected)],
            }])
            .await;

        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
        assert_eq!(fs::read(&dest).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn get_batch_fails_on_checksum_mismatch() {
        let src_dir = tempfile::tempdir().unwrap();
        fs::write(src_dir.path().join("a.jar"), b"hello world").unwrap();
        let transport = Transport::File(FileTransport::new(src_dir.path()));
        let connector = RepositoryConnector::new(transport, 2, ChecksumPolicy::Fail, Duration::from_secs(2));

        let dest_dir = tempfile::tempdir().unwrap();
        let results = connector
            .get(vec![GetTask {
                location: Location("a.jar".into()),
                destination: dest_dir.path().join("a.jar"),
                expected_checksums: vec![(ChecksumAlgorithm::Sha256, "deadbeef".to_string())],
            }])
            .await;

        assert!(results[0].is_err());
    }
}
