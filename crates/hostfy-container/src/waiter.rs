//! ヘルスチェック待機
//!
//! 一定間隔でコンテナの状態を確認し、healthy になるか期限に達するまでブロックする。
//! ヘルスチェックが設定されていないコンテナは、Running になってから短い待機時間を
//! 置いたうえで準備完了とみなす。

use crate::error::{ContainerError, Result};
use crate::runtime::{ContainerInfo, ContainerState, HealthState};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::debug;

/// 待機設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// ポーリング間隔
    pub interval: Duration,
    /// ヘルスチェック未設定のコンテナを準備完了とみなすまでの待機時間
    pub settle: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            settle: Duration::from_secs(3),
        }
    }
}

/// 1回のポーリング結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Healthy,
    RunningWithoutHealthcheck,
    NotReady,
}

impl Readiness {
    pub fn from_info(info: Option<&ContainerInfo>) -> Self {
        match info {
            Some(info) if info.state == ContainerState::Running => match info.health {
                HealthState::Healthy => Readiness::Healthy,
                HealthState::NotConfigured => Readiness::RunningWithoutHealthcheck,
                HealthState::Starting | HealthState::Unhealthy => Readiness::NotReady,
            },
            _ => Readiness::NotReady,
        }
    }
}

/// `check` が準備完了を返すまで待機
///
/// check のエラーは「まだ準備できていない」として扱い、期限まで再試行する。
pub async fn wait_until_healthy<F, Fut>(
    container: &str,
    timeout: Duration,
    config: &WaitConfig,
    mut check: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Readiness>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        match check().await {
            Ok(Readiness::Healthy) => return Ok(()),
            Ok(Readiness::RunningWithoutHealthcheck) => {
                sleep(config.settle).await;
                return Ok(());
            }
            Ok(Readiness::NotReady) => {
                debug!(container = %container, "Container is not ready yet");
            }
            Err(e) => {
                debug!(container = %container, error = %e, "Health check failed");
            }
        }

        if Instant::now() + config.interval > deadline {
            break;
        }
        sleep(config.interval).await;
    }

    Err(ContainerError::HealthTimeout {
        container: container.to_string(),
        timeout_secs: timeout.as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> WaitConfig {
        WaitConfig {
            interval: Duration::from_millis(5),
            settle: Duration::from_millis(1),
        }
    }

    fn info(state: ContainerState, health: HealthState) -> ContainerInfo {
        ContainerInfo {
            id: "abc".to_string(),
            name: "web".to_string(),
            image: "nginx".to_string(),
            state,
            health,
        }
    }

    #[test]
    fn test_readiness_from_info() {
        assert_eq!(Readiness::from_info(None), Readiness::NotReady);
        assert_eq!(
            Readiness::from_info(Some(&info(ContainerState::Running, HealthState::Healthy))),
            Readiness::Healthy
        );
        assert_eq!(
            Readiness::from_info(Some(&info(
                ContainerState::Running,
                HealthState::NotConfigured
            ))),
            Readiness::RunningWithoutHealthcheck
        );
        assert_eq!(
            Readiness::from_info(Some(&info(ContainerState::Running, HealthState::Starting))),
            Readiness::NotReady
        );
        assert_eq!(
            Readiness::from_info(Some(&info(ContainerState::Stopped, HealthState::Healthy))),
            Readiness::NotReady
        );
    }

    #[tokio::test]
    async fn test_becomes_healthy_after_polls() {
        let calls = AtomicU32::new(0);
        let result = wait_until_healthy("db", Duration::from_secs(5), &fast(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(if n < 2 {
                    Readiness::NotReady
                } else {
                    Readiness::Healthy
                })
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_check_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result = wait_until_healthy("db", Duration::from_secs(5), &fast(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ContainerError::NotFound {
                        container: "db".to_string(),
                    })
                } else {
                    Ok(Readiness::RunningWithoutHealthcheck)
                }
            }
        })
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_timeout() {
        let result = wait_until_healthy("db", Duration::from_millis(30), &fast(), || async {
            Ok(Readiness::NotReady)
        })
        .await;

        match result {
            Err(ContainerError::HealthTimeout { container, .. }) => assert_eq!(container, "db"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
