//! bollard による ContainerRuntime 実装

// Bollard 0.19 の非推奨APIを一時的に使用
#![allow(deprecated)]

use crate::converter::{STOP_TIMEOUT_SECS, parse_image_tag, spec_to_container_config};
use crate::error::{ContainerError, Result};
use crate::registry::{extract_registry, get_docker_credentials};
use crate::runtime::{
    ContainerInfo, ContainerRuntime, ContainerSpec, ContainerState, ExecOutput, HealthState,
    LogStream, VolumeRemoval,
};
use crate::waiter::{Readiness, WaitConfig, wait_until_healthy};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::HealthStatusEnum;
use bollard::query_parameters::{
    InspectContainerOptions, InspectNetworkOptions, LogsOptions, RemoveContainerOptions,
    RemoveVolumeOptions, RestartContainerOptions, StartContainerOptions, StopContainerOptions,
};
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Docker デーモンに接続するランタイム
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
    wait: WaitConfig,
}

impl DockerRuntime {
    /// ローカルのDockerに接続し、疎通を確認する
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| ContainerError::DockerConnectionFailed(e.to_string()))?;
        docker
            .ping()
            .await
            .map_err(|e| ContainerError::DockerConnectionFailed(e.to_string()))?;

        debug!("Connected to Docker daemon");
        Ok(Self {
            docker,
            wait: WaitConfig::default(),
        })
    }
}

/// 304 を成功として扱う
fn ignore_not_modified(result: std::result::Result<(), bollard::errors::Error>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) => match ContainerError::from(e) {
            ContainerError::NotModified(_) => Ok(()),
            other => Err(other),
        },
    }
}

fn with_container(err: ContainerError, name: &str) -> ContainerError {
    match err {
        ContainerError::NotFound { .. } => ContainerError::NotFound {
            container: name.to_string(),
        },
        other => other,
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ensure_network(&self, name: &str) -> Result<()> {
        match self
            .docker
            .inspect_network(name, None::<InspectNetworkOptions>)
            .await
        {
            Ok(_) => return Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {}
            Err(e) => return Err(e.into()),
        }

        let request = bollard::models::NetworkCreateRequest {
            name: name.to_string(),
            driver: Some("bridge".to_string()),
            ..Default::default()
        };
        match self.docker.create_network(request).await {
            Ok(_) => {
                info!(network = %name, "Created network");
                Ok(())
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 409, ..
            }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        let (image_name, tag) = parse_image_tag(image);
        let credentials = extract_registry(image).and_then(get_docker_credentials);

        let options = bollard::image::CreateImageOptions {
            from_image: image_name,
            tag,
            ..Default::default()
        };

        info!(image = %image, "Pulling image");
        let mut stream = self.docker.create_image(Some(options), None, credentials);
        while let Some(progress) = stream.next().await {
            match progress {
                Ok(bollard::models::CreateImageInfo {
                    status: Some(status),
                    ..
                }) => debug!(image = %image, status = %status, "Pull progress"),
                Ok(_) => {}
                Err(e) => {
                    return Err(ContainerError::ImagePullFailed {
                        image: image.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let (config, options) = spec_to_container_config(spec);
        let response = self
            .docker
            .create_container(Some(options), config)
            .await?;

        for warning in &response.warnings {
            warn!(container = %spec.name, warning = %warning, "Docker warning");
        }
        info!(container = %spec.name, id = %response.id, "Created container");
        Ok(response.id)
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        ignore_not_modified(
            self.docker
                .start_container(name, None::<StartContainerOptions>)
                .await,
        )
        .map_err(|e| with_container(e, name))
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        let options = StopContainerOptions {
            t: Some(STOP_TIMEOUT_SECS as _),
            ..Default::default()
        };
        ignore_not_modified(self.docker.stop_container(name, Some(options)).await)
            .map_err(|e| with_container(e, name))
    }

    async fn restart_container(&self, name: &str) -> Result<()> {
        let options = RestartContainerOptions {
            t: Some(STOP_TIMEOUT_SECS as _),
            ..Default::default()
        };
        self.docker
            .restart_container(name, Some(options))
            .await
            .map_err(|e| with_container(e.into(), name))
    }

    async fn remove_container(&self, name: &str, force: bool) -> Result<()> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.docker
            .remove_container(name, Some(options))
            .await
            .map_err(|e| with_container(e.into(), name))
    }

    async fn inspect_container(&self, name: &str) -> Result<Option<ContainerInfo>> {
        let response = match self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(response) => response,
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state = response.state.as_ref();
        let container_state = match state {
            Some(s) if s.paused.unwrap_or(false) => ContainerState::Paused,
            Some(s) if s.running.unwrap_or(false) => ContainerState::Running,
            Some(_) => ContainerState::Stopped,
            None => ContainerState::Unknown,
        };
        let health = match state
            .and_then(|s| s.health.as_ref())
            .and_then(|h| h.status.as_ref())
        {
            Some(&HealthStatusEnum::HEALTHY) => HealthState::Healthy,
            Some(&HealthStatusEnum::UNHEALTHY) => HealthState::Unhealthy,
            Some(&HealthStatusEnum::STARTING) => HealthState::Starting,
            _ => HealthState::NotConfigured,
        };

        Ok(Some(ContainerInfo {
            id: response.id.unwrap_or_default(),
            name: response
                .name
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| name.to_string()),
            image: response
                .config
                .and_then(|c| c.image)
                .unwrap_or_default(),
            state: container_state,
            health,
        }))
    }

    async fn list_by_label(&self, key: &str, value: &str) -> Result<Vec<String>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{}={}", key, value)]);

        let options = bollard::container::ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;

        let mut names: Vec<String> = containers
            .into_iter()
            .filter_map(|c| c.names.and_then(|n| n.into_iter().next()))
            .map(|n| n.trim_start_matches('/').to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn logs(&self, name: &str, tail: usize, follow: bool) -> Result<LogStream> {
        // 存在しないコンテナはストリーム開始前に検出する
        if self.inspect_container(name).await?.is_none() {
            return Err(ContainerError::NotFound {
                container: name.to_string(),
            });
        }

        let options = LogsOptions {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            follow,
            ..Default::default()
        };
        let stream = self
            .docker
            .logs(name, Some(options))
            .map(|chunk| chunk.map(|log| log.to_string()).map_err(ContainerError::from));
        Ok(stream.boxed())
    }

    async fn wait_healthy(&self, name: &str, timeout: Duration) -> Result<()> {
        wait_until_healthy(name, timeout, &self.wait, move || async move {
            let info = self.inspect_container(name).await?;
            Ok(Readiness::from_info(info.as_ref()))
        })
        .await
    }

    async fn exec(&self, name: &str, cmd: &[String]) -> Result<ExecOutput> {
        use bollard::container::LogOutput;
        use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};

        let exec_config = CreateExecOptions {
            cmd: Some(cmd.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };
        let message = self
            .docker
            .create_exec(name, exec_config)
            .await
            .map_err(|e| with_container(e.into(), name))?;

        let mut output = String::new();
        let start_config = StartExecOptions {
            ..Default::default()
        };
        match self
            .docker
            .start_exec(&message.id, Some(start_config))
            .await?
        {
            StartExecResults::Attached {
                output: mut stream, ..
            } => {
                while let Some(chunk) = stream.next().await {
                    match chunk? {
                        LogOutput::StdOut { message }
                        | LogOutput::StdErr { message }
                        | LogOutput::Console { message } => {
                            output.push_str(&String::from_utf8_lossy(&message));
                        }
                        LogOutput::StdIn { .. } => {}
                    }
                }
            }
            StartExecResults::Detached => {}
        }

        let inspect = self.docker.inspect_exec(&message.id).await?;
        let exit_code = inspect.exit_code.unwrap_or(-1);
        debug!(container = %name, exit_code, "Exec finished");

        Ok(ExecOutput { exit_code, output })
    }

    async fn remove_volumes(&self, names: &[String]) -> Result<VolumeRemoval> {
        let mut result = VolumeRemoval::default();
        for name in names {
            match self
                .docker
                .remove_volume(name, None::<RemoveVolumeOptions>)
                .await
                .map_err(ContainerError::from)
            {
                Ok(()) => {
                    info!(volume = %name, "Removed volume");
                    result.removed.push(name.clone());
                }
                Err(e) if e.is_not_found() => {
                    debug!(volume = %name, "Volume already gone");
                }
                Err(e) => {
                    warn!(volume = %name, error = %e, "Failed to remove volume");
                    result.failed.push((name.clone(), e.to_string()));
                }
            }
        }
        Ok(result)
    }
}
