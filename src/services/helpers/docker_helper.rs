use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::models::{ContainerState, ContainerSummary};
use bollard::Docker;
use log::{debug, warn};

use crate::error::InventoryError;
use crate::services::inventory::{ContainerRecord, InventorySource, RUNNING};

/// Status label used when the runtime omits a container's state.
const UNKNOWN_STATUS: &str = "unknown";

/// Inventory source backed by the local Docker daemon.
///
/// The client is created once and shared by every scrape; `bollard::Docker` is
/// cheap to clone and safe to use from concurrent tasks.
#[derive(Debug, Clone)]
pub struct DockerInventory {
    docker: Docker,
}

impl DockerInventory {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connects using `DOCKER_HOST` or the platform's default socket.
    ///
    /// The connection is lazy: an unreachable daemon surfaces on the first scrape,
    /// not here.
    pub fn connect_with_local_defaults() -> Result<Self, bollard::errors::Error> {
        Ok(Self::new(Docker::connect_with_local_defaults()?))
    }

    /// Inspects a container the list reported as running.
    ///
    /// Status and pid both come from the inspect response, so a container that
    /// stopped after the list call is reported with its new state and no pid. A
    /// container that disappeared in between keeps its listed status and gets no
    /// pid. Every other failure aborts the scrape.
    async fn inspect_running(
        &self,
        target: &str,
        name: String,
        listed_status: String,
    ) -> Result<ContainerRecord, InventoryError> {
        match self
            .docker
            .inspect_container(target, None::<InspectContainerOptions>)
            .await
        {
            Ok(details) => Ok(record_from_state(name, listed_status, details.state)),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                warn!("Container {} vanished before it could be inspected", name);
                Ok(ContainerRecord::new(name, listed_status, None))
            }
            Err(source) => Err(InventoryError::Inspect { name, source }),
        }
    }
}

#[async_trait]
impl InventorySource for DockerInventory {
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, InventoryError> {
        let options = Some(ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        });

        let summaries = self
            .docker
            .list_containers(options)
            .await
            .map_err(InventoryError::List)?;

        let mut records = Vec::with_capacity(summaries.len());

        for summary in summaries {
            let Some(name) = container_name(&summary) else {
                warn!(
                    "Skipping container {} without a name",
                    summary.id.as_deref().unwrap_or("<no id>")
                );
                continue;
            };

            let status = container_status(&summary);

            let record = if status == RUNNING {
                let target = summary.id.clone().unwrap_or_else(|| name.clone());
                self.inspect_running(&target, name, status).await?
            } else {
                ContainerRecord::new(name, status, None)
            };

            records.push(record);
        }

        debug!("Docker reported {} containers", records.len());

        Ok(records)
    }
}

/// Canonical container name without the leading `/`.
///
/// Legacy links add aliases such as `/other/web`; the canonical entry is the one
/// without an inner `/`. Falls back to the first entry.
fn container_name(summary: &ContainerSummary) -> Option<String> {
    let names = summary.names.as_ref()?;

    names
        .iter()
        .map(|name| name.trim_start_matches('/'))
        .find(|name| !name.contains('/'))
        .or_else(|| names.first().map(|name| name.trim_start_matches('/')))
        .filter(|name| !name.is_empty())
        .map(String::from)
}

/// Builds the record for a listed-as-running container from its inspected state.
fn record_from_state(
    name: String,
    listed_status: String,
    state: Option<ContainerState>,
) -> ContainerRecord {
    let Some(state) = state else {
        warn!("Running container {} reported no state", name);
        return ContainerRecord::new(name, listed_status, None);
    };

    let status = state
        .status
        .map(|status| status.to_string())
        .filter(|status| !status.is_empty())
        .unwrap_or(listed_status);

    let mut record = ContainerRecord::new(name, status, None);

    if record.is_running() && state.running != Some(false) {
        record.pid = state.pid.filter(|pid| *pid > 0);
        if record.pid.is_none() {
            warn!("Running container {} reported no process id", record.name);
        }
    }

    record
}

fn container_status(summary: &ContainerSummary) -> String {
    summary
        .state
        .clone()
        .unwrap_or_else(|| UNKNOWN_STATUS.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use bollard::models::ContainerStateStatusEnum;
    use warp::http::StatusCode;
    use warp::path::FullPath;
    use warp::Filter;

    use super::*;

    #[derive(Debug, Clone, Copy)]
    struct Canned {
        status: u16,
        body: &'static str,
    }

    const NOT_FOUND: Canned = Canned {
        status: 404,
        body: r#"{"message":"No such container"}"#,
    };

    const SERVER_ERROR: Canned = Canned {
        status: 500,
        body: r#"{"message":"Cannot connect to the Docker daemon"}"#,
    };

    /// Requests the stub daemon received.
    #[derive(Debug, Default)]
    struct Seen {
        list_queries: Vec<HashMap<String, String>>,
        inspected: Vec<String>,
    }

    /// Minimal Docker Engine API answering the list and inspect endpoints.
    struct StubDaemon {
        list: Canned,
        inspect: Vec<(&'static str, Canned)>,
    }

    impl StubDaemon {
        fn respond(&self, path: &str, query: HashMap<String, String>, seen: &Mutex<Seen>) -> Canned {
            let mut seen = seen.lock().unwrap();

            if path.ends_with("/containers/json") {
                seen.list_queries.push(query);
                return self.list;
            }

            if let Some(id) = path.strip_suffix("/json").and_then(|rest| rest.rsplit('/').next()) {
                seen.inspected.push(id.to_string());
                if let Some((_, canned)) = self.inspect.iter().find(|(target, _)| *target == id) {
                    return *canned;
                }
            }

            NOT_FOUND
        }
    }

    async fn serve(daemon: StubDaemon) -> (DockerInventory, Arc<Mutex<Seen>>) {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let daemon = Arc::new(daemon);

        let route = {
            let seen = Arc::clone(&seen);
            warp::path::full()
                .and(warp::query::<HashMap<String, String>>())
                .map(move |path: FullPath, query: HashMap<String, String>| {
                    let canned = daemon.respond(path.as_str(), query, &seen);
                    warp::reply::with_status(
                        warp::reply::with_header(canned.body, "content-type", "application/json"),
                        StatusCode::from_u16(canned.status).unwrap(),
                    )
                })
        };

        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let docker = Docker::connect_with_http(
            &format!("http://{}", addr),
            5,
            bollard::API_DEFAULT_VERSION,
        )
        .unwrap();

        (DockerInventory::new(docker), seen)
    }

    const LIST_WEB_AND_DB: Canned = Canned {
        status: 200,
        body: r#"[
            {"Id":"web1","Names":["/web"],"State":"running"},
            {"Id":"db1","Names":["/db"],"State":"exited"}
        ]"#,
    };

    const LIST_WEB: Canned = Canned {
        status: 200,
        body: r#"[{"Id":"web1","Names":["/web"],"State":"running"}]"#,
    };

    const INSPECT_WEB_RUNNING: Canned = Canned {
        status: 200,
        body: r#"{"Id":"web1","Name":"/web","State":{"Status":"running","Running":true,"Pid":4242}}"#,
    };

    const INSPECT_WEB_EXITED: Canned = Canned {
        status: 200,
        body: r#"{"Id":"web1","Name":"/web","State":{"Status":"exited","Running":false,"Pid":0}}"#,
    };

    #[tokio::test]
    async fn lists_every_container_and_inspects_only_running_ones() {
        let (inventory, seen) = serve(StubDaemon {
            list: LIST_WEB_AND_DB,
            inspect: vec![("web1", INSPECT_WEB_RUNNING)],
        })
        .await;

        let records = inventory.list_containers().await.unwrap();

        assert_eq!(
            records,
            vec![
                ContainerRecord::new("web", "running", Some(4242)),
                ContainerRecord::new("db", "exited", None),
            ]
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.list_queries.len(), 1);
        assert_eq!(seen.list_queries[0].get("all").map(String::as_str), Some("true"));
        assert_eq!(seen.inspected, vec!["web1".to_string()]);
    }

    #[tokio::test]
    async fn container_stopped_after_listing_reports_inspected_state() {
        let (inventory, _) = serve(StubDaemon {
            list: LIST_WEB,
            inspect: vec![("web1", INSPECT_WEB_EXITED)],
        })
        .await;

        let records = inventory.list_containers().await.unwrap();

        assert_eq!(records, vec![ContainerRecord::new("web", "exited", None)]);
    }

    #[tokio::test]
    async fn vanished_container_keeps_listed_status_without_pid() {
        let (inventory, _) = serve(StubDaemon {
            list: LIST_WEB,
            inspect: vec![("web1", NOT_FOUND)],
        })
        .await;

        let records = inventory.list_containers().await.unwrap();

        assert_eq!(records, vec![ContainerRecord::new("web", "running", None)]);
    }

    #[tokio::test]
    async fn inspect_server_error_fails_the_cycle() {
        let (inventory, _) = serve(StubDaemon {
            list: LIST_WEB_AND_DB,
            inspect: vec![("web1", SERVER_ERROR)],
        })
        .await;

        let result = inventory.list_containers().await;

        assert!(matches!(result, Err(InventoryError::Inspect { ref name, .. }) if name == "web"));
    }

    #[tokio::test]
    async fn list_failure_is_reported_as_list_error() {
        let (inventory, seen) = serve(StubDaemon {
            list: SERVER_ERROR,
            inspect: Vec::new(),
        })
        .await;

        let result = inventory.list_containers().await;

        assert!(matches!(result, Err(InventoryError::List(_))));
        assert!(seen.lock().unwrap().inspected.is_empty());
    }

    #[test]
    fn inspected_state_overrides_listed_status() {
        let state = ContainerState {
            status: Some(ContainerStateStatusEnum::EXITED),
            running: Some(false),
            pid: Some(0),
            ..Default::default()
        };

        let record = record_from_state("web".to_string(), "running".to_string(), Some(state));

        assert_eq!(record, ContainerRecord::new("web", "exited", None));
    }

    #[test]
    fn zero_pid_for_running_container_is_treated_as_absent() {
        let state = ContainerState {
            status: Some(ContainerStateStatusEnum::RUNNING),
            running: Some(true),
            pid: Some(0),
            ..Default::default()
        };

        let record = record_from_state("web".to_string(), "running".to_string(), Some(state));

        assert_eq!(record, ContainerRecord::new("web", "running", None));
    }

    #[test]
    fn missing_state_keeps_listed_status() {
        let record = record_from_state("web".to_string(), "running".to_string(), None);

        assert_eq!(record, ContainerRecord::new("web", "running", None));
    }

    fn summary(names: Option<Vec<&str>>, state: Option<&str>) -> ContainerSummary {
        ContainerSummary {
            id: Some("4f1c2a".to_string()),
            names: names.map(|names| names.into_iter().map(String::from).collect()),
            state: state.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn name_is_first_entry_without_leading_slash() {
        let summary = summary(Some(vec!["/web", "/legacy/web"]), Some("running"));
        assert_eq!(container_name(&summary).as_deref(), Some("web"));
    }

    #[test]
    fn canonical_name_wins_over_link_aliases() {
        let linked = summary(Some(vec!["/other/web", "/web"]), Some("running"));
        assert_eq!(container_name(&linked).as_deref(), Some("web"));

        let aliases_only = summary(Some(vec!["/other/web"]), Some("running"));
        assert_eq!(container_name(&aliases_only).as_deref(), Some("other/web"));
    }

    #[test]
    fn missing_or_empty_name_is_rejected() {
        assert_eq!(container_name(&summary(None, Some("running"))), None);
        assert_eq!(container_name(&summary(Some(vec![]), Some("running"))), None);
        assert_eq!(container_name(&summary(Some(vec!["/"]), Some("running"))), None);
    }

    #[test]
    fn status_is_passed_through_verbatim() {
        assert_eq!(container_status(&summary(None, Some("exited"))), "exited");
        assert_eq!(container_status(&summary(None, Some("paused"))), "paused");
    }

    #[test]
    fn missing_status_maps_to_unknown() {
        assert_eq!(container_status(&summary(None, None)), UNKNOWN_STATUS);
    }
}
