use std::collections::{HashMap, HashSet};
use std::path::Path;

use futures::stream::{self, BoxStream};
use futures::{StreamExt, future};
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client, Config};

use super::{Error, Result};
use crate::error::ResultOkLogExt;
use crate::workload::{Workload, WorkloadEvent, WorkloadHandler};

/// Watches pods through the Kubernetes API and turns the watch into workload
/// notifications.
pub struct KubernetesSource {
    apis: Vec<(String, Api<Pod>)>,
}

impl KubernetesSource {
    /// Connects to the cluster and verifies that pods can be listed.
    ///
    /// # Arguments
    ///
    /// * `kubeconfig` - Explicit kubeconfig file. Without it the configuration is
    ///   inferred: in-cluster service account first, then `KUBECONFIG` or
    ///   `~/.kube/config`.
    /// * `namespaces` - Namespaces to watch. An empty slice watches all namespaces.
    ///
    /// # Errors
    ///
    /// Returns an error if no configuration can be loaded, the client cannot be
    /// built, or the initial list request of any watched scope fails.
    pub async fn connect(kubeconfig: Option<&Path>, namespaces: &[String]) -> Result<Self> {
        let config = match kubeconfig {
            Some(path) => {
                log::debug!("Loading kubeconfig from {}", path.display());
                let kubeconfig_err = |source: kube::config::KubeconfigError| Error::Kubeconfig {
                    path: path.to_path_buf(),
                    source,
                };
                let kubeconfig = Kubeconfig::read_from(path).map_err(kubeconfig_err)?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(kubeconfig_err)?
            }
            None => Config::infer().await.map_err(Error::InferConfig)?,
        };
        log::debug!("Using cluster at {}", config.cluster_url);
        let client = Client::try_from(config).map_err(Error::Client)?;

        let namespaces = unique_namespaces(namespaces);
        let apis: Vec<(String, Api<Pod>)> = if namespaces.is_empty() {
            vec![("all namespaces".to_owned(), Api::all(client))]
        } else {
            namespaces
                .into_iter()
                .map(|namespace| {
                    (
                        format!("namespace `{namespace}`"),
                        Api::namespaced(client.clone(), namespace),
                    )
                })
                .collect()
        };

        for (scope, api) in &apis {
            api.list(&ListParams::default().limit(1))
                .await
                .map_err(|source| Error::Connect {
                    scope: scope.clone(),
                    source,
                })?;
            log::debug!("Pods in {} are readable", scope);
        }

        Ok(Self { apis })
    }

    /// Watches all configured scopes and delivers their notifications to `handler`
    /// until `shutdown` resolves.
    ///
    /// Watch errors are logged and retried with backoff inside the watch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamEnded`] if the merged watch stops.
    pub async fn subscribe<H>(self, handler: &H, shutdown: impl Future<Output = ()>) -> Result<()>
    where
        H: WorkloadHandler + ?Sized,
    {
        let watches: Vec<BoxStream<'static, WorkloadEvent>> = self
            .apis
            .into_iter()
            .map(|(scope, api)| {
                log::info!("Watching pods in {}", scope);
                let mut tracker = PodTracker::default();
                watcher(api, watcher::Config::default())
                    .default_backoff()
                    .filter_map(|event| future::ready(event.ok_log()))
                    .flat_map(move |event| stream::iter(tracker.apply(event)))
                    .boxed()
            })
            .collect();

        super::deliver(stream::select_all(watches), handler, shutdown).await
    }
}

/// Turns the level-based pod watch into add and remove notifications.
///
/// A pod is added the first time its uid is seen and removed when it is deleted or
/// missing from a relist. Later sightings of a known pod are updates and are not
/// reported. Removes carry the workload as it was added so that they undo exactly
/// the keys the add counted.
#[derive(Debug, Default)]
pub struct PodTracker {
    known: HashMap<String, Workload>,
    relisted: Option<HashSet<String>>,
}

impl PodTracker {
    pub fn apply(&mut self, event: watcher::Event<Pod>) -> Vec<WorkloadEvent> {
        match event {
            watcher::Event::Apply(pod) => self.observe(&pod).into_iter().collect(),
            watcher::Event::Init => {
                log::debug!("Pod relist started ({} known pods)", self.len());
                self.relisted = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(pod) => {
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(pod_uid(&pod));
                }
                self.observe(&pod).into_iter().collect()
            }
            watcher::Event::InitDone => {
                let Some(relisted) = self.relisted.take() else {
                    return Vec::new();
                };
                let stale: Vec<String> = self
                    .known
                    .keys()
                    .filter(|uid| !relisted.contains(*uid))
                    .cloned()
                    .collect();
                log::debug!(
                    "Pod relist done ({} pods, {} gone)",
                    relisted.len(),
                    stale.len()
                );
                stale
                    .into_iter()
                    .filter_map(|uid| self.known.remove(&uid))
                    .map(WorkloadEvent::Removed)
                    .collect()
            }
            watcher::Event::Delete(pod) => {
                let workload = self
                    .known
                    .remove(&pod_uid(&pod))
                    .unwrap_or_else(|| Workload::from(&pod));
                vec![WorkloadEvent::Removed(workload)]
            }
        }
    }

    fn len(&self) -> usize {
        self.known.len()
    }

    fn observe(&mut self, pod: &Pod) -> Option<WorkloadEvent> {
        let uid = pod_uid(pod);
        if self.known.contains_key(&uid) {
            return None;
        }
        let workload = Workload::from(pod);
        self.known.insert(uid, workload.clone());
        Some(WorkloadEvent::Added(workload))
    }
}

/// Sorted, deduplicated, non-empty namespaces. Two watches on one namespace would
/// each report every pod as added.
fn unique_namespaces(namespaces: &[String]) -> Vec<&str> {
    let mut unique: Vec<&str> = namespaces
        .iter()
        .map(|namespace| namespace.trim())
        .filter(|namespace| !namespace.is_empty())
        .collect();
    unique.sort_unstable();
    unique.dedup();
    unique
}

fn pod_uid(pod: &Pod) -> String {
    pod.metadata.uid.clone().unwrap_or_else(|| {
        format!(
            "{}/{}",
            pod.metadata.namespace.as_deref().unwrap_or_default(),
            pod.metadata.name.as_deref().unwrap_or_default()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, PodSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn pod(uid: &str, name: &str, images: &[&str]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                namespace: Some("ns".to_owned()),
                uid: Some(uid.to_owned()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: images
                    .iter()
                    .enumerate()
                    .map(|(i, image)| Container {
                        name: format!("c{i}"),
                        image: Some((*image).to_owned()),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn added(name: &str, images: &[&str]) -> WorkloadEvent {
        WorkloadEvent::Added(Workload::new(name, "ns", images.iter().copied()))
    }

    fn removed(name: &str, images: &[&str]) -> WorkloadEvent {
        WorkloadEvent::Removed(Workload::new(name, "ns", images.iter().copied()))
    }

    #[test]
    fn test_namespaces_are_watched_once() {
        let namespaces: Vec<String> = ["default", "kube-system", "default", " default ", ""]
            .iter()
            .map(|namespace| (*namespace).to_owned())
            .collect();
        assert_eq!(unique_namespaces(&namespaces), vec!["default", "kube-system"]);
        assert!(unique_namespaces(&[]).is_empty());
    }

    #[test]
    fn test_first_apply_adds_and_updates_are_ignored() {
        let mut tracker = PodTracker::default();
        assert_eq!(
            tracker.apply(watcher::Event::Apply(pod("u1", "p1", &["a:1"]))),
            vec![added("p1", &["a:1"])]
        );
        assert!(
            tracker
                .apply(watcher::Event::Apply(pod("u1", "p1", &["a:1"])))
                .is_empty()
        );
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_delete_removes_workload_as_added() {
        let mut tracker = PodTracker::default();
        tracker.apply(watcher::Event::Apply(pod("u1", "p1", &["a:1"])));
        tracker.apply(watcher::Event::Apply(pod("u1", "p1", &["a:2"])));

        assert_eq!(
            tracker.apply(watcher::Event::Delete(pod("u1", "p1", &["a:2"]))),
            vec![removed("p1", &["a:1"])]
        );
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn test_delete_of_unknown_pod_is_still_delivered() {
        let mut tracker = PodTracker::default();
        assert_eq!(
            tracker.apply(watcher::Event::Delete(pod("u9", "p9", &["a:1", "b:2"]))),
            vec![removed("p9", &["a:1", "b:2"])]
        );
    }

    #[test]
    fn test_initial_list_adds_every_pod() {
        let mut tracker = PodTracker::default();
        assert!(tracker.apply(watcher::Event::Init).is_empty());
        assert_eq!(
            tracker.apply(watcher::Event::InitApply(pod("u1", "p1", &["a:1"]))),
            vec![added("p1", &["a:1"])]
        );
        assert_eq!(
            tracker.apply(watcher::Event::InitApply(pod("u2", "p2", &["b:1"]))),
            vec![added("p2", &["b:1"])]
        );
        assert!(tracker.apply(watcher::Event::InitDone).is_empty());
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_relist_removes_vanished_pods_only() {
        let mut tracker = PodTracker::default();
        tracker.apply(watcher::Event::Apply(pod("u1", "p1", &["a:1"])));
        tracker.apply(watcher::Event::Apply(pod("u2", "p2", &["b:1"])));

        tracker.apply(watcher::Event::Init);
        assert!(
            tracker
                .apply(watcher::Event::InitApply(pod("u1", "p1", &["a:1"])))
                .is_empty()
        );
        assert_eq!(
            tracker.apply(watcher::Event::InitApply(pod("u3", "p3", &["c:1"]))),
            vec![added("p3", &["c:1"])]
        );
        assert_eq!(
            tracker.apply(watcher::Event::InitDone),
            vec![removed("p2", &["b:1"])]
        );
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_pod_without_uid_is_tracked_by_name() {
        let mut tracker = PodTracker::default();
        let mut nameless = pod("", "p1", &["a:1"]);
        nameless.metadata.uid = None;

        tracker.apply(watcher::Event::Apply(nameless.clone()));
        assert!(tracker.apply(watcher::Event::Apply(nameless.clone())).is_empty());
        assert_eq!(
            tracker.apply(watcher::Event::Delete(nameless)),
            vec![removed("p1", &["a:1"])]
        );
    }
}
