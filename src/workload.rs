use k8s_openapi::api::core::v1::Pod;

/// A container declared by a workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub image: String,
}

/// A cluster-scheduled unit running one or more containers, i.e. a pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub name: String,
    pub namespace: String,
    pub containers: Vec<Container>,
}

impl Workload {
    pub fn new<I, S>(name: impl Into<String>, namespace: impl Into<String>, images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            containers: images
                .into_iter()
                .map(|image| Container {
                    image: image.into(),
                })
                .collect(),
        }
    }
}

impl From<&Pod> for Workload {
    /// Maps the pod's regular containers; init and ephemeral containers are not
    /// counted. A container without an image maps to an empty image string.
    fn from(pod: &Pod) -> Self {
        let containers = pod
            .spec
            .as_ref()
            .map(|spec| {
                spec.containers
                    .iter()
                    .map(|container| Container {
                        image: container.image.clone().unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: pod.metadata.name.clone().unwrap_or_default(),
            namespace: pod.metadata.namespace.clone().unwrap_or_default(),
            containers,
        }
    }
}

/// Lifecycle notification delivered by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadEvent {
    Added(Workload),
    Removed(Workload),
}

/// Receiver of workload lifecycle notifications.
///
/// Sources call the handler one notification at a time.
pub trait WorkloadHandler {
    fn on_added(&self, workload: &Workload);

    fn on_removed(&self, workload: &Workload);

    fn handle(&self, event: &WorkloadEvent) {
        match event {
            WorkloadEvent::Added(workload) => self.on_added(workload),
            WorkloadEvent::Removed(workload) => self.on_removed(workload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container as PodContainer, PodSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    #[test]
    fn test_workload_from_pod() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("web-0".to_owned()),
                namespace: Some("shop".to_owned()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: vec![
                    PodContainer {
                        name: "web".to_owned(),
                        image: Some("nginx:1.25".to_owned()),
                        ..Default::default()
                    },
                    PodContainer {
                        name: "sidecar".to_owned(),
                        image: None,
                        ..Default::default()
                    },
                ],
                init_containers: Some(vec![PodContainer {
                    name: "migrate".to_owned(),
                    image: Some("migrate:1".to_owned()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(Workload::from(&pod), Workload::new("web-0", "shop", ["nginx:1.25", ""]));
    }

    #[test]
    fn test_workload_from_pod_without_spec() {
        let pod = Pod::default();
        assert_eq!(Workload::from(&pod), Workload::new("", "", Vec::<String>::new()));
    }
}
