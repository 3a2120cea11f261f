use crate::model::{Cluster, ClusterConfig, Configuration, Container, Ingress, Network, Release};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("{path}: {source}", path = .path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<ConfigError>,
    },
    #[error("invalid blueprint URI '{0}', expected '<source>//<subfolder>'")]
    InvalidBlueprintUri(String),
    #[error("no configuration files found in {}", .0.display())]
    EmptyFolder(PathBuf),
}

/// One configuration file. Each table array declares resources of one kind.
///
/// ```toml
/// [[network]]
/// name = "k8s"
/// subnet = "10.5.0.0/16"
///
/// [[cluster]]
/// name = "default"
/// version = "v1.0.0"
/// network = "network.k8s"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub network: Vec<Network>,
    #[serde(default)]
    pub container: Vec<Container>,
    #[serde(default)]
    pub k8s_config: Vec<ClusterConfig>,
    #[serde(default)]
    pub cluster: Vec<Cluster>,
    #[serde(default)]
    pub helm: Vec<Release>,
    #[serde(default)]
    pub ingress: Vec<Ingress>,
}

impl ConfigFile {
    /// Append this file's resources to `config` in file order.
    pub fn merge_into(self, config: &mut Configuration) {
        config.networks.extend(self.network);
        config.containers.extend(self.container);
        config.cluster_configs.extend(self.k8s_config);
        config.clusters.extend(self.cluster);
        config.releases.extend(self.helm);
        config.ingresses.extend(self.ingress);
    }

    /// Make `./` and `../` paths absolute against `base`.
    pub fn rebase_paths(&mut self, base: &Path) {
        for c in &mut self.container {
            for v in &mut c.volumes {
                rebase(&mut v.source, base);
            }
        }
        for r in &mut self.helm {
            rebase(&mut r.chart, base);
            if let Some(values) = r.values.as_mut() {
                rebase(values, base);
            }
        }
        for b in &mut self.k8s_config {
            for p in &mut b.paths {
                rebase(p, base);
            }
        }
    }
}

fn rebase(path: &mut String, base: &Path) {
    if path.starts_with("./") || path.starts_with("../") {
        *path = base.join(path.as_str()).to_string_lossy().into_owned();
    }
}

/// Parse a single configuration document. The result carries the implicit WAN
/// and is not yet resolved.
pub fn parse_config_str(content: &str) -> Result<Configuration, ConfigError> {
    let file: ConfigFile = toml::from_str(content)?;
    let mut config = Configuration::with_default_wan();
    file.merge_into(&mut config);
    Ok(config)
}

pub fn parse_config_file(path: &Path) -> Result<Configuration, ConfigError> {
    let mut config = Configuration::with_default_wan();
    load_file(path, &mut config)?;
    Ok(config)
}

/// Parse every `*.toml` file in `dir`, sorted by file name, into one configuration.
pub fn parse_folder(dir: &Path) -> Result<Configuration, ConfigError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    files.sort();
    if files.is_empty() {
        return Err(ConfigError::EmptyFolder(dir.to_path_buf()));
    }

    let mut config = Configuration::with_default_wan();
    for path in &files {
        load_file(path, &mut config)?;
    }
    tracing::debug!(
        "parsed {} files from {} into {} resources",
        files.len(),
        dir.display(),
        config.len()
    );
    Ok(config)
}

/// Parse a file or, for a directory, every configuration file inside it.
pub fn parse_path(path: &Path) -> Result<Configuration, ConfigError> {
    if path.is_dir() {
        parse_folder(path)
    } else {
        parse_config_file(path)
    }
}

fn load_file(path: &Path, config: &mut Configuration) -> Result<(), ConfigError> {
    let in_file = |e: ConfigError| ConfigError::InFile {
        path: path.to_path_buf(),
        source: Box::new(e),
    };
    let content = fs::read_to_string(path).map_err(|e| in_file(e.into()))?;
    let mut file: ConfigFile = toml::from_str(&content).map_err(|e| in_file(e.into()))?;
    if let Some(base) = path.parent() {
        let base = fs::canonicalize(base).unwrap_or_else(|_| base.to_path_buf());
        file.rebase_paths(&base);
    }
    file.merge_into(config);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WAN_NAME;
    use crate::resolve::{resolve, ResolveError};
    use crate::types::{ResourceId, ResourceKind};

    const STACK: &str = r#"
[[network]]
name = "k8s"
subnet = "10.5.0.0/16"

[[container]]
name = "consul"
image = "consul:1.6.1"
command = ["consul", "agent", "-dev"]
network = "network.k8s"
ip_address = "10.5.0.200"

[container.environment]
CONSUL_BIND_INTERFACE = "eth0"

[[container.volumes]]
source = "./consul_config"
destination = "/config"

[[cluster]]
name = "default"
version = "v1.0.0"
nodes = 2
network = "network.k8s"

[[helm]]
name = "vault"
cluster = "cluster.default"
chart = "./vault-helm"
values = "./vault-values.yaml"

[helm.health_check]
pods = ["app.kubernetes.io/name=vault"]

[[ingress]]
name = "vault-http"
target = "cluster.default"

[[ingress.ports]]
local = 8200
remote = 8200
host = 18200

[[k8s_config]]
name = "dashboard"
cluster = "cluster.default"
paths = ["./k8s_config"]
wait_until_ready = true
"#;

    #[test]
    fn parse_full_stack() {
        let config = parse_config_str(STACK).unwrap();
        assert_eq!(config.wan.as_ref().unwrap().name, WAN_NAME);
        assert_eq!(config.networks.len(), 1);
        let consul = &config.containers[0];
        assert_eq!(consul.command, vec!["consul", "agent", "-dev"]);
        assert_eq!(consul.ip_address.as_deref(), Some("10.5.0.200"));
        assert_eq!(consul.environment["CONSUL_BIND_INTERFACE"], "eth0");
        assert_eq!(config.clusters[0].nodes, 2);
        assert_eq!(
            config.releases[0].health_check.pods,
            vec!["app.kubernetes.io/name=vault"]
        );
        assert_eq!(config.ingresses[0].ports[0].host, 18200);
        assert!(config.cluster_configs[0].wait_until_ready);
    }

    #[test]
    fn parsed_stack_resolves() {
        let mut config = parse_config_str(STACK).unwrap();
        resolve(&mut config).unwrap();
        let ingress = &config.ingresses[0];
        assert_eq!(
            ingress.network_ref(),
            Some(ResourceId::new(ResourceKind::Network, 0))
        );
        assert_eq!(ingress.wan_ref(), Some(ResourceId::wan()));
        assert_eq!(config.clusters[0].wan_ref(), Some(ResourceId::wan()));
    }

    #[test]
    fn defaults_apply() {
        let config = parse_config_str(
            r#"
[[cluster]]
name = "dev"
version = "v1.0.0"

[[k8s_config]]
name = "app"
cluster = "cluster.dev"
"#,
        )
        .unwrap();
        assert_eq!(config.clusters[0].nodes, 1);
        assert!(!config.cluster_configs[0].wait_until_ready);
        assert!(config.cluster_configs[0].paths.is_empty());
    }

    #[test]
    fn reject_unknown_fields() {
        let err = parse_config_str(
            r#"
[[network]]
name = "k8s"
subnet = "10.5.0.0/16"
mtu = 1500
"#,
        );
        assert!(matches!(err, Err(ConfigError::ParseToml(_))));
        assert!(parse_config_str("[[vm]]\nname = \"x\"\n").is_err());
    }

    #[test]
    fn network_named_wan_fails_resolve() {
        let mut config =
            parse_config_str("[[network]]\nname = \"wan\"\nsubnet = \"10.1.0.0/16\"\n").unwrap();
        assert_eq!(resolve(&mut config), Err(ResolveError::WanExists));
    }

    #[test]
    fn file_paths_are_rebased() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.toml");
        fs::write(&path, STACK).unwrap();
        let config = parse_config_file(&path).unwrap();
        let base = fs::canonicalize(dir.path()).unwrap();
        let source = &config.containers[0].volumes[0].source;
        assert!(Path::new(source).is_absolute());
        assert!(source.starts_with(base.to_str().unwrap()));
        assert!(config.releases[0].chart.ends_with("vault-helm"));
        assert!(Path::new(&config.cluster_configs[0].paths[0]).is_absolute());
    }

    #[test]
    fn folder_merges_sorted_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("b_app.toml"),
            "[[container]]\nname = \"app\"\nimage = \"nginx\"\nnetwork = \"network.net\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("a_net.toml"),
            "[[network]]\nname = \"net\"\nsubnet = \"10.0.0.0/16\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "not config").unwrap();

        let mut config = parse_folder(dir.path()).unwrap();
        assert_eq!(config.networks[0].name, "net");
        assert_eq!(config.containers[0].name, "app");
        resolve(&mut config).unwrap();
    }

    #[test]
    fn folder_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.toml"), "[[network]\n").unwrap();
        let err = parse_folder(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InFile { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn empty_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            parse_folder(dir.path()),
            Err(ConfigError::EmptyFolder(_))
        ));
    }
}
