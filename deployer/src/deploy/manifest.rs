//! Job manifest construction
//!
//! Turns a [`DeploymentRequest`] into the batch job that runs the provisioning
//! process inside the cluster. Building is pure: the same request and settings
//! always produce the same manifest.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, LocalObjectReference, PodSpec, PodTemplateSpec,
    ResourceRequirements, SecretKeySelector, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use project_models::members::members_to_compact_json;
use project_models::DeploymentRequest;

use crate::errors::DeployError;

/// Finished clean jobs are garbage-collected after a day
pub const CLEAN_JOB_TTL_SECS: i32 = 86_400;

const CONTAINER_NAME: &str = "project-deployment";
const CERT_VOLUME: &str = "cert";

/// An environment variable backed by a key of a cluster secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretEnv {
    pub env: String,
    pub secret: String,
    pub key: String,
}

impl SecretEnv {
    fn new(env: &str, secret: &str, key: &str) -> Self {
        Self {
            env: env.to_string(),
            secret: secret.to_string(),
            key: key.to_string(),
        }
    }
}

/// Cluster-specific constants of the deployment job
#[derive(Debug, Clone)]
pub struct ManifestSettings {
    /// Namespace the job is created in
    pub namespace: String,

    /// Image repository, the request's tag is appended
    pub image_repository: String,

    /// Program started by the job's shell
    pub entrypoint: String,

    pub cpu_request: String,
    pub memory_request: String,
    pub cpu_limit: String,
    pub memory_limit: String,

    pub image_pull_secret: String,
    pub service_account: String,

    /// Secret holding the client certificate mounted at `cert_mount_path`
    pub cert_secret: String,
    pub cert_mount_path: String,

    /// Credentials injected by reference, in order
    pub secret_env: Vec<SecretEnv>,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            image_repository: "lequanha/project-deployment".to_string(),
            entrypoint: "project-deployer".to_string(),
            cpu_request: "100m".to_string(),
            memory_request: "200Mi".to_string(),
            cpu_limit: "200m".to_string(),
            memory_limit: "200Mi".to_string(),
            image_pull_secret: "docker-credentials".to_string(),
            service_account: "internal-kubectl".to_string(),
            cert_secret: "lequanha-admin-client-tls".to_string(),
            cert_mount_path: "/cert".to_string(),
            secret_env: vec![
                SecretEnv::new("KEYCLOAK_USER", "keycloak-admin", "username"),
                SecretEnv::new("KEYCLOAK_PASSWORD", "keycloak-admin", "password"),
                SecretEnv::new("MAIL_PASSWORD", "external-keys", "MANDRILL_PASSWORD"),
                SecretEnv::new("TEAMS_WEBHOOK_URL", "external-keys", "PYMSTEAMS_URL"),
                SecretEnv::new("DB_IP", "external-keys", "DB_IP"),
                SecretEnv::new("DB_PORT", "external-keys", "DB_PORT"),
                SecretEnv::new(
                    "DB_PASSWORD",
                    "apioperator.lequanha-pgdb-cluster.credentials.postgresql.acid.zalan.do",
                    "password",
                ),
            ],
        }
    }
}

/// Build the job manifest for a request
pub fn build_job_manifest(settings: &ManifestSettings, request: &DeploymentRequest) -> Job {
    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(format!("{}:{}", settings.image_repository, request.image_tag)),
        image_pull_policy: Some("Always".to_string()),
        env: Some(build_env(settings, request)),
        resources: Some(build_resources(settings)),
        command: Some(vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            build_command(settings, request),
        ]),
        volume_mounts: Some(vec![VolumeMount {
            name: CERT_VOLUME.to_string(),
            mount_path: settings.cert_mount_path.clone(),
            read_only: Some(true),
            ..Default::default()
        }]),
        ..Default::default()
    };

    let pod_spec = PodSpec {
        containers: vec![container],
        restart_policy: Some("Never".to_string()),
        image_pull_secrets: Some(vec![LocalObjectReference {
            name: settings.image_pull_secret.clone(),
        }]),
        service_account_name: Some(settings.service_account.clone()),
        volumes: Some(vec![Volume {
            name: CERT_VOLUME.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(settings.cert_secret.clone()),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        ..Default::default()
    };

    Job {
        metadata: ObjectMeta {
            name: Some(request.job_identity().name()),
            namespace: Some(settings.namespace.clone()),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(0),
            completions: Some(1),
            parallelism: Some(1),
            ttl_seconds_after_finished: request.clean.then_some(CLEAN_JOB_TTL_SECS),
            template: PodTemplateSpec {
                metadata: None,
                spec: Some(pod_spec),
            },
            ..Default::default()
        }),
        status: None,
    }
}

/// Shell command run by the job container
pub fn build_command(settings: &ManifestSettings, request: &DeploymentRequest) -> String {
    let mut command = format!(
        "{} run {} {} {} --members '{}' --cluster-namespace {}",
        settings.entrypoint,
        request.project_name,
        request.project_id,
        request.enterprise_id,
        members_to_compact_json(&request.members),
        request.cluster_namespace,
    );

    // An empty multi-valued flag would be rejected by the entry surface
    if !request.components.is_empty() {
        let components: Vec<&str> = request.components.iter().map(String::as_str).collect();
        command.push_str(" --components ");
        command.push_str(&components.join(" "));
    }

    if request.clean {
        command.push_str(" --clean");
    }

    command
}

fn build_env(settings: &ManifestSettings, request: &DeploymentRequest) -> Vec<EnvVar> {
    let literals = [
        ("UNBUFFERED_OUTPUT", "1"),
        ("ENVIRONMENT", request.environment.as_str()),
        ("RELEASE_VERSION", request.image_tag.as_str()),
    ];

    let mut env: Vec<EnvVar> = literals
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.to_string(),
            value: Some(value.to_string()),
            value_from: None,
        })
        .collect();

    env.extend(settings.secret_env.iter().map(|secret| EnvVar {
        name: secret.env.clone(),
        value: None,
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.secret.clone(),
                key: secret.key.clone(),
                optional: None,
            }),
            ..Default::default()
        }),
    }));

    env
}

fn build_resources(settings: &ManifestSettings) -> ResourceRequirements {
    let quantities = |cpu: &str, memory: &str| {
        BTreeMap::from([
            ("cpu".to_string(), Quantity(cpu.to_string())),
            ("memory".to_string(), Quantity(memory.to_string())),
        ])
    };

    ResourceRequirements {
        requests: Some(quantities(&settings.cpu_request, &settings.memory_request)),
        limits: Some(quantities(&settings.cpu_limit, &settings.memory_limit)),
        ..Default::default()
    }
}

/// Render a manifest as pretty JSON
pub fn render_manifest(job: &Job) -> Result<String, DeployError> {
    Ok(serde_json::to_string_pretty(job)?)
}
