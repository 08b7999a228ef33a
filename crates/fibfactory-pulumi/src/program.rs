//! App Runner infrastructure program
//!
//! Renders the environment program as a Pulumi YAML project: the demo
//! service image is built and pushed to a public ECR repository, then served
//! by an App Runner service whose URL is the stack's only output.

use crate::error::{PulumiError, Result};
use fibfactory_core::{
    APP_NAME_KEY, CONTAINER_PORT_KEY, InfrastructureProgram, ProjectName, SERVICE_URL_OUTPUT,
};
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const PROJECT_FILE: &str = "Pulumi.yaml";

/// Parameters of the rendered program
#[derive(Debug, Clone)]
pub struct AppRunnerProgram {
    pub project: ProjectName,
    pub region: String,
    pub image_repository: String,
    pub registry_server: String,
    /// Docker build context; should be absolute since the program runs from its own directory
    pub build_context: PathBuf,
    pub platform: String,
    pub cpu: String,
    pub memory: String,
}

impl AppRunnerProgram {
    /// Pulumi.yaml contents
    pub fn render(&self) -> Result<String> {
        let app_name = format!("${{{}}}", APP_NAME_KEY);
        let document = json!({
            "name": self.project.as_str(),
            "runtime": "yaml",
            "description": "Ephemeral environment of the fib service",
            "config": {
                APP_NAME_KEY: { "type": "string" },
                CONTAINER_PORT_KEY: { "type": "integer" },
            },
            "variables": {
                "portString": {
                    "fn::toJSON": format!("${{{}}}", CONTAINER_PORT_KEY),
                },
            },
            "resources": {
                "aws-provider": {
                    "type": "pulumi:providers:aws",
                    "properties": { "region": self.region },
                },
                "app-image": {
                    "type": "docker:Image",
                    "properties": {
                        "build": {
                            "context": self.build_context.display().to_string(),
                            "platform": self.platform,
                        },
                        "imageName": format!("{}:{}", self.image_repository, app_name),
                        "registry": { "server": self.registry_server },
                    },
                },
                "app-runner-service": {
                    "type": "aws:apprunner:Service",
                    "properties": {
                        "serviceName": format!("{}-service", app_name),
                        "sourceConfiguration": {
                            "autoDeploymentsEnabled": false,
                            "imageRepository": {
                                "imageConfiguration": { "port": "${portString}" },
                                "imageIdentifier": "${app-image.imageName}",
                                "imageRepositoryType": "ECR_PUBLIC",
                            },
                        },
                        "instanceConfiguration": {
                            "cpu": self.cpu,
                            "memory": self.memory,
                        },
                    },
                    "options": {
                        "provider": "${aws-provider}",
                        "dependsOn": ["${app-image}"],
                    },
                },
            },
            "outputs": {
                SERVICE_URL_OUTPUT: "${app-runner-service.serviceUrl}",
            },
        });

        Ok(serde_yaml::to_string(&document)?)
    }

    /// Write the project file into `dir`, rewriting it only when it changed
    pub async fn materialize(&self, dir: impl AsRef<Path>) -> Result<InfrastructureProgram> {
        let dir = dir.as_ref();
        if !dir.exists() {
            fs::create_dir_all(dir).await?;
            tracing::debug!("Created program directory: {}", dir.display());
        }

        let path = dir.join(PROJECT_FILE);
        let content = self.render()?;
        let current = match fs::read_to_string(&path).await {
            Ok(current) => Some(current),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        if current.as_deref() != Some(content.as_str()) {
            fs::write(&path, content).await?;
            tracing::debug!("Wrote program to {}", path.display());
        }

        Ok(InfrastructureProgram::new(dir))
    }
}

#[derive(Deserialize)]
struct ProjectHeader {
    name: String,
}

/// Project name declared by the program in `dir`
pub async fn read_project_name(dir: impl AsRef<Path>) -> Result<String> {
    let path = dir.as_ref().join(PROJECT_FILE);
    let content = fs::read_to_string(&path).await.map_err(|e| {
        PulumiError::InvalidProgram(format!("cannot read {}: {}", path.display(), e))
    })?;
    let header: ProjectHeader = serde_yaml::from_str(&content)?;
    Ok(header.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> AppRunnerProgram {
        AppRunnerProgram {
            project: ProjectName::new("fibfactory").unwrap(),
            region: "us-west-2".to_string(),
            image_repository: "public.ecr.aws/o2l3o3x9/adamgordonbell".to_string(),
            registry_server: "public.ecr.aws".to_string(),
            build_context: PathBuf::from("/srv/fibfactory/app"),
            platform: "linux/amd64".to_string(),
            cpu: "1024".to_string(),
            memory: "2048".to_string(),
        }
    }

    #[test]
    fn test_render_program() {
        let rendered = program().render().unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&rendered).unwrap();

        assert_eq!(doc["name"].as_str(), Some("fibfactory"));
        assert_eq!(doc["runtime"].as_str(), Some("yaml"));
        assert_eq!(doc["config"]["appName"]["type"].as_str(), Some("string"));
        assert_eq!(
            doc["config"]["containerPort"]["type"].as_str(),
            Some("integer")
        );

        let image = &doc["resources"]["app-image"]["properties"];
        assert_eq!(
            image["imageName"].as_str(),
            Some("public.ecr.aws/o2l3o3x9/adamgordonbell:${appName}")
        );
        assert_eq!(image["build"]["context"].as_str(), Some("/srv/fibfactory/app"));
        assert_eq!(image["build"]["platform"].as_str(), Some("linux/amd64"));

        let service = &doc["resources"]["app-runner-service"];
        assert_eq!(
            service["properties"]["serviceName"].as_str(),
            Some("${appName}-service")
        );
        assert_eq!(
            service["properties"]["sourceConfiguration"]["autoDeploymentsEnabled"].as_bool(),
            Some(false)
        );
        assert_eq!(service["options"]["provider"].as_str(), Some("${aws-provider}"));
        assert_eq!(
            doc["resources"]["aws-provider"]["properties"]["region"].as_str(),
            Some("us-west-2")
        );

        assert_eq!(
            doc["outputs"]["app_runner_service_url"].as_str(),
            Some("${app-runner-service.serviceUrl}")
        );
    }

    #[tokio::test]
    async fn test_materialize_writes_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let work_dir = dir.path().join("program");

        let materialized = program().materialize(&work_dir).await.unwrap();

        assert_eq!(materialized.work_dir(), work_dir.as_path());
        assert!(work_dir.join(PROJECT_FILE).exists());
        assert_eq!(read_project_name(&work_dir).await.unwrap(), "fibfactory");
    }

    #[tokio::test]
    async fn test_materialize_replaces_stale_program() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_FILE), "name: stale\nruntime: yaml\n").unwrap();

        program().materialize(dir.path()).await.unwrap();

        assert_eq!(read_project_name(dir.path()).await.unwrap(), "fibfactory");
    }

    #[tokio::test]
    async fn test_read_project_name_without_program() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_project_name(dir.path()).await.unwrap_err();
        assert!(matches!(err, PulumiError::InvalidProgram(_)));
    }
}
