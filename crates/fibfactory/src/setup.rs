//! Wiring of settings into a ready-to-use lifecycle
//!
//! Renders the App Runner program into the work directory and points a
//! pulumi engine at it. The only engine call is the version preflight.

use anyhow::Context;
use fibfactory_config::Settings;
use fibfactory_core::{AutomationEngine, Lifecycle, ProjectName};
use fibfactory_pulumi::{AppRunnerProgram, PulumiCli, PulumiEngine};

pub async fn lifecycle(settings: &Settings) -> anyhow::Result<Lifecycle<PulumiEngine>> {
    let project = ProjectName::new(&settings.project)?;
    let work_dir = settings.work_dir()?;

    let build_context = std::path::absolute(&settings.build_context).with_context(|| {
        format!(
            "cannot resolve build context {}",
            settings.build_context.display()
        )
    })?;

    let app_runner = AppRunnerProgram {
        project: project.clone(),
        region: settings.region.clone(),
        image_repository: settings.image_repository.clone(),
        registry_server: settings.registry_server.clone(),
        build_context,
        platform: settings.platform.clone(),
        cpu: settings.instance.cpu.clone(),
        memory: settings.instance.memory.clone(),
    };
    let program = app_runner.materialize(&work_dir).await.with_context(|| {
        format!("cannot write the program to {}", work_dir.display())
    })?;
    tracing::debug!("Program ready in {}", work_dir.display());

    let mut cli = PulumiCli::new(&settings.pulumi.binary, &work_dir);
    if let Some(url) = &settings.pulumi.backend_url {
        cli = cli.with_env(fibfactory_config::BACKEND_URL_ENV, url.as_str());
    }

    let engine = PulumiEngine::new(cli);
    let version = engine.check().await?;
    tracing::debug!("Using {} {}", engine.name(), version);

    Ok(Lifecycle::new(engine, project, program).with_container_port(settings.container_port))
}
