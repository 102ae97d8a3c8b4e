//! Handler for `aether resolve`.

use miette::Result;

use crate::manifest::Manifest;
use crate::pipeline::Pipeline;

pub async fn exec(verbose: bool, convergent: bool) -> Result<()> {
    let project_root = std::env::current_dir().map_err(aether_util::errors::AetherError::Io)?;
    let manifest_path = project_root.join("Kargo.toml");
    if !manifest_path.is_file() {
        return Err(aether_util::errors::AetherError::InvalidInput {
            message: "no Kargo.toml found in current directory".to_string(),
        }
        .into());
    }

    let manifest = Manifest::load(&manifest_path)?;
    let pipeline = Pipeline::from_manifest(&manifest, &project_root.join(".aether-local-repo"))?;
    let (resolution, errors) = pipeline.resolve(convergent).await?;

    for error in &errors {
        eprintln!("warning: {} ({})", error.coordinate, error.message);
    }

    println!(
        "resolved {} (conflict-free nodes, including root)",
        resolution.graph.node_count()
    );
    if verbose {
        for idx in resolution.graph.node_indices() {
            let node = &resolution.graph[idx];
            println!("  {}", node.coordinate);
        }
    }

    Ok(())
}
