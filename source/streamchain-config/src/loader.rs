use std::{
    future::Future,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use miette::{Context, IntoDiagnostic, Result};

use crate::{models::ChainConfig, parser};

pub trait AsyncFs: Send + Sync + Clone + Default {
    fn read_to_string(path: &Path) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Clone, Default)]
pub struct TokioFs;

impl AsyncFs for TokioFs {
    async fn read_to_string(path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path).await.into_diagnostic()
    }
}

/// Reads and parses chain template files
#[derive(Clone, Default)]
pub struct ChainConfigLoader<F: AsyncFs = TokioFs> {
    fs: PhantomData<F>,
}

impl<F: AsyncFs> ChainConfigLoader<F> {
    pub fn new() -> Self {
        Self { fs: PhantomData }
    }

    pub async fn load(&self, path: impl Into<PathBuf>) -> Result<ChainConfig> {
        let path = path.into();

        let content = F::read_to_string(&path)
            .await
            .wrap_err_with(|| format!("Failed to read file: {:?}", path))?;

        let source_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        let config = parser::parse_str(&source_name, &content)?;

        tracing::info!(
            "Loaded {} chain templates from {:?}",
            config.chains.len(),
            path
        );

        Ok(config)
    }
}
