use std::path::{Path, PathBuf};

use crate::foundation::error::{ImagegenError, ImagegenResult};

/// Prefix marking a path as relative to the template's directory.
pub const TEMPLATE_SENTINEL: char = '@';

/// Maps script-supplied paths onto the filesystem.
///
/// `@name` resolves against the template directory with the sentinel stripped. Anything else
/// resolves against the working directory; absolute paths are kept as they are.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetResolver {
    template_dir: PathBuf,
    working_dir: PathBuf,
}

impl AssetResolver {
    pub fn new(template_dir: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Resolver for a template file. `working_dir` defaults to the process working directory.
    pub fn for_template(template: &Path, working_dir: Option<PathBuf>) -> ImagegenResult<Self> {
        let working_dir = match working_dir {
            Some(dir) => dir,
            None => std::env::current_dir()
                .map_err(|e| ImagegenError::io("read current directory", e))?,
        };
        let template = absolutize(template, &working_dir);
        let template_dir = template
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| working_dir.clone());
        Ok(Self::new(template_dir, working_dir))
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        match path.strip_prefix(TEMPLATE_SENTINEL) {
            Some(rest) => self
                .template_dir
                .join(rest.trim_start_matches(['/', '\\'])),
            None => absolutize(Path::new(path), &self.working_dir),
        }
    }
}

pub(crate) fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/paths.rs"]
mod tests;
