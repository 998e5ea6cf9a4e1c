//! Analyser interface (§6): typed seam for external collaborators that
//! inspect the target project and hand back structured findings. Concrete
//! analysis passes - complexity, dead code, duplicate detection, call
//! graphs - are out of scope here; the core only consumes `AnalysisResult`
//! values, it never computes them itself.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

/// One analyser's verdict on a single path. Refactoring-task creation
/// reads these and maps them onto `domain::IssueType`.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResult {
    Complexity {
        path: String,
        cyclomatic: u32,
        lines: u32,
    },
    DeadCode {
        path: String,
        symbol: String,
        line: u32,
    },
    Duplicate {
        path: String,
        other_path: String,
        similarity: f64,
    },
    IntegrationGap {
        path: String,
        description: String,
    },
    CallGraph {
        path: String,
        callers: Vec<String>,
        callees: Vec<String>,
    },
}

impl AnalysisResult {
    /// The file the finding is about, for folding into `FileRecord`
    /// lookups or `RefactoringTask.target_file`.
    pub fn path(&self) -> &str {
        match self {
            AnalysisResult::Complexity { path, .. }
            | AnalysisResult::DeadCode { path, .. }
            | AnalysisResult::Duplicate { path, .. }
            | AnalysisResult::IntegrationGap { path, .. }
            | AnalysisResult::CallGraph { path, .. } => path,
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("analyser {name} failed: {reason}")]
    Failed { name: &'static str, reason: String },
}

/// An external collaborator the refactoring/planning phases can call into
/// to turn a file on disk into zero or more `AnalysisResult`s.
#[async_trait]
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze(&self, path: &Path) -> Result<Vec<AnalysisResult>, AnalysisError>;
}

/// An analyser that finds nothing - used where a phase needs an `Analyzer`
/// to satisfy its signature but no concrete pass is wired up yet.
pub struct NullAnalyzer;

#[async_trait]
impl Analyzer for NullAnalyzer {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn analyze(&self, _path: &Path) -> Result<Vec<AnalysisResult>, AnalysisError> {
        Ok(Vec::new())
    }
}

/// Runs a fixed set of analysers over a path and flattens their results,
/// tolerating individual analyser failures rather than aborting the pass.
pub struct AnalyzerRegistry {
    analyzers: Vec<Box<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self { analyzers: Vec::new() }
    }

    pub fn register(mut self, analyzer: Box<dyn Analyzer>) -> Self {
        self.analyzers.push(analyzer);
        self
    }

    pub async fn analyze_all(&self, path: &Path) -> Vec<AnalysisResult> {
        let mut results = Vec::new();
        for analyzer in &self.analyzers {
            match analyzer.analyze(path).await {
                Ok(mut found) => results.append(&mut found),
                Err(e) => {
                    tracing::warn!(analyzer = analyzer.name(), error = %e, "analyser failed, skipping");
                }
            }
        }
        results
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_analyzer_finds_nothing() {
        let results = NullAnalyzer.analyze(Path::new("whatever.rs")).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn registry_flattens_results_across_analyzers() {
        struct Two;
        #[async_trait]
        impl Analyzer for Two {
            fn name(&self) -> &'static str {
                "two"
            }
            async fn analyze(&self, path: &Path) -> Result<Vec<AnalysisResult>, AnalysisError> {
                Ok(vec![
                    AnalysisResult::DeadCode { path: path.display().to_string(), symbol: "foo".into(), line: 1 },
                    AnalysisResult::DeadCode { path: path.display().to_string(), symbol: "bar".into(), line: 2 },
                ])
            }
        }

        let registry = AnalyzerRegistry::new().register(Box::new(Two)).register(Box::new(NullAnalyzer));
        let results = registry.analyze_all(Path::new("src/lib.rs")).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn registry_skips_a_failing_analyzer_rather_than_aborting() {
        struct Boom;
        #[async_trait]
        impl Analyzer for Boom {
            fn name(&self) -> &'static str {
                "boom"
            }
            async fn analyze(&self, _path: &Path) -> Result<Vec<AnalysisResult>, AnalysisError> {
                Err(AnalysisError::Failed { name: "boom", reason: "no parser available".into() })
            }
        }

        let registry = AnalyzerRegistry::new().register(Box::new(Boom)).register(Box::new(NullAnalyzer));
        let results = registry.analyze_all(Path::new("src/lib.rs")).await;
        assert!(results.is_empty());
    }
}
