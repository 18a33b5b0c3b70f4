use crate::domain::features::MODEL_FEATURES;
use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serialized regression model, one file per instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearModel),
    TreeEnsemble(TreeEnsemble),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

/// Additive tree ensemble (gradient boosting or a pre-averaged forest).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    /// Node 0 is the root.
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

impl ModelArtifact {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model artifact {}", path.display()))?;
        let artifact = serde_json::from_str::<ModelArtifact>(&text)
            .with_context(|| format!("invalid model artifact {}", path.display()))?;
        artifact
            .validate()
            .with_context(|| format!("model artifact {} failed validation", path.display()))?;
        Ok(artifact)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ModelArtifact::Linear(_) => "linear",
            ModelArtifact::TreeEnsemble(_) => "tree_ensemble",
        }
    }

    pub fn feature_names(&self) -> &[String] {
        match self {
            ModelArtifact::Linear(m) => &m.feature_names,
            ModelArtifact::TreeEnsemble(m) => &m.feature_names,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let names = self.feature_names();
        ensure!(
            names.iter().map(String::as_str).eq(MODEL_FEATURES),
            "feature_names must be [{}] (got [{}])",
            MODEL_FEATURES.join(", "),
            names.join(", ")
        );

        match self {
            ModelArtifact::Linear(m) => {
                ensure!(
                    m.coefficients.len() == names.len(),
                    "expected {} coefficients (got {})",
                    names.len(),
                    m.coefficients.len()
                );
                ensure!(
                    m.intercept.is_finite() && m.coefficients.iter().all(|c| c.is_finite()),
                    "linear model parameters must be finite"
                );
            }
            ModelArtifact::TreeEnsemble(m) => {
                ensure!(!m.trees.is_empty(), "tree ensemble has no trees");
                for (i, tree) in m.trees.iter().enumerate() {
                    tree.validate(names.len())
                        .with_context(|| format!("tree {i} is malformed"))?;
                }
            }
        }
        Ok(())
    }

    /// Scores one ordered feature vector.
    pub fn predict(&self, x: &[f64]) -> anyhow::Result<f64> {
        ensure!(
            x.len() == self.feature_names().len(),
            "expected {} features (got {})",
            self.feature_names().len(),
            x.len()
        );

        let y = match self {
            ModelArtifact::Linear(m) => {
                m.intercept
                    + m.coefficients
                        .iter()
                        .zip(x)
                        .map(|(c, v)| c * v)
                        .sum::<f64>()
            }
            ModelArtifact::TreeEnsemble(m) => {
                let mut acc = m.base_score;
                for tree in &m.trees {
                    acc += tree.eval(x)?;
                }
                acc
            }
        };

        ensure!(y.is_finite(), "model produced a non-finite prediction ({y})");
        Ok(y)
    }
}

impl Tree {
    fn validate(&self, n_features: usize) -> anyhow::Result<()> {
        ensure!(!self.nodes.is_empty(), "tree has no root");
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    ensure!(*feature < n_features, "node {idx}: feature {feature} out of range");
                    ensure!(threshold.is_finite(), "node {idx}: threshold must be finite");
                    // Children after their parent rules out cycles.
                    for child in [left, right] {
                        ensure!(
                            *child > idx && *child < self.nodes.len(),
                            "node {idx}: child {child} out of range"
                        );
                    }
                }
                TreeNode::Leaf { value } => {
                    ensure!(value.is_finite(), "node {idx}: leaf value must be finite");
                }
            }
        }
        Ok(())
    }

    fn eval(&self, x: &[f64]) -> anyhow::Result<f64> {
        let mut idx = 0;
        // A root-to-leaf path visits each node at most once.
        for _ in 0..self.nodes.len() {
            match self.nodes.get(idx) {
                Some(TreeNode::Leaf { value }) => return Ok(*value),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let Some(v) = x.get(*feature) else {
                        bail!("tree node {idx}: feature {feature} out of range");
                    };
                    idx = if *v <= *threshold { *left } else { *right };
                }
                None => bail!("tree node {idx} does not exist"),
            }
        }
        bail!("tree does not reach a leaf within {} nodes", self.nodes.len())
    }
}
