//! Random-forest backend: a smartcore `RandomForestClassifier` serialized
//! with bincode.
//!
//! The forest is fitted on 63 landmark features with class values 0..=4, in
//! label table order. The predicted class comes from the forest itself. Its
//! probability is the share of trees that voted for that class.

use serde::Deserialize;
use smartcore::ensemble::random_forest_classifier::RandomForestClassifier;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::DecisionTreeClassifier;

pub type Forest = RandomForestClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>;
type Tree = DecisionTreeClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>;

/// Field-for-field view of a serialized [`Forest`]; smartcore keeps the trees private.
#[derive(Deserialize)]
struct ForestParts {
    trees: Option<Vec<Tree>>,
    classes: Option<Vec<u32>>,
    #[serde(rename = "samples")]
    _samples: Option<Vec<Vec<bool>>>,
}

pub struct ForestModel {
    forest: Forest,
    trees: Vec<Tree>,
    classes: Vec<u32>,
}

impl ForestModel {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let forest: Forest = bincode::deserialize(bytes).map_err(|e| e.to_string())?;
        let parts: ForestParts = bincode::deserialize(bytes).map_err(|e| e.to_string())?;

        let trees = parts.trees.unwrap_or_default();
        let classes = parts.classes.unwrap_or_default();
        Ok(Self {
            forest,
            trees,
            classes,
        })
    }

    /// An unfitted forest would panic in `predict`; reject it up front.
    pub fn validate(&self, n_classes: usize) -> Result<(), String> {
        if self.trees.is_empty() || self.classes.is_empty() {
            return Err("forest has not been fitted".to_string());
        }
        if let Some(class) = self.classes.iter().find(|&&c| c as usize >= n_classes) {
            return Err(format!(
                "forest predicts class {class}, label table has {n_classes}"
            ));
        }
        Ok(())
    }

    /// Returns `(class_index, max_probability)`.
    pub fn predict(&self, features: &[f32]) -> Result<(usize, f32), String> {
        let row = DenseMatrix::from_2d_vec(&vec![features.iter().map(|&v| v as f64).collect()]);

        let predicted = self.forest.predict(&row).map_err(|e| e.to_string())?;
        let class = *predicted.first().ok_or("forest returned no prediction")?;

        let mut agreeing = 0;
        for tree in &self.trees {
            let vote = tree.predict(&row).map_err(|e| e.to_string())?;
            if vote.first() == Some(&class) {
                agreeing += 1;
            }
        }
        Ok((class as usize, agreeing as f32 / self.trees.len() as f32))
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn classes(&self) -> &[u32] {
        &self.classes
    }
}
