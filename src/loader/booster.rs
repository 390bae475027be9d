//! Gradient-boosted tree ensemble
//!
//! Reads the JSON document written by XGBoost's `save_model("*.json")`.
//! Only the fields needed for prediction are deserialized; everything else
//! in the document is ignored.
//!
//! Thresholds, leaves and margins are `f32`, and inputs are narrowed to `f32`
//! before each comparison, so split decisions match XGBoost's own predictor.

use anyhow::{anyhow, bail, ensure, Context, Result};
use serde::Deserialize;

/// How summed tree margins become the returned scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// `reg:squarederror` and friends: margin as-is
    Identity,
    /// `binary:logistic`, `reg:logistic`: sigmoid probability
    Logistic,
    /// `binary:logitraw`: raw margin, base score not transformed
    LogitRaw,
    /// `count:poisson`, `reg:gamma`, `reg:tweedie`: exp of margin
    Exp,
    /// `multi:softmax`, `multi:softprob`: arg-max class id
    MultiClass,
}

impl Objective {
    fn from_name(name: &str) -> Result<Self> {
        match name {
            "binary:logistic" | "reg:logistic" => Ok(Self::Logistic),
            "binary:logitraw" => Ok(Self::LogitRaw),
            "count:poisson" | "reg:gamma" | "reg:tweedie" => Ok(Self::Exp),
            "multi:softmax" | "multi:softprob" => Ok(Self::MultiClass),
            n if n.starts_with("reg:") => Ok(Self::Identity),
            other => Err(anyhow!("unsupported objective '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf(f32),
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Walk from the root to a leaf. Missing (NaN or absent) features follow
    /// the default direction. Children always have a larger index than their
    /// parent, so the walk terminates.
    fn leaf_value(&self, features: &[f64]) -> f32 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let value = features.get(feature).map(|v| *v as f32);
                    idx = match value.filter(|v| !v.is_nan()) {
                        Some(v) if v < threshold => left,
                        Some(_) => right,
                        None if default_left => left,
                        None => right,
                    };
                }
            }
        }
    }
}

/// Loaded tree-ensemble model, immutable after construction
#[derive(Debug, Clone)]
pub struct Booster {
    objective: Objective,
    objective_name: String,
    /// Base margin, already moved into margin space
    base_margin: f32,
    num_feature: usize,
    num_group: usize,
    trees: Vec<Tree>,
    tree_group: Vec<usize>,
}

impl Booster {
    /// Parse an XGBoost JSON model document
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let doc: RawDocument =
            serde_json::from_slice(bytes).context("not an XGBoost JSON model")?;
        Self::from_raw(doc.learner)
    }

    /// Parse an XGBoost JSON model document from a string
    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_slice(json.as_bytes())
    }

    fn from_raw(learner: RawLearner) -> Result<Self> {
        let objective_name = learner.objective.name;
        let objective = Objective::from_name(&objective_name)?;

        let params = learner.learner_model_param;
        let base_score = match &params.base_score {
            Some(v) => v.to_f64().context("base_score")?,
            None => 0.5,
        };
        let num_feature = match &params.num_feature {
            Some(v) => v.to_usize().context("num_feature")?,
            None => 0,
        };
        let num_class = match &params.num_class {
            Some(v) => v.to_usize().context("num_class")?,
            None => 0,
        };

        let num_group = if objective == Objective::MultiClass {
            ensure!(num_class >= 2, "multi-class objective needs num_class >= 2");
            num_class
        } else {
            1
        };

        let base_margin = match objective {
            Objective::Logistic => {
                ensure!(
                    base_score > 0.0 && base_score < 1.0,
                    "base_score {} outside (0, 1) for logistic objective",
                    base_score
                );
                (base_score / (1.0 - base_score)).ln()
            }
            Objective::Exp => {
                ensure!(base_score > 0.0, "base_score must be positive for log link");
                base_score.ln()
            }
            _ => base_score,
        };

        let booster = learner.gradient_booster;
        if let Some(name) = booster.name.as_deref() {
            ensure!(name == "gbtree", "unsupported booster '{}'", name);
        }
        let model = booster
            .model
            .ok_or_else(|| anyhow!("gradient_booster.model missing"))?;

        ensure!(!model.trees.is_empty(), "model has no trees");
        ensure!(
            model.tree_info.len() == model.trees.len(),
            "tree_info has {} entries for {} trees",
            model.tree_info.len(),
            model.trees.len()
        );

        let mut tree_group = Vec::with_capacity(model.tree_info.len());
        for (i, group) in model.tree_info.iter().enumerate() {
            let group = usize::try_from(*group)
                .map_err(|_| anyhow!("tree {} has negative group", i))?;
            ensure!(group < num_group, "tree {} assigned to group {}", i, group);
            tree_group.push(group);
        }

        let trees = model
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, raw)| build_tree(raw, num_feature).with_context(|| format!("tree {}", i)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            objective,
            objective_name,
            base_margin: base_margin as f32,
            num_feature,
            num_group,
            trees,
            tree_group,
        })
    }

    /// Expected input width (0 when the document does not record it)
    pub fn num_feature(&self) -> usize {
        self.num_feature
    }

    /// Number of output groups (classes for multi-class models, else 1)
    pub fn num_class(&self) -> usize {
        self.num_group
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn objective_name(&self) -> &str {
        &self.objective_name
    }

    /// Predict a single scalar for one feature vector
    ///
    /// Width is not checked here; callers validate against `num_feature`.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut margins = vec![self.base_margin; self.num_group];
        for (tree, &group) in self.trees.iter().zip(&self.tree_group) {
            margins[group] += tree.leaf_value(features);
        }

        let output = match self.objective {
            Objective::Identity | Objective::LogitRaw => margins[0],
            Objective::Logistic => 1.0 / (1.0 + (-margins[0]).exp()),
            Objective::Exp => margins[0].exp(),
            Objective::MultiClass => {
                let mut best = 0;
                for (i, m) in margins.iter().enumerate().skip(1) {
                    if *m > margins[best] {
                        best = i;
                    }
                }
                best as f32
            }
        };
        f64::from(output)
    }
}

fn build_tree(raw: RawTree, num_feature: usize) -> Result<Tree> {
    let n = raw.left_children.len();
    ensure!(n > 0, "empty tree");
    ensure!(
        raw.right_children.len() == n
            && raw.split_indices.len() == n
            && raw.split_conditions.len() == n
            && raw.default_left.len() == n,
        "node arrays differ in length"
    );
    if raw.split_type.iter().any(|t| *t != 0) {
        bail!("categorical splits are not supported");
    }

    let mut nodes = Vec::with_capacity(n);
    for i in 0..n {
        let (left, right) = (raw.left_children[i], raw.right_children[i]);
        if left == -1 {
            ensure!(right == -1, "node {} has only a right child", i);
            nodes.push(Node::Leaf(raw.split_conditions[i]));
            continue;
        }

        let child = |c: i64| -> Result<usize> {
            let c = usize::try_from(c).map_err(|_| anyhow!("node {} has child {}", i, c))?;
            ensure!(c > i && c < n, "node {} has out-of-order child {}", i, c);
            Ok(c)
        };
        let feature = usize::try_from(raw.split_indices[i])
            .map_err(|_| anyhow!("node {} splits on negative feature", i))?;
        if num_feature > 0 {
            ensure!(
                feature < num_feature,
                "node {} splits on feature {} of {}",
                i,
                feature,
                num_feature
            );
        }

        nodes.push(Node::Split {
            feature,
            threshold: raw.split_conditions[i],
            left: child(left)?,
            right: child(right)?,
            default_left: raw.default_left[i].is_set(),
        });
    }

    Ok(Tree { nodes })
}

// Raw document shape. XGBoost writes scalar params as strings ("5E-1"),
// and 3.x wraps base_score in brackets ("[5E-1]").

#[derive(Deserialize)]
struct RawDocument {
    learner: RawLearner,
}

#[derive(Deserialize)]
struct RawLearner {
    learner_model_param: RawModelParam,
    gradient_booster: RawGradientBooster,
    objective: RawObjective,
}

#[derive(Deserialize)]
struct RawModelParam {
    #[serde(default)]
    base_score: Option<Numeric>,
    #[serde(default)]
    num_class: Option<Numeric>,
    #[serde(default)]
    num_feature: Option<Numeric>,
}

#[derive(Deserialize)]
struct RawGradientBooster {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    model: Option<RawGbTree>,
}

#[derive(Deserialize)]
struct RawGbTree {
    trees: Vec<RawTree>,
    tree_info: Vec<i64>,
}

#[derive(Deserialize)]
struct RawTree {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
    #[serde(default)]
    split_type: Vec<i64>,
}

#[derive(Deserialize)]
struct RawObjective {
    name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn to_f64(&self) -> Result<f64> {
        match self {
            Self::Number(v) => Ok(*v),
            Self::Text(s) => {
                let trimmed = s.trim().trim_start_matches('[').trim_end_matches(']');
                let first = trimmed.split(',').next().unwrap_or("").trim();
                first
                    .parse()
                    .map_err(|_| anyhow!("'{}' is not a number", s))
            }
        }
    }

    fn to_usize(&self) -> Result<usize> {
        let v = self.to_f64()?;
        ensure!(v >= 0.0 && v.fract() == 0.0, "{} is not a count", v);
        Ok(v as usize)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// One-split regression model over two features:
    /// `f0 < 0.5 -> 1.0`, otherwise `2.0`, base score 0.5.
    pub const REGRESSION: &str = r#"{
      "learner": {
        "attributes": {},
        "feature_names": [],
        "gradient_booster": {
          "model": {
            "gbtree_model_param": {"num_parallel_tree": "1", "num_trees": "1"},
            "tree_info": [0],
            "trees": [{
              "id": 0,
              "left_children": [1, -1, -1],
              "right_children": [2, -1, -1],
              "split_indices": [0, 0, 0],
              "split_conditions": [0.5, 1.0, 2.0],
              "default_left": [1, 0, 0],
              "split_type": [0, 0, 0],
              "tree_param": {"num_feature": "2", "num_nodes": "3"}
            }]
          },
          "name": "gbtree"
        },
        "learner_model_param": {"base_score": "5E-1", "num_class": "0", "num_feature": "2"},
        "objective": {"name": "reg:squarederror"}
      },
      "version": [2, 0, 3]
    }"#;

    /// Three-class softmax model over two features, base score 0.5.
    /// class 0: leaf 0.5; class 1: f0 < 0.5 ? 2.0 : -1.0; class 2: f1 < 0 ? -1.0 : 1.0
    pub const MULTICLASS: &str = r#"{
      "learner": {
        "gradient_booster": {
          "model": {
            "tree_info": [0, 1, 2],
            "trees": [
              {"left_children": [-1], "right_children": [-1], "split_indices": [0],
               "split_conditions": [0.5], "default_left": [false]},
              {"left_children": [1, -1, -1], "right_children": [2, -1, -1],
               "split_indices": [0, 0, 0], "split_conditions": [0.5, 2.0, -1.0],
               "default_left": [true, false, false]},
              {"left_children": [1, -1, -1], "right_children": [2, -1, -1],
               "split_indices": [1, 0, 0], "split_conditions": [0.0, -1.0, 1.0],
               "default_left": [false, false, false]}
            ]
          },
          "name": "gbtree"
        },
        "learner_model_param": {"base_score": "[5E-1]", "num_class": "3", "num_feature": "2"},
        "objective": {"name": "multi:softmax"}
      }
    }"#;

    /// Binary logistic model: f0 < 0.5 ? -2.0 : 2.0, base score 0.5 (margin 0).
    pub const LOGISTIC: &str = r#"{
      "learner": {
        "gradient_booster": {
          "model": {
            "tree_info": [0],
            "trees": [{
              "left_children": [1, -1, -1], "right_children": [2, -1, -1],
              "split_indices": [0, 0, 0], "split_conditions": [0.5, -2.0, 2.0],
              "default_left": [0, 0, 0]
            }]
          }
        },
        "learner_model_param": {"base_score": 0.5, "num_class": "0", "num_feature": "1"},
        "objective": {"name": "binary:logistic"}
      }
    }"#;
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_regression_predictions() {
        let booster = Booster::from_json_str(REGRESSION).unwrap();
        assert_eq!(booster.num_feature(), 2);
        assert_eq!(booster.num_trees(), 1);
        assert_eq!(booster.objective(), Objective::Identity);
        assert_eq!(booster.predict(&[0.2, 7.0]), 1.5);
        assert_eq!(booster.predict(&[0.9, 7.0]), 2.5);
        // Threshold goes right
        assert_eq!(booster.predict(&[0.5, 0.0]), 2.5);
    }

    #[test]
    fn test_split_compares_in_single_precision() {
        // 0.099_999_999 narrows to the same f32 as the 1E-1 threshold, so it goes right
        let json = REGRESSION.replace("[0.5, 1.0, 2.0]", "[1E-1, 1.0, 2.0]");
        let booster = Booster::from_json_str(&json).unwrap();
        assert_eq!(booster.predict(&[0.099_999_999, 0.0]), 2.5);
        assert_eq!(booster.predict(&[0.1, 0.0]), 2.5);
        assert_eq!(booster.predict(&[0.0999, 0.0]), 1.5);
    }

    #[test]
    fn test_missing_value_follows_default_direction() {
        let booster = Booster::from_json_str(REGRESSION).unwrap();
        assert_eq!(booster.predict(&[f64::NAN, 0.0]), 1.5);
    }

    #[test]
    fn test_multiclass_argmax() {
        let booster = Booster::from_json_str(MULTICLASS).unwrap();
        assert_eq!(booster.num_class(), 3);
        assert_eq!(booster.predict(&[0.2, 0.3]), 1.0);
        assert_eq!(booster.predict(&[0.9, 0.3]), 2.0);
        assert_eq!(booster.predict(&[0.9, -1.0]), 0.0);
    }

    #[test]
    fn test_logistic_probability() {
        let booster = Booster::from_json_str(LOGISTIC).unwrap();
        let high = booster.predict(&[0.9]);
        let low = booster.predict(&[0.1]);
        assert!((high - 0.880_797).abs() < 1e-5, "{high}");
        assert!((low - 0.119_203).abs() < 1e-5, "{low}");
    }

    #[test]
    fn test_rejects_unknown_objective() {
        let json = REGRESSION.replace("reg:squarederror", "rank:pairwise");
        let err = Booster::from_json_str(&json).unwrap_err();
        assert!(format!("{err:#}").contains("unsupported objective"));
    }

    #[test]
    fn test_rejects_out_of_range_feature() {
        let json = REGRESSION.replace(r#""split_indices": [0, 0, 0]"#, r#""split_indices": [5, 0, 0]"#);
        assert!(Booster::from_json_str(&json).is_err());
    }

    #[test]
    fn test_rejects_backward_child() {
        let json = REGRESSION.replace(r#""left_children": [1, -1, -1]"#, r#""left_children": [0, -1, -1]"#);
        assert!(Booster::from_json_str(&json).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Booster::from_slice(b"\x00\x01 not json").is_err());
        assert!(Booster::from_json_str(r#"{"learner": {}}"#).is_err());
    }
}
