use std::fmt;
use std::path::Path;

use anyhow::{bail, Context as AnyhowContext, Result};
use cv2::prelude::*;
use opencv as cv2;
use serde::{Deserialize, Serialize};

use crate::feature::FeatureVector;

/// Recognized actions and their classifier labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    Unrecognized = 0,
    Boxing = 1,
    Handclapping = 2,
    Handwaving = 3,
    Jogging = 4,
    Running = 5,
    Walking = 6,
}

impl Action {
    /// Every recognizable action, in label order.
    pub const ALL: [Action; 6] = [
        Action::Boxing,
        Action::Handclapping,
        Action::Handwaving,
        Action::Jogging,
        Action::Running,
        Action::Walking,
    ];

    pub fn label(self) -> i32 {
        self as i32
    }

    pub fn from_label(label: i32) -> Action {
        Action::ALL
            .iter()
            .copied()
            .find(|action| action.label() == label)
            .unwrap_or(Action::Unrecognized)
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Unrecognized => "Unrecognized",
            Action::Boxing => "Boxing",
            Action::Handclapping => "Handclapping",
            Action::Handwaving => "Handwaving",
            Action::Jogging => "Jogging",
            Action::Running => "Running",
            Action::Walking => "Walking",
        }
    }

    /// Ground truth from a video path: the first action, in label order, whose
    /// name appears in the path, ignoring case.
    pub fn from_path(path: &str) -> Action {
        let path = path.to_lowercase();
        Action::ALL
            .iter()
            .copied()
            .find(|action| path.contains(&action.name().to_lowercase()))
            .unwrap_or(Action::Unrecognized)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Majority vote over per-trajectory predictions. Ties go to the lowest
/// label; no recognizable vote gives `Unrecognized`.
pub fn vote(predictions: impl IntoIterator<Item = Action>) -> Action {
    let mut counts = [0usize; 7];
    for prediction in predictions {
        counts[prediction.label() as usize] += 1;
    }
    let mut best = Action::Unrecognized;
    for action in Action::ALL {
        if counts[action.label() as usize] > counts[best.label() as usize] {
            best = action;
        }
    }
    best
}

/// Maps feature vectors to actions.
pub trait Classifier {
    fn train(&mut self, vectors: &[FeatureVector], labels: &[Action]) -> Result<()>;

    fn predict(&self, vector: &FeatureVector) -> Result<Action>;

    fn save(&self, path: &Path) -> Result<()>;
}

/// Linear C-SVC from OpenCV's ml module.
pub struct SvmClassifier {
    svm: cv2::core::Ptr<dyn cv2::ml::SVM>,
}

impl SvmClassifier {
    pub fn new() -> Result<Self> {
        let mut svm = <dyn cv2::ml::SVM>::create()?;
        svm.set_type(cv2::ml::SVM_Types::C_SVC as i32)?;
        svm.set_c(0.1)?;
        svm.set_kernel(cv2::ml::SVM_KernelTypes::LINEAR as i32)?;
        svm.set_term_criteria(cv2::core::TermCriteria::new(
            cv2::core::TermCriteria_Type::MAX_ITER as i32,
            10_000_000,
            1e-6,
        )?)?;
        Ok(SvmClassifier { svm })
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            bail!("model {} does not exist", path.display());
        }
        let svm = <dyn cv2::ml::SVM>::load(&path_str(path)?)
            .with_context(|| format!("cannot load model {}", path.display()))?;
        Ok(SvmClassifier { svm })
    }
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_owned)
        .with_context(|| format!("non UTF-8 path {}", path.display()))
}

impl Classifier for SvmClassifier {
    fn train(&mut self, vectors: &[FeatureVector], labels: &[Action]) -> Result<()> {
        if vectors.is_empty() {
            bail!("no feature vectors to train on");
        }
        if vectors.len() != labels.len() {
            bail!("{} feature vectors but {} labels", vectors.len(), labels.len());
        }
        let rows: Vec<[f32; FeatureVector::LEN]> = vectors.iter().map(|v| v.as_array()).collect();
        let samples = cv2::core::Mat::from_slice_2d(&rows)?;
        let responses: Vec<[i32; 1]> = labels.iter().map(|label| [label.label()]).collect();
        let responses = cv2::core::Mat::from_slice_2d(&responses)?;

        if !self
            .svm
            .train(&samples, cv2::ml::SampleTypes::ROW_SAMPLE as i32, &responses)?
        {
            bail!("SVM training did not converge");
        }
        Ok(())
    }

    fn predict(&self, vector: &FeatureVector) -> Result<Action> {
        let sample = cv2::core::Mat::from_slice_2d(&[vector.as_array()])?;
        let mut results = cv2::core::Mat::default();
        let label = self.svm.predict(&sample, &mut results, 0)?;
        Ok(Action::from_label(label.round() as i32))
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.svm
            .save(&path_str(path)?)
            .with_context(|| format!("cannot save model to {}", path.display()))?;
        Ok(())
    }
}
