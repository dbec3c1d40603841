// Explanation collaborator seam
//
// An external explainer can turn (model id, feature vector) into a ranked
// feature-contribution list. The core only selects which model to ask and
// when; rendering explanation text is out of scope. The core functions
// fully without a provider.

use serde::Serialize;

use crate::voting::AnomalyRecord;

/// One feature's contribution to a model's verdict, largest impact first
#[derive(Debug, Clone, Serialize)]
pub struct FeatureContribution {
    /// Feature name, matching the extractor's vector order
    pub feature: String,
    /// Raw feature value for the explained sample
    pub value: f64,
    /// Signed contribution weight
    pub weight: f64,
}

/// External explanation collaborator
pub trait ExplanationProvider {
    /// Rank feature contributions for one model's view of one sample.
    /// `None` means this model cannot be explained; that is not an error.
    fn explain(&self, model_id: &str, features: &[f64]) -> Option<Vec<FeatureContribution>>;
}

/// Pick the model to explain a record with: the first agreeing vote in the
/// record's deterministic vote order.
pub fn select_explanation_model(record: &AnomalyRecord) -> Option<&str> {
    record
        .votes
        .values()
        .find(|vote| vote.prediction == 1)
        .map(|vote| vote.model_id.as_str())
}

/// Ask the provider to explain a record, if it is confident enough to be
/// worth explaining.
pub fn explain_record<P: ExplanationProvider>(
    provider: &P,
    record: &AnomalyRecord,
    features: &[f64],
    confidence_threshold: f64,
) -> Option<(String, Vec<FeatureContribution>)> {
    if record.confidence <= confidence_threshold {
        return None;
    }
    let model_id = select_explanation_model(record)?;
    provider
        .explain(model_id, features)
        .map(|contributions| (model_id.to_string(), contributions))
}
