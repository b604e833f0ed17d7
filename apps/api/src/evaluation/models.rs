use bytes::Bytes;
use serde_json::Value;

/// One file of an uploaded batch. Content lives only for the duration of the batch.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub index: usize,
    pub filename: String,
    pub content: Bytes,
}

impl UploadItem {
    /// Lowercased extension of the original filename, empty when there is none.
    pub fn extension(&self) -> String {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase()
    }
}

/// Candidate half of a model reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub skills: Vec<String>,
    pub experience: Vec<Value>,
    pub experience_months: Option<i32>,
    pub education: Vec<Value>,
}

/// Scoring half of a model reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationSummary {
    /// Clamped to 0..=100.
    pub match_score: Option<i32>,
    pub is_eligible: Option<bool>,
    pub summary: Option<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

/// Normalized model output for one candidate.
///
/// Every field is optional. A missing or wrongly typed value reads as absent, so
/// a sloppy reply still yields something persistable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredEvaluation {
    pub profile: CandidateProfile,
    pub evaluation: EvaluationSummary,
}

impl StructuredEvaluation {
    pub fn from_value(reply: &Value) -> Self {
        let profile = reply.get("candidate_profile").unwrap_or(&Value::Null);
        let evaluation = reply.get("evaluation").unwrap_or(&Value::Null);
        // match_analysis is where the prompt asks for these; some models flatten them.
        let analysis = evaluation
            .get("match_analysis")
            .filter(|v| v.is_object())
            .unwrap_or(evaluation);

        Self {
            profile: CandidateProfile {
                name: string_field(profile, "name"),
                email: string_field(profile, "email"),
                phone: string_field(profile, "phone"),
                skills: string_list(profile, "skills"),
                experience: value_list(profile, "experience"),
                experience_months: integer_field(profile, "experienceMonths")
                    .or_else(|| integer_field(profile, "experience_months")),
                education: value_list(profile, "education"),
            },
            evaluation: EvaluationSummary {
                match_score: integer_field(evaluation, "match_score").map(|s| s.clamp(0, 100)),
                is_eligible: evaluation.get("is_eligible").and_then(Value::as_bool),
                summary: string_field(analysis, "summary"),
                strengths: string_list(analysis, "strengths"),
                weaknesses: string_list(analysis, "weaknesses"),
            },
        }
    }
}

fn string_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn string_list(obj: &Value, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn value_list(obj: &Value, key: &str) -> Vec<Value> {
    obj.get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Accepts integers, floats (rounded) and numeric strings.
fn integer_field(obj: &Value, key: &str) -> Option<i32> {
    let number = match obj.get(key)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    let rounded = number.round();
    if rounded < i32::MIN as f64 || rounded > i32::MAX as f64 {
        return None;
    }
    Some(rounded as i32)
}
