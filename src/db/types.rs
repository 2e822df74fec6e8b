use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "questiontype", rename_all = "lowercase")]
pub(crate) enum QuestionType {
    #[serde(alias = "multiple_choice")]
    Mcq,
    #[serde(alias = "true_false")]
    Tf,
    #[serde(alias = "fill_blank")]
    Fill,
}

impl QuestionType {
    pub(crate) const ALL: [QuestionType; 3] = [Self::Mcq, Self::Tf, Self::Fill];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Mcq => "mcq",
            Self::Tf => "tf",
            Self::Fill => "fill",
        }
    }
}

/// Strategy a quiz was generated with. The legacy provider names are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "generationmethod", rename_all = "lowercase")]
pub(crate) enum GenerationMethod {
    #[default]
    #[serde(alias = "groq", alias = "huggingface")]
    Provider,
    #[serde(alias = "simple")]
    Heuristic,
}

impl GenerationMethod {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::Heuristic => "heuristic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_method_accepts_legacy_names() {
        let groq: GenerationMethod = serde_json::from_str("\"groq\"").expect("groq");
        let hf: GenerationMethod = serde_json::from_str("\"huggingface\"").expect("huggingface");
        let simple: GenerationMethod = serde_json::from_str("\"simple\"").expect("simple");

        assert_eq!(groq, GenerationMethod::Provider);
        assert_eq!(hf, GenerationMethod::Provider);
        assert_eq!(simple, GenerationMethod::Heuristic);
        assert_eq!(serde_json::to_string(&simple).expect("ser"), "\"heuristic\"");
    }

    #[test]
    fn question_type_uses_short_names() {
        let parsed: Vec<QuestionType> =
            serde_json::from_str(r#"["mcq","tf","fill"]"#).expect("types");
        assert_eq!(parsed, QuestionType::ALL.to_vec());
        assert!(serde_json::from_str::<QuestionType>("\"essay\"").is_err());
    }
}
