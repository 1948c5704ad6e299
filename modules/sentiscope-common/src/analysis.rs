use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

// --- Label enums ---
//
// Every enum the model fills in has an explicit `Unknown` variant. Values
// outside the legal set are kept as `Unknown` instead of failing the run or
// leaking arbitrary strings into storage.

macro_rules! label_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            Unknown,
        }

        impl $name {
            /// Legal labels, in declaration order.
            pub const LABELS: &'static [&'static str] = &[$($label),+];

            /// Case-insensitive match against the legal labels.
            pub fn parse(raw: &str) -> Self {
                match raw.trim().to_lowercase().as_str() {
                    $($label => $name::$variant,)+
                    _ => $name::Unknown,
                }
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                    $name::Unknown => "unknown",
                }
            }

            pub fn is_unknown(&self) -> bool {
                matches!(self, $name::Unknown)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Ok($name::parse(&raw))
            }
        }
    };
}

label_enum!(
    /// Overall polarity of a text.
    Sentiment {
        Positive => "positive",
        Negative => "negative",
        Neutral => "neutral",
    }
);

label_enum!(Intensity {
    Low => "low",
    Moderate => "moderate",
    High => "high",
});

label_enum!(Emotion {
    Joy => "joy",
    Anger => "anger",
    Sadness => "sadness",
    Fear => "fear",
    Surprise => "surprise",
});

label_enum!(Tone {
    Formal => "formal",
    Informal => "informal",
    Sarcastic => "sarcastic",
});

label_enum!(InteractionType {
    Feedback => "feedback",
    Question => "question",
    Criticism => "criticism",
});

label_enum!(Impact {
    Low => "low",
    Medium => "medium",
    High => "high",
});

// --- Analysis ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub tone: Option<Tone>,
    pub sarcasm: Option<bool>,
}

/// Structured sentiment/emotion profile of one text.
///
/// Built from untrusted model output with [`Analysis::from_llm_value`]; every
/// optional field may be absent and every enum may be `Unknown`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub sentiment: Sentiment,
    pub intensity: Option<Intensity>,
    pub emotion: Option<Emotion>,
    /// 0.0 (very negative) to 1.0 (very positive).
    pub sentiment_value: Option<f64>,
    pub motivation: Option<String>,
    #[serde(default)]
    pub context: AnalysisContext,
    /// Named entities, deduplicated, first mention first.
    #[serde(default)]
    pub entities: Vec<String>,
    /// `#`-prefixed hashtags, deduplicated, first mention first.
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub interaction_type: Option<InteractionType>,
    pub impact: Option<Impact>,
    pub feedback: Option<String>,
}

impl Analysis {
    /// An analysis with only the required field set.
    pub fn new(sentiment: Sentiment) -> Self {
        Self {
            sentiment,
            intensity: None,
            emotion: None,
            sentiment_value: None,
            motivation: None,
            context: AnalysisContext::default(),
            entities: Vec::new(),
            hashtags: Vec::new(),
            interaction_type: None,
            impact: None,
            feedback: None,
        }
    }

    /// Coerce a parsed model reply into the schema.
    ///
    /// Fails only when the payload is not an object or has no `sentiment`.
    /// Everything else degrades: unknown labels become `Unknown`, bad numbers
    /// and blanks become `None`, list fields accept arrays, stringified
    /// arrays or single strings.
    pub fn from_llm_value(value: &Value) -> Result<Self, String> {
        let obj = value
            .as_object()
            .ok_or_else(|| format!("expected a JSON object, got {}", json_kind(value)))?;

        let sentiment = match obj.get("sentiment") {
            None | Some(Value::Null) => return Err("missing required field `sentiment`".into()),
            Some(v) => label(Some(v), Sentiment::parse).unwrap_or(Sentiment::Unknown),
        };

        let context = obj
            .get("context")
            .and_then(Value::as_object)
            .map(|ctx| AnalysisContext {
                tone: label(ctx.get("tone"), Tone::parse),
                sarcasm: boolean(ctx.get("sarcasm")),
            })
            .unwrap_or_default();

        Ok(Self {
            sentiment,
            intensity: label(obj.get("intensity"), Intensity::parse),
            emotion: label(obj.get("emotion"), Emotion::parse),
            sentiment_value: unit_interval(obj),
            motivation: text(obj.get("motivation")),
            context,
            entities: dedup(string_list(obj.get("entities"))),
            hashtags: dedup(
                string_list(obj.get("hashtags"))
                    .into_iter()
                    .filter_map(|tag| normalize_hashtag(&tag))
                    .collect(),
            ),
            interaction_type: label(obj.get("interaction_type"), InteractionType::parse),
            impact: label(obj.get("impact"), Impact::parse),
            feedback: text(obj.get("feedback")),
        })
    }
}

// --- Coercion helpers ---

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Blank/null → None, string → parsed label, anything else → `parse("")`
/// which lands on `Unknown`.
fn label<T>(value: Option<&Value>, parse: fn(&str) -> T) -> Option<T> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(parse(s)),
        _ => Some(parse("")),
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn boolean(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn unit_interval(obj: &Map<String, Value>) -> Option<f64> {
    let raw = match obj.get("sentiment_value")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if raw.is_finite() && (0.0..=1.0).contains(&raw) {
        Some(raw)
    } else {
        warn!(sentiment_value = raw, "Dropping out-of-range sentiment_value");
        None
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => {
            // Models sometimes return the list as a stringified JSON array.
            match serde_json::from_str::<Value>(s) {
                Ok(inner @ Value::Array(_)) => string_list(Some(&inner)),
                _ => {
                    let s = s.trim();
                    if s.is_empty() {
                        Vec::new()
                    } else {
                        vec![s.to_string()]
                    }
                }
            }
        }
        Some(_) => Vec::new(),
    }
}

fn normalize_hashtag(tag: &str) -> Option<String> {
    let body = tag.trim().trim_start_matches('#').trim();
    if body.is_empty() {
        None
    } else {
        Some(format!("#{body}"))
    }
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
